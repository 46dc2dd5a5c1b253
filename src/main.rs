use std::sync::Arc;

use anyhow::Context as _;
use tenant_triage::channels::{EmailConfig, ImapInbox, SmtpSender};
use tenant_triage::config::{AppConfig, ExtractorConfig, ReplyConfig};
use tenant_triage::context::ContextLoader;
use tenant_triage::llm::{LlmConfig, create_provider};
use tenant_triage::pipeline::RequestProcessor;
use tenant_triage::pipeline::types::MailSource;
use tenant_triage::reply::ReplyGenerator;
use tenant_triage::workflow::ActionItemWriter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let app = AppConfig::from_env().context("reading triage settings")?;
    let llm_config = LlmConfig::from_env().context("reading LLM settings")?;
    let email = Arc::new(EmailConfig::from_env().context("reading mailbox settings")?);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        model = %llm_config.model,
        mailbox = %email.mailbox,
        "Tenant triage starting"
    );

    let llm = create_provider(&llm_config).context("creating LLM provider")?;
    let processor = RequestProcessor::new(Arc::clone(&llm), ExtractorConfig::default());
    let replier = ReplyGenerator::new(llm, ReplyConfig::default());
    let contexts = ContextLoader::new(app.context_seed);
    let writer = ActionItemWriter::new(&app.action_dir)
        .with_context(|| format!("creating {}", app.action_dir.display()))?;
    let inbox = ImapInbox::new(Arc::clone(&email));
    let sender = SmtpSender::new(email);

    let messages = inbox
        .fetch_unread(app.fetch_limit)
        .await
        .context("fetching unread mail")?;

    for message in &messages {
        let record = processor.process(message).await;
        let context = contexts.load(&record.tenant_name, record.address.as_deref());
        let ticket_id = match writer.process(&record, &message.subject, &context) {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(uid = %message.uid, error = %e, "Saving action item failed");
                continue;
            }
        };

        let reply = match replier.generate(&record, &context, &ticket_id).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(uid = %message.uid, error = %e, "Reply drafting failed");
                continue;
            }
        };

        let subject = format!("Re: {}", message.subject);
        if let Err(e) = sender.send_email(&message.sender, &subject, &reply).await {
            tracing::error!(uid = %message.uid, error = %e, "Reply delivery failed");
        }
    }

    tracing::info!(count = messages.len(), "Triage run complete");
    Ok(())
}
