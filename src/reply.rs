//! Reply drafter — uses the LLM to write a response email to the tenant.

use std::fmt::Write as _;
use std::sync::Arc;

use tracing::info;

use crate::config::ReplyConfig;
use crate::context::TenantContext;
use crate::error::LlmError;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::types::RequestRecord;

/// Drafts tenant-facing replies.
pub struct ReplyGenerator {
    llm: Arc<dyn LlmProvider>,
    config: ReplyConfig,
}

impl ReplyGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>, config: ReplyConfig) -> Self {
        Self { llm, config }
    }

    /// Draft a reply body for `request`, referencing `ticket_id`.
    pub async fn generate(
        &self,
        request: &RequestRecord,
        context: &TenantContext,
        ticket_id: &str,
    ) -> Result<String, LlmError> {
        let completion = CompletionRequest::new(vec![
            ChatMessage::system(build_reply_system_prompt(&self.config.signature)),
            ChatMessage::user(build_reply_user_prompt(request, context, ticket_id)),
        ])
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens);

        let response = self.llm.complete(completion).await?;
        let reply = response.content.trim();
        if reply.is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.llm.model_name().to_string(),
                reason: "empty reply draft".into(),
            });
        }

        info!(
            ticket_id,
            output_tokens = response.output_tokens,
            "Reply drafted"
        );
        Ok(reply.to_string())
    }
}

pub fn build_reply_system_prompt(signature: &str) -> String {
    format!(
        "You are a professional property manager assistant. Given a tenant's parsed request, \
         account context (balance, lease dates, maintenance history) and the ticket id raised \
         for the request, draft a polite, clear and concise email response.\n\n\
         Always:\n\
         - Greet the tenant by name.\n\
         - Acknowledge their specific ask.\n\
         - Reference relevant context such as rent balance, lease end date or past tickets.\n\
         - Explain next steps.\n\
         - Mention that ticket <id> has been raised for their reference.\n\
         - Sign off with {signature}.\n\n\
         Respond with only the email body. No JSON, no markup."
    )
}

pub fn build_reply_user_prompt(
    request: &RequestRecord,
    context: &TenantContext,
    ticket_id: &str,
) -> String {
    let mut prompt = format!(
        "Parsed Request:\n\
         \x20 Tenant: {}\n\
         \x20 Address: {}\n\
         \x20 Type: {}\n\
         \x20 Summary: {}\n\n\
         Ticket Id:\n{ticket_id}\n\n\
         Full Message:\n{}\n\n\
         Context:\n\
         \x20 Rent Balance: {}\n\
         \x20 Lease Ends: {}\n\
         \x20 Maintenance History:\n",
        request.tenant_name,
        request.address.as_deref().unwrap_or("unknown"),
        request.request_type,
        request.summary,
        request.full_body,
        context.rent_balance,
        context.lease_end_date,
    );

    for ticket in &context.maintenance_history {
        let _ = writeln!(
            prompt,
            "    - {}: {} ({}, id {})",
            ticket.date,
            ticket.issue,
            ticket.status.as_str(),
            ticket.id
        );
    }

    prompt.push_str("\nDraft a response email using this information.");
    prompt
}
