//! Email channel — IMAP fetch for inbound, SMTP via lettre for outbound.
//!
//! Both directions do blocking socket I/O and are driven through
//! `spawn_blocking` from async callers.

use std::io::Write as IoWrite;
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use mail_parser::{MessageParser, MimeHeaders};
use secrecy::{ExposeSecret, SecretString};

use crate::config::{env_or, env_parse};
use crate::error::{ChannelError, ConfigError};
use crate::pipeline::types::{MailSource, RawMessage};

// ── Configuration ───────────────────────────────────────────────────

/// Mailbox configuration, built from environment variables.
#[derive(Debug)]
pub struct EmailConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
    pub mailbox: String,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl EmailConfig {
    /// Build config from environment variables.
    /// `EMAIL_IMAP_HOST` is required; everything else has a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let imap_host = std::env::var("EMAIL_IMAP_HOST")
            .map_err(|_| ConfigError::MissingEnvVar("EMAIL_IMAP_HOST".into()))?;

        let smtp_host =
            std::env::var("EMAIL_SMTP_HOST").unwrap_or_else(|_| imap_host.replace("imap", "smtp"));
        let username = env_or("EMAIL_USERNAME", "");
        let from_address = env_or("EMAIL_FROM_ADDRESS", &username);

        Ok(Self {
            imap_port: env_parse("EMAIL_IMAP_PORT", 993)?,
            smtp_port: env_parse("EMAIL_SMTP_PORT", 465)?,
            password: SecretString::from(env_or("EMAIL_PASSWORD", "")),
            mailbox: env_or("EMAIL_MAILBOX", "INBOX"),
            max_retries: env_parse("EMAIL_MAX_RETRIES", 3)?,
            retry_delay: Duration::from_secs(env_parse("EMAIL_RETRY_DELAY_SECS", 2)?),
            imap_host,
            smtp_host,
            username,
            from_address,
        })
    }
}

// ── Inbound ─────────────────────────────────────────────────────────

/// Unread-mail source backed by an IMAP mailbox.
pub struct ImapInbox {
    config: Arc<EmailConfig>,
}

impl ImapInbox {
    pub fn new(config: Arc<EmailConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MailSource for ImapInbox {
    fn name(&self) -> &str {
        "imap"
    }

    async fn fetch_unread(&self, limit: usize) -> Result<Vec<RawMessage>, ChannelError> {
        let config = Arc::clone(&self.config);
        tracing::info!(host = %config.imap_host, mailbox = %config.mailbox, limit, "Fetching unread mail");

        let messages = tokio::task::spawn_blocking(move || fetch_unseen_imap(&config, limit))
            .await
            .map_err(|e| ChannelError::FetchFailed {
                name: "imap".into(),
                reason: format!("fetch task panicked: {e}"),
            })??;

        tracing::info!(count = messages.len(), "Fetched unread messages");
        Ok(messages)
    }
}

// ── Outbound ────────────────────────────────────────────────────────

/// SMTP sender with bounded retry.
pub struct SmtpSender {
    config: Arc<EmailConfig>,
}

impl SmtpSender {
    pub fn new(config: Arc<EmailConfig>) -> Self {
        Self { config }
    }

    /// Send a plain-text email, retrying with exponential backoff.
    pub async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), ChannelError> {
        let email = self.build_message(to, subject, body)?;
        let transport = self.transport()?;
        let attempts = self.config.max_retries.max(1);

        let mut last_error = String::new();
        for attempt in 1..=attempts {
            let transport = transport.clone();
            let email = email.clone();
            let result = tokio::task::spawn_blocking(move || transport.send(&email))
                .await
                .map_err(|e| format!("send task panicked: {e}"))
                .and_then(|r| r.map_err(|e| e.to_string()));

            match result {
                Ok(_) => {
                    tracing::info!(to, attempt, "Email sent");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(to, attempt, error = %e, "SMTP send failed");
                    last_error = e;
                    if attempt < attempts {
                        tokio::time::sleep(backoff_delay(self.config.retry_delay, attempt)).await;
                    }
                }
            }
        }

        tracing::error!(to, attempts, "Giving up on email delivery");
        Err(ChannelError::SendFailed {
            name: "email".into(),
            reason: format!("{attempts} attempts failed, last error: {last_error}"),
        })
    }

    fn transport(&self) -> Result<SmtpTransport, ChannelError> {
        let creds = Credentials::new(
            self.config.username.clone(),
            self.config.password.expose_secret().to_string(),
        );

        Ok(SmtpTransport::relay(&self.config.smtp_host)
            .map_err(|e| ChannelError::SendFailed {
                name: "email".into(),
                reason: format!("SMTP relay error: {e}"),
            })?
            .port(self.config.smtp_port)
            .credentials(creds)
            .build())
    }

    fn build_message(&self, to: &str, subject: &str, body: &str) -> Result<Message, ChannelError> {
        Message::builder()
            .from(self.config.from_address.parse().map_err(|e| {
                ChannelError::SendFailed {
                    name: "email".into(),
                    reason: format!("Invalid from address: {e}"),
                }
            })?)
            .to(to.parse().map_err(|e| ChannelError::SendFailed {
                name: "email".into(),
                reason: format!("Invalid to address: {e}"),
            })?)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| ChannelError::SendFailed {
                name: "email".into(),
                reason: format!("Failed to build email: {e}"),
            })
    }
}

// ── Helpers (public for testing) ────────────────────────────────────

/// Delay before retry number `attempt + 1`: `base * 2^(attempt-1)`.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    base.saturating_mul(1 << exponent)
}

/// Strip HTML tags from content (basic).
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                result.push(' ');
            }
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse an RFC 822 message into a `RawMessage`. `None` if unparsable.
pub fn parse_rfc822(uid: &str, raw: &[u8]) -> Option<RawMessage> {
    let parsed = MessageParser::default().parse(raw)?;

    Some(RawMessage {
        uid: uid.to_string(),
        sender: format_sender(&parsed),
        subject: parsed.subject().unwrap_or_default().to_string(),
        date: parsed.date().map(|d| d.to_rfc3339()).unwrap_or_default(),
        body: extract_text(&parsed).trim().to_string(),
    })
}

/// `Name <addr>` when a display name exists, else the bare address.
fn format_sender(parsed: &mail_parser::Message) -> String {
    let Some(from) = parsed.from().and_then(|addr| addr.first()) else {
        return String::new();
    };
    let address = from.address().unwrap_or_default();
    match from.name() {
        Some(name) if !name.trim().is_empty() => format!("{} <{address}>", name.trim()),
        _ => address.to_string(),
    }
}

/// Extract readable text from a parsed email.
fn extract_text(parsed: &mail_parser::Message) -> String {
    if let Some(text) = parsed.body_text(0) {
        return text.to_string();
    }
    if let Some(html) = parsed.body_html(0) {
        return strip_html(html.as_ref());
    }
    for part in parsed.attachments() {
        let part: &mail_parser::MessagePart = part;
        if let Some(ct) = MimeHeaders::content_type(part)
            && ct.ctype() == "text"
            && let Ok(text) = std::str::from_utf8(part.contents())
        {
            return text.to_string();
        }
    }
    String::new()
}

/// Sequence ids from `* SEARCH` response lines.
fn parse_search_ids(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter(|line| line.starts_with("* SEARCH"))
        .flat_map(|line| line.split_whitespace().skip(2))
        .map(String::from)
        .collect()
}

/// Quote a string for an IMAP command argument.
fn imap_quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Error type for IMAP session operations.
type ImapError = Box<dyn std::error::Error + Send + Sync>;

type ImapStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

fn fetch_failed(reason: impl std::fmt::Display) -> ChannelError {
    ChannelError::FetchFailed {
        name: "imap".into(),
        reason: reason.to_string(),
    }
}

/// Fetch up to `limit` unseen emails via raw IMAP over TLS (blocking).
fn fetch_unseen_imap(config: &EmailConfig, limit: usize) -> Result<Vec<RawMessage>, ChannelError> {
    let mut tls = connect_tls(config).map_err(fetch_failed)?;

    let read_line = |tls: &mut ImapStream| -> Result<String, ImapError> {
        let mut buf = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            match std::io::Read::read(tls, &mut byte) {
                Ok(0) => return Err("IMAP connection closed".into()),
                Ok(_) => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        return Ok(String::from_utf8_lossy(&buf).to_string());
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    };

    let mut tag_counter = 0_u32;
    let mut send_cmd = |tls: &mut ImapStream, cmd: &str| -> Result<Vec<String>, ImapError> {
        tag_counter += 1;
        let tag = format!("A{tag_counter}");
        IoWrite::write_all(tls, format!("{tag} {cmd}\r\n").as_bytes())?;
        IoWrite::flush(tls)?;
        let mut lines = Vec::new();
        loop {
            let line = read_line(tls)?;
            let done = line.starts_with(&format!("{tag} "));
            lines.push(line);
            if done {
                break;
            }
        }
        Ok(lines)
    };
    let tagged_ok = |lines: &[String]| lines.last().is_some_and(|l| l.contains("OK"));

    read_line(&mut tls).map_err(fetch_failed)?;

    let login = send_cmd(
        &mut tls,
        &format!(
            "LOGIN {} {}",
            imap_quote(&config.username),
            imap_quote(config.password.expose_secret())
        ),
    )
    .map_err(fetch_failed)?;
    if !tagged_ok(&login) {
        return Err(ChannelError::AuthFailed {
            name: "imap".into(),
            reason: "IMAP login rejected".into(),
        });
    }

    let select = send_cmd(&mut tls, &format!("SELECT {}", imap_quote(&config.mailbox)))
        .map_err(fetch_failed)?;
    if !tagged_ok(&select) {
        return Err(fetch_failed(format!("cannot select mailbox {}", config.mailbox)));
    }

    let search = send_cmd(&mut tls, "SEARCH UNSEEN").map_err(fetch_failed)?;
    let ids: Vec<String> = parse_search_ids(&search).into_iter().take(limit).collect();

    let mut results = Vec::with_capacity(ids.len());
    for id in &ids {
        let fetch = send_cmd(&mut tls, &format!("FETCH {id} RFC822")).map_err(fetch_failed)?;
        if !tagged_ok(&fetch) {
            tracing::warn!(uid = %id, "IMAP fetch rejected, skipping message");
            continue;
        }

        let raw: String = fetch
            .iter()
            .skip(1)
            .take(fetch.len().saturating_sub(2))
            .cloned()
            .collect();

        let Some(message) = parse_rfc822(id, raw.as_bytes()) else {
            tracing::warn!(uid = %id, "Unparsable message, skipping");
            continue;
        };

        if let Err(e) = send_cmd(&mut tls, &format!("STORE {id} +FLAGS (\\Seen)")) {
            tracing::warn!(uid = %id, error = %e, "Failed to mark message seen");
        }
        results.push(message);
    }

    let _ = send_cmd(&mut tls, "LOGOUT");
    Ok(results)
}

fn connect_tls(config: &EmailConfig) -> Result<ImapStream, ImapError> {
    let tcp = TcpStream::connect((&*config.imap_host, config.imap_port))?;
    tcp.set_read_timeout(Some(Duration::from_secs(30)))?;

    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    );
    let server_name = rustls_pki_types::ServerName::try_from(config.imap_host.clone())?;
    let conn = rustls::ClientConnection::new(tls_config, server_name)?;
    Ok(rustls::StreamOwned::new(conn, tcp))
}

// ── Tests ───────────────────────────────────────────────────────────
