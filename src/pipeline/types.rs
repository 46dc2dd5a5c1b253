//! Shared types for the request triage pipeline.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

// ── Inbound message ─────────────────────────────────────────────────

/// An unstructured email as fetched from the mailbox.
///
/// Immutable once fetched; every extractor borrows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    /// Mailbox-native message id.
    pub uid: String,
    /// Raw `From` header, e.g. `Jane Doe <jane@example.com>`.
    pub sender: String,
    pub subject: String,
    pub date: String,
    /// Plain-text body.
    pub body: String,
}

// ── Request type ────────────────────────────────────────────────────

/// Category of a tenant request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Maintenance,
    Payment,
    Lease,
    General,
}

impl RequestType {
    /// Every accepted value, in schema order.
    pub const ALL: [RequestType; 4] = [
        RequestType::Maintenance,
        RequestType::Payment,
        RequestType::Lease,
        RequestType::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Maintenance => "maintenance",
            Self::Payment => "payment",
            Self::Lease => "lease",
            Self::General => "general",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown request type '{s}'"))
    }
}

// ── Request record ──────────────────────────────────────────────────

/// The validated, classified output of the pipeline.
///
/// Serializes to exactly the five schema fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestRecord {
    pub tenant_name: String,
    /// Unit / apartment identifier, when one could be found.
    pub address: Option<String>,
    pub request_type: RequestType,
    /// First substantive line of the message.
    pub summary: String,
    /// Message body, verbatim.
    pub full_body: String,
}

// ── Provenance ──────────────────────────────────────────────────────

/// Which extractor produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionSource {
    /// LLM extraction, schema-validated and normalized.
    Llm,
    /// Rule-based fallback.
    Rules,
}

impl ExtractionSource {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Llm => "llm",
            Self::Rules => "rules",
        }
    }
}

/// A record plus the extractor that produced it.
///
/// Provenance is kept beside the record, never inside it, so the record
/// itself stays schema-exact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedRequest {
    pub record: RequestRecord,
    pub source: ExtractionSource,
}

// ── Mail source trait ───────────────────────────────────────────────

/// Supplies inbound tenant messages. Pure I/O, no business logic.
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Source name for logging (e.g. "imap").
    fn name(&self) -> &str;

    /// Fetch up to `limit` unread messages, marking them as read.
    async fn fetch_unread(&self, limit: usize) -> Result<Vec<RawMessage>, ChannelError>;
}
