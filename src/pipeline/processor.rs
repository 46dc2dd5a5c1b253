//! Request processor — turns a raw email into a request record.
//!
//! **Core invariant: `process` never fails.**
//!
//! Flow:
//! 1. LLM extraction → JSON candidate
//! 2. Schema validation → typed record
//! 3. Normalizer → request type re-derived from the body
//!
//! Any failure in 1–2 discards the LLM result and returns the rule-based
//! extractor's record instead. The LLM path is tried once per message; there
//! is no retry.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ExtractorConfig;
use crate::error::PipelineError;
use crate::llm::provider::LlmProvider;
use crate::pipeline::llm_extractor::LlmExtractor;
use crate::pipeline::normalize::normalize;
use crate::pipeline::rules::RuleExtractor;
use crate::pipeline::schema::validate_record;
use crate::pipeline::types::{ExtractionSource, ProcessedRequest, RawMessage, RequestRecord};

/// Two-tier extractor: LLM first, rules as the terminal fallback.
///
/// Stateless beyond its construction-time configuration, so one instance
/// can serve concurrent callers.
pub struct RequestProcessor {
    extractor: LlmExtractor,
    rules: RuleExtractor,
}

impl RequestProcessor {
    pub fn new(llm: Arc<dyn LlmProvider>, config: ExtractorConfig) -> Self {
        Self {
            extractor: LlmExtractor::new(llm, config),
            rules: RuleExtractor::new(),
        }
    }

    /// Process a single message. Always returns a schema-valid record.
    pub async fn process(&self, message: &RawMessage) -> RequestRecord {
        self.process_detailed(message).await.record
    }

    /// Like `process`, but also reports which extractor produced the record.
    pub async fn process_detailed(&self, message: &RawMessage) -> ProcessedRequest {
        let processed = match self.try_llm(message).await {
            Ok(record) => ProcessedRequest {
                record,
                source: ExtractionSource::Llm,
            },
            Err(e) => {
                warn!(
                    uid = %message.uid,
                    error = %e,
                    "LLM extraction failed, falling back to rule-based parser"
                );
                ProcessedRequest {
                    record: self.rules.extract(message),
                    source: ExtractionSource::Rules,
                }
            }
        };

        info!(
            uid = %message.uid,
            source = processed.source.label(),
            request_type = %processed.record.request_type,
            "Request extracted"
        );
        processed
    }

    /// Process messages one at a time, preserving input order.
    pub async fn process_batch(&self, messages: &[RawMessage]) -> Vec<RequestRecord> {
        info!(count = messages.len(), "Processing message batch");

        let mut records = Vec::with_capacity(messages.len());
        for message in messages {
            records.push(self.process(message).await);
        }
        records
    }

    /// The probabilistic path: extract → validate → normalize.
    async fn try_llm(&self, message: &RawMessage) -> Result<RequestRecord, PipelineError> {
        let candidate = self.extractor.extract(message).await?;
        let mut record = validate_record(&Value::Object(candidate))?;

        let normalized = normalize(&record);
        if normalized != record.request_type {
            debug!(
                uid = %message.uid,
                llm = %record.request_type,
                normalized = %normalized,
                "Request type corrected by normalizer"
            );
        }
        record.request_type = normalized;
        Ok(record)
    }
}
