//! LLM-backed request extraction.
//!
//! Sends the email to the text-generation service with a fixed instruction
//! and parses the reply into a JSON object. The result is a *candidate*:
//! field presence, types and enum values are checked one layer up by the
//! schema validator. This module only guarantees "the model returned a
//! JSON object".

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::ExtractorConfig;
use crate::error::ExtractionError;
use crate::llm::provider::{ChatMessage, CompletionRequest, FinishReason, LlmProvider};
use crate::pipeline::types::RawMessage;

/// Unvalidated JSON object returned by the model.
pub type Candidate = Map<String, Value>;

/// Extracts request records by asking an LLM.
pub struct LlmExtractor {
    llm: Arc<dyn LlmProvider>,
    config: ExtractorConfig,
}

impl LlmExtractor {
    pub fn new(llm: Arc<dyn LlmProvider>, config: ExtractorConfig) -> Self {
        Self { llm, config }
    }

    /// Ask the model for a record and parse its reply into a JSON object.
    pub async fn extract(&self, message: &RawMessage) -> Result<Candidate, ExtractionError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_extraction_system_prompt()),
            ChatMessage::user(build_extraction_user_prompt(message)),
        ])
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens);

        let response = self.llm.complete(request).await?;

        debug!(
            uid = %message.uid,
            model = self.llm.model_name(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Extraction response received"
        );
        if response.finish_reason == FinishReason::Length {
            warn!(uid = %message.uid, "Extraction response hit the token limit");
        }

        parse_extraction_response(&response.content)
    }
}

// ── Prompt construction ─────────────────────────────────────────────

/// Fixed instruction for the extraction call.
pub fn build_extraction_system_prompt() -> String {
    "You are an assistant that reads a tenant's email and returns ONLY a JSON object \
     with exactly these fields:\n\
     - tenant_name (string)\n\
     - address (string or null)\n\
     - request_type (one of maintenance, payment, lease, general)\n\
     - summary (first line of the tenant's ask)\n\
     - full_body (full email text)\n\n\
     When deciding request_type, look only at the body and apply the first rule that fits:\n\
     1. The tenant explicitly withholds payment until a repair or maintenance issue is fixed -> \"maintenance\"\n\
     2. They ask about rent, balances, due dates or invoices -> \"payment\"\n\
     3. They ask about lease terms, renewal or their agreement -> \"lease\"\n\
     4. They ask about repairs, maintenance or facility issues -> \"maintenance\"\n\
     5. Otherwise -> \"general\"\n\n\
     Respond with only valid JSON. No markdown, no extra keys, no commentary."
        .to_string()
}

/// User message: headers and the body, untruncated (the model echoes it).
pub fn build_extraction_user_prompt(message: &RawMessage) -> String {
    format!(
        "Email headers:\nFrom: {}\nSubject: {}\n\nBody:\n{}\n\nReturn only the JSON.",
        message.sender, message.subject, message.body
    )
}

// ── Response parsing ────────────────────────────────────────────────

/// Parse the raw model output into a JSON object.
pub fn parse_extraction_response(raw: &str) -> Result<Candidate, ExtractionError> {
    if raw.trim().is_empty() {
        return Err(ExtractionError::EmptyResponse);
    }

    let json_str = extract_json_object(raw);
    let value: Value = serde_json::from_str(&json_str).map_err(ExtractionError::Malformed)?;

    match value {
        Value::Object(map) => Ok(map),
        Value::Array(_) => Err(ExtractionError::NotAnObject { found: "array" }),
        Value::String(_) => Err(ExtractionError::NotAnObject { found: "string" }),
        Value::Number(_) => Err(ExtractionError::NotAnObject { found: "number" }),
        Value::Bool(_) => Err(ExtractionError::NotAnObject { found: "boolean" }),
        Value::Null => Err(ExtractionError::NotAnObject { found: "null" }),
    }
}

/// Extract a JSON object from LLM output (handles markdown wrapping).
fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::provider::CompletionResponse;
    use std::sync::Mutex;

    fn message() -> RawMessage {
        RawMessage {
            uid: "42".into(),
            sender: "Alice <alice@example.com>".into(),
            subject: "Rent question".into(),
            date: "Thu, 01 Jan 2026 00:00:00 +0000".into(),
            body: "Hi, when is the next rent payment due?".into(),
        }
    }

    /// Mock LLM that records the request and returns a fixed reply.
    struct RecordingLlm {
        reply: Result<String, ()>,
        seen: Mutex<Option<CompletionRequest>>,
    }

    #[async_trait::async_trait]
    impl LlmProvider for RecordingLlm {
        fn model_name(&self) -> &str {
            "mock-extractor"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            *self.seen.lock().unwrap() = Some(request);
            match &self.reply {
                Ok(content) => Ok(CompletionResponse {
                    content: content.clone(),
                    input_tokens: 10,
                    output_tokens: 10,
                    finish_reason: FinishReason::Stop,
                    response_id: None,
                }),
                Err(()) => Err(LlmError::RequestFailed {
                    provider: "mock".into(),
                    reason: "connection refused".into(),
                }),
            }
        }
    }

    // ── Prompt construction tests ───────────────────────────────────

    #[test]
    fn system_prompt_lists_fields_and_rules() {
        let prompt = build_extraction_system_prompt();
        for field in ["tenant_name", "address", "request_type", "summary", "full_body"] {
            assert!(prompt.contains(field), "missing {field}");
        }
        for label in ["maintenance", "payment", "lease", "general"] {
            assert!(prompt.contains(label));
        }
        assert!(prompt.contains("withholds payment"));
    }

    #[test]
    fn user_prompt_includes_headers_and_body() {
        let prompt = build_extraction_user_prompt(&message());
        assert!(prompt.contains("From: Alice <alice@example.com>"));
        assert!(prompt.contains("Subject: Rent question"));
        assert!(prompt.contains("when is the next rent payment due?"));
    }

    #[test]
    fn user_prompt_does_not_truncate_body() {
        let mut msg = message();
        msg.body = "x".repeat(5000);
        assert!(build_extraction_user_prompt(&msg).contains(&msg.body));
    }

    // ── Response parsing tests ──────────────────────────────────────

    #[test]
    fn parse_plain_object() {
        let raw = r#"{"tenant_name": "Alice", "request_type": "payment"}"#;
        let candidate = parse_extraction_response(raw).unwrap();
        assert_eq!(candidate["tenant_name"], "Alice");
    }

    #[test]
    fn parse_object_in_markdown_fence() {
        let raw = "```json\n{\"tenant_name\": \"Bob\"}\n```";
        let candidate = parse_extraction_response(raw).unwrap();
        assert_eq!(candidate["tenant_name"], "Bob");
    }

    #[test]
    fn parse_object_with_surrounding_prose() {
        let raw = "Here you go: {\"summary\": \"Leak\"} hope that helps";
        let candidate = parse_extraction_response(raw).unwrap();
        assert_eq!(candidate["summary"], "Leak");
    }

    #[test]
    fn parse_keeps_incomplete_objects_for_schema_layer() {
        // Missing fields are the validator's concern, not a parse failure.
        let candidate = parse_extraction_response(r#"{"summary": "Hello"}"#).unwrap();
        assert_eq!(candidate.len(), 1);
    }

    #[test]
    fn parse_non_json_fails() {
        assert!(matches!(
            parse_extraction_response("NOT A JSON"),
            Err(ExtractionError::Malformed(_))
        ));
    }

    #[test]
    fn parse_truncated_json_fails() {
        assert!(matches!(
            parse_extraction_response(r#"{"tenant_name": "Alice", "summ"#),
            Err(ExtractionError::Malformed(_))
        ));
    }

    #[test]
    fn parse_empty_fails() {
        assert!(matches!(
            parse_extraction_response("  \n"),
            Err(ExtractionError::EmptyResponse)
        ));
    }

    #[test]
    fn parse_non_object_json_fails() {
        assert!(matches!(
            parse_extraction_response("[1, 2, 3]"),
            Err(ExtractionError::NotAnObject { found: "array" })
        ));
        assert!(matches!(
            parse_extraction_response("\"just text\""),
            Err(ExtractionError::NotAnObject { found: "string" })
        ));
    }

    #[test]
    fn extract_json_direct_object() {
        let input = r#"{"a": 1}"#;
        assert_eq!(extract_json_object(input), input);
    }

    // ── Extractor with mock LLM ─────────────────────────────────────

    #[tokio::test]
    async fn extract_sends_zero_temperature_request() {
        let llm = Arc::new(RecordingLlm {
            reply: Ok(r#"{"tenant_name": "Alice"}"#.into()),
            seen: Mutex::new(None),
        });
        let extractor = LlmExtractor::new(llm.clone(), ExtractorConfig::default());

        let candidate = extractor.extract(&message()).await.unwrap();
        assert_eq!(candidate["tenant_name"], "Alice");

        let seen = llm.seen.lock().unwrap().take().unwrap();
        assert_eq!(seen.temperature, Some(0.0));
        assert_eq!(seen.messages.len(), 2);
        assert!(seen.messages[1].content.contains("Rent question"));
    }

    #[tokio::test]
    async fn extract_surfaces_llm_failure() {
        let llm = Arc::new(RecordingLlm {
            reply: Err(()),
            seen: Mutex::new(None),
        });
        let extractor = LlmExtractor::new(llm, ExtractorConfig::default());
        assert!(matches!(
            extractor.extract(&message()).await,
            Err(ExtractionError::Llm(_))
        ));
    }
}
