//! Rule-based request extractor — the fallback of last resort.
//!
//! Derives every record field from regex and keyword heuristics over the raw
//! message. No LLM, no I/O, and no error path: whatever the input, the output
//! satisfies the record schema.
//!
//! Classification checks keyword sets in priority order:
//! - maintenance (leak, repair, broken, ...)
//! - payment (rent, balance, invoice, ...)
//! - lease (lease, renew, term, ...)
//! - otherwise general

use mail_parser::MessageParser;
use regex::Regex;
use tracing::debug;

use crate::pipeline::types::{RawMessage, RequestRecord, RequestType};

/// Placeholder tenant name when the sender header yields nothing usable.
pub const UNKNOWN_TENANT: &str = "unknown";

/// Placeholder summary when neither body nor subject has text.
pub const EMPTY_SUMMARY: &str = "(no summary)";

/// Placeholder body for a zero-length message.
pub const EMPTY_BODY: &str = "(empty message)";

const MAINTENANCE_KEYWORDS: &[&str] = &[
    "leak", "repair", "broken", "clog", "lock", "heat", "ac", "electric",
];
const PAYMENT_KEYWORDS: &[&str] = &["rent", "balance", "pay", "payment", "late fee", "invoice"];
const LEASE_KEYWORDS: &[&str] = &["lease", "renew", "term", "agreement", "extend"];

/// A keyword set that maps a body to a request type.
#[derive(Debug, Clone)]
pub struct KeywordRule {
    pub request_type: RequestType,
    /// Lower-case substrings; any match selects this rule.
    pub keywords: &'static [&'static str],
}

impl KeywordRule {
    fn matches(&self, lowered_body: &str) -> bool {
        self.keywords.iter().any(|kw| lowered_body.contains(kw))
    }
}

/// Deterministic extractor over raw messages.
pub struct RuleExtractor {
    address_regex: Regex,
    /// Checked in order; first match wins.
    keyword_rules: Vec<KeywordRule>,
}

impl Default for RuleExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleExtractor {
    /// Create an extractor with the standard keyword sets.
    pub fn new() -> Self {
        Self {
            address_regex: Regex::new(r"(?i)(?:Apartment|Apt|Unit)\s*#?\s*(\w+)").unwrap(),
            keyword_rules: vec![
                KeywordRule {
                    request_type: RequestType::Maintenance,
                    keywords: MAINTENANCE_KEYWORDS,
                },
                KeywordRule {
                    request_type: RequestType::Payment,
                    keywords: PAYMENT_KEYWORDS,
                },
                KeywordRule {
                    request_type: RequestType::Lease,
                    keywords: LEASE_KEYWORDS,
                },
            ],
        }
    }

    /// Turn a raw message into a request record.
    pub fn extract(&self, message: &RawMessage) -> RequestRecord {
        let record = RequestRecord {
            tenant_name: tenant_name_from_sender(&message.sender),
            address: self.extract_address(&message.body),
            request_type: self.classify(&message.body),
            summary: summarize(&message.body, &message.subject),
            full_body: if message.body.is_empty() {
                EMPTY_BODY.to_string()
            } else {
                message.body.clone()
            },
        };

        debug!(
            uid = %message.uid,
            request_type = %record.request_type,
            has_address = record.address.is_some(),
            "Rule-based extraction complete"
        );
        record
    }

    /// Token following the first "Apartment/Apt/Unit [#]" in the body.
    pub fn extract_address(&self, body: &str) -> Option<String> {
        self.address_regex
            .captures(body)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Classify a body by the first keyword set with any match.
    pub fn classify(&self, body: &str) -> RequestType {
        let lowered = body.to_lowercase();
        self.keyword_rules
            .iter()
            .find(|rule| rule.matches(&lowered))
            .map(|rule| rule.request_type)
            .unwrap_or(RequestType::General)
    }
}

// ── Field helpers ───────────────────────────────────────────────────

/// Split a `From` header into (display name, email address).
///
/// Either part may be empty. Header parsing is delegated to `mail-parser`;
/// anything it cannot make sense of is treated as a bare address.
pub fn parse_sender(raw: &str) -> (Option<String>, String) {
    // Header folding would let a hostile value inject extra headers.
    let cleaned: String = raw
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return (None, String::new());
    }

    let header = format!("From: {cleaned}\r\n\r\n");
    let parsed = MessageParser::default().parse(header.as_bytes());
    let first = parsed
        .as_ref()
        .and_then(|msg| msg.from())
        .and_then(|addr| addr.first());

    match first {
        Some(addr) => {
            let name = addr
                .name()
                .map(|n| n.trim().trim_matches('"').trim().to_string())
                .filter(|n| !n.is_empty());
            let address = addr.address().unwrap_or_default().trim().to_string();
            (name, address)
        }
        None => (None, cleaned.to_string()),
    }
}

/// Display name if present, else the address local part, else `"unknown"`.
pub fn tenant_name_from_sender(raw: &str) -> String {
    let (name, address) = parse_sender(raw);
    if let Some(name) = name {
        return name;
    }
    let local = address.split('@').next().unwrap_or_default().trim();
    if local.is_empty() {
        UNKNOWN_TENANT.to_string()
    } else {
        local.to_string()
    }
}

/// First non-blank line of `text`, trimmed.
pub fn first_non_blank_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).find(|line| !line.is_empty())
}

/// Summary line: first body line, then the subject, then a placeholder.
fn summarize(body: &str, subject: &str) -> String {
    first_non_blank_line(body)
        .or_else(|| first_non_blank_line(subject))
        .unwrap_or(EMPTY_SUMMARY)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::schema;

    fn make_message(sender: &str, subject: &str, body: &str) -> RawMessage {
        RawMessage {
            uid: "1".into(),
            sender: sender.into(),
            subject: subject.into(),
            date: "Thu, 01 Jan 2026 00:00:00 +0000".into(),
            body: body.into(),
        }
    }

    fn assert_schema_valid(record: &RequestRecord) {
        let value = serde_json::to_value(record).unwrap();
        schema::validate(&value).unwrap();
    }

    // ── Sender parsing ──────────────────────────────────────────────

    #[test]
    fn tenant_name_prefers_display_name() {
        assert_eq!(
            tenant_name_from_sender("Alice Smith <alice@example.com>"),
            "Alice Smith"
        );
    }

    #[test]
    fn tenant_name_strips_quotes() {
        assert_eq!(
            tenant_name_from_sender("\"Carol Jones\" <carol@example.com>"),
            "Carol Jones"
        );
    }

    #[test]
    fn tenant_name_falls_back_to_local_part() {
        assert_eq!(tenant_name_from_sender("bob@example.com"), "bob");
        assert_eq!(tenant_name_from_sender("<dave@example.com>"), "dave");
    }

    #[test]
    fn tenant_name_for_empty_sender_is_placeholder() {
        assert_eq!(tenant_name_from_sender(""), UNKNOWN_TENANT);
        assert_eq!(tenant_name_from_sender("   "), UNKNOWN_TENANT);
    }

    #[test]
    fn parse_sender_splits_name_and_address() {
        let (name, address) = parse_sender("Alice Smith <alice@example.com>");
        assert_eq!(name.as_deref(), Some("Alice Smith"));
        assert_eq!(address, "alice@example.com");
    }

    // ── Address ─────────────────────────────────────────────────────

    #[test]
    fn address_from_apartment_with_hash() {
        let extractor = RuleExtractor::new();
        assert_eq!(
            extractor.extract_address("I live in Apartment #4B and the sink leaks").as_deref(),
            Some("4B")
        );
    }

    #[test]
    fn address_variants_case_insensitive() {
        let extractor = RuleExtractor::new();
        assert_eq!(extractor.extract_address("apt 12").as_deref(), Some("12"));
        assert_eq!(extractor.extract_address("UNIT#7C here").as_deref(), Some("7C"));
        assert_eq!(extractor.extract_address("Apt. 3").as_deref(), None);
    }

    #[test]
    fn address_first_match_wins() {
        let extractor = RuleExtractor::new();
        assert_eq!(
            extractor.extract_address("Unit 5 (previously Apt 9)").as_deref(),
            Some("5")
        );
    }

    #[test]
    fn address_absent_when_no_token() {
        let extractor = RuleExtractor::new();
        assert!(extractor.extract_address("Hello, when is rent due?").is_none());
    }

    // ── Classification ──────────────────────────────────────────────

    #[test]
    fn classify_maintenance() {
        let extractor = RuleExtractor::new();
        assert_eq!(extractor.classify("The faucet has a LEAK"), RequestType::Maintenance);
        assert_eq!(extractor.classify("Window is broken"), RequestType::Maintenance);
    }

    #[test]
    fn classify_payment() {
        let extractor = RuleExtractor::new();
        assert_eq!(extractor.classify("When is rent due?"), RequestType::Payment);
        assert_eq!(extractor.classify("Question about my late fee"), RequestType::Payment);
    }

    #[test]
    fn classify_lease() {
        let extractor = RuleExtractor::new();
        assert_eq!(extractor.classify("I want to renew"), RequestType::Lease);
        assert_eq!(extractor.classify("Could we extend it?"), RequestType::Lease);
    }

    #[test]
    fn classify_general() {
        let extractor = RuleExtractor::new();
        assert_eq!(extractor.classify("Just hello"), RequestType::General);
        assert_eq!(extractor.classify(""), RequestType::General);
    }

    #[test]
    fn classify_maintenance_outranks_payment() {
        let extractor = RuleExtractor::new();
        assert_eq!(
            extractor.classify("My rent is paid but the toilet is broken"),
            RequestType::Maintenance
        );
    }

    #[test]
    fn classify_payment_outranks_lease() {
        let extractor = RuleExtractor::new();
        assert_eq!(
            extractor.classify("Can I pay before I renew"),
            RequestType::Payment
        );
    }

    // ── Summary / body ──────────────────────────────────────────────

    #[test]
    fn summary_is_first_non_blank_line() {
        assert_eq!(
            summarize("\n\n   Hi there,  \nSecond line", "Subject"),
            "Hi there,"
        );
    }

    #[test]
    fn summary_falls_back_to_subject_then_placeholder() {
        assert_eq!(summarize("  \n\t\n", "Broken heater"), "Broken heater");
        assert_eq!(summarize("", ""), EMPTY_SUMMARY);
    }

    // ── Whole-record extraction ─────────────────────────────────────

    #[test]
    fn extract_full_record() {
        let extractor = RuleExtractor::new();
        let body = "The kitchen sink is leaking.\nI'm in Apartment #4B.";
        let record = extractor.extract(&make_message(
            "Alice <alice@example.com>",
            "Leak",
            body,
        ));
        assert_eq!(record.tenant_name, "Alice");
        assert_eq!(record.address.as_deref(), Some("4B"));
        assert_eq!(record.request_type, RequestType::Maintenance);
        assert_eq!(record.summary, "The kitchen sink is leaking.");
        assert_eq!(record.full_body, body);
        assert_schema_valid(&record);
    }

    #[test]
    fn extract_empty_body_is_schema_valid() {
        let extractor = RuleExtractor::new();
        let record = extractor.extract(&make_message("bob@example.com", "", ""));
        assert_eq!(record.tenant_name, "bob");
        assert!(record.address.is_none());
        assert_eq!(record.request_type, RequestType::General);
        assert_eq!(record.summary, EMPTY_SUMMARY);
        assert_eq!(record.full_body, EMPTY_BODY);
        assert_schema_valid(&record);
    }

    #[test]
    fn extract_whitespace_body_kept_verbatim() {
        let extractor = RuleExtractor::new();
        let record = extractor.extract(&make_message("", "Hello", "   \n "));
        assert_eq!(record.tenant_name, UNKNOWN_TENANT);
        assert_eq!(record.summary, "Hello");
        assert_eq!(record.full_body, "   \n ");
        assert_schema_valid(&record);
    }

    #[test]
    fn extract_is_total_over_odd_inputs() {
        let extractor = RuleExtractor::new();
        let odd = [
            ("<>", "", "\u{0}"),
            ("@", "\n", "Apt"),
            ("\"\" <@example.com>", "   ", "#"),
            ("Name Only", "re:", "unit #"),
            ("a\r\nBcc: evil@example.com", "x", "ünïcödé 🏠"),
        ];
        for (sender, subject, body) in odd {
            let record = extractor.extract(&make_message(sender, subject, body));
            assert_schema_valid(&record);
        }
    }
}
