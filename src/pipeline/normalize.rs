//! Deterministic correction of LLM-assigned request types.
//!
//! The LLM picks a `request_type`, but its label is not trusted. After a
//! record passes schema validation, the type is re-derived from the body
//! with an ordered rule table (first match wins):
//!
//! 1. Withholding payment until a repair → maintenance
//! 2. Rent / balance / due / invoice → payment
//! 3. Lease / renew / agreement → lease
//! 4. Repair vocabulary → maintenance
//! 5. No match → keep the LLM's label
//!
//! Rule 1 must precede rule 2: "I won't send rent until you fix the toilet"
//! is a maintenance request in payment clothing.
//!
//! Only applied to LLM output. Rule-based records already carry their own
//! final classification.

use tracing::debug;

use crate::pipeline::types::{RequestRecord, RequestType};

/// A classification rule: every group must have at least one phrase present.
#[derive(Debug)]
pub struct ClassificationRule {
    pub name: &'static str,
    /// Conjunction of disjunctions over lower-case substrings.
    pub all_of: &'static [&'static [&'static str]],
    pub request_type: RequestType,
}

impl ClassificationRule {
    fn matches(&self, lowered_body: &str) -> bool {
        self.all_of
            .iter()
            .all(|group| group.iter().any(|phrase| lowered_body.contains(phrase)))
    }
}

const WITHHOLDING_PHRASES: &[&str] = &[
    "not going to send",
    "won't send",
    "will not send",
    "until fix",
    "until you fix",
];
const WITHHOLDING_REPAIR_WORDS: &[&str] = &["fix", "toilet", "leak", "repair", "maintenance"];
const PAYMENT_WORDS: &[&str] = &["rent", "balance", "due", "invoice"];
const LEASE_WORDS: &[&str] = &["lease", "renew", "agreement"];
const MAINTENANCE_WORDS: &[&str] = &["repair", "leak", "clog", "lock", "heat", "ac", "electric"];

/// Rules in precedence order.
pub const RULES: &[ClassificationRule] = &[
    ClassificationRule {
        name: "withholding_maintenance",
        all_of: &[WITHHOLDING_PHRASES, WITHHOLDING_REPAIR_WORDS],
        request_type: RequestType::Maintenance,
    },
    ClassificationRule {
        name: "payment",
        all_of: &[PAYMENT_WORDS],
        request_type: RequestType::Payment,
    },
    ClassificationRule {
        name: "lease",
        all_of: &[LEASE_WORDS],
        request_type: RequestType::Lease,
    },
    ClassificationRule {
        name: "generic_maintenance",
        all_of: &[MAINTENANCE_WORDS],
        request_type: RequestType::Maintenance,
    },
];

/// First rule matching `body`, if any.
pub fn matching_rule(body: &str) -> Option<&'static ClassificationRule> {
    let lowered = body.to_lowercase();
    RULES.iter().find(|rule| rule.matches(&lowered))
}

/// Re-derive the request type of `record` from its full body.
pub fn normalize(record: &RequestRecord) -> RequestType {
    match matching_rule(&record.full_body) {
        Some(rule) => {
            if rule.request_type != record.request_type {
                debug!(
                    rule = rule.name,
                    from = %record.request_type,
                    to = %rule.request_type,
                    "Normalizer overrode request type"
                );
            }
            rule.request_type
        }
        None => record.request_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(body: &str, request_type: RequestType) -> RequestRecord {
        RequestRecord {
            tenant_name: "Tenant".into(),
            address: None,
            request_type,
            summary: "summary".into(),
            full_body: body.into(),
        }
    }

    #[test]
    fn withholding_beats_payment_vocabulary() {
        let r = record(
            "I won't send rent until you fix the toilet",
            RequestType::Payment,
        );
        assert_eq!(normalize(&r), RequestType::Maintenance);
    }

    #[test]
    fn withholding_needs_repair_word() {
        // Withholding phrase alone falls through to payment.
        let r = record("I won't send the rent this month", RequestType::General);
        assert_eq!(normalize(&r), RequestType::Payment);
    }

    #[test]
    fn payment_question() {
        let r = record("What is my rent balance?", RequestType::General);
        assert_eq!(normalize(&r), RequestType::Payment);
    }

    #[test]
    fn lease_question() {
        let r = record("Can I renew my lease?", RequestType::General);
        assert_eq!(normalize(&r), RequestType::Lease);
    }

    #[test]
    fn generic_maintenance() {
        let r = record("My heater is broken", RequestType::General);
        assert_eq!(normalize(&r), RequestType::Maintenance);
    }

    #[test]
    fn no_match_keeps_original() {
        assert_eq!(
            normalize(&record("Just hello", RequestType::General)),
            RequestType::General
        );
        assert_eq!(
            normalize(&record("Just hello", RequestType::Lease)),
            RequestType::Lease
        );
    }

    #[test]
    fn matching_is_case_insensitive() {
        let r = record("WHAT IS MY RENT BALANCE?", RequestType::General);
        assert_eq!(normalize(&r), RequestType::Payment);
    }

    #[test]
    fn overrides_wrong_llm_label() {
        let r = record(
            "I have the rent ready but won't send it until you fix the sink.",
            RequestType::Payment,
        );
        assert_eq!(normalize(&r), RequestType::Maintenance);
    }

    #[test]
    fn normalize_is_idempotent() {
        let bodies = [
            "I won't send rent until you fix the toilet",
            "What is my rent balance?",
            "Can I renew my lease?",
            "My heater is broken",
            "Just hello",
        ];
        for body in bodies {
            for original in RequestType::ALL {
                let mut r = record(body, original);
                let once = normalize(&r);
                r.request_type = once;
                assert_eq!(normalize(&r), once, "body: {body}");
            }
        }
    }

    #[test]
    fn matching_rule_reports_name() {
        assert_eq!(
            matching_rule("Can I renew my lease?").map(|r| r.name),
            Some("lease")
        );
        assert!(matching_rule("Just hello").is_none());
    }
}
