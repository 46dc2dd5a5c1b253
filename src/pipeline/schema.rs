//! Strict structural contract for request records.
//!
//! LLM output is untrusted JSON. Before it becomes a `RequestRecord` it must
//! be an object with exactly these keys:
//!
//! | field          | constraint                                   |
//! |----------------|----------------------------------------------|
//! | `tenant_name`  | string, non-empty                            |
//! | `address`      | string or null                               |
//! | `request_type` | one of maintenance, payment, lease, general  |
//! | `summary`      | string, non-empty                            |
//! | `full_body`    | string, non-empty                            |
//!
//! Nothing here panics on any input; every rejection is a `SchemaError`.

use serde_json::{Map, Value};

use crate::error::SchemaError;
use crate::pipeline::types::{RequestRecord, RequestType};

/// Required keys, in the order violations are reported.
pub const REQUIRED_FIELDS: [&str; 5] = [
    "tenant_name",
    "address",
    "request_type",
    "summary",
    "full_body",
];

/// Check a candidate against the record contract.
pub fn validate(candidate: &Value) -> Result<(), SchemaError> {
    validate_record(candidate).map(|_| ())
}

/// Check a candidate and convert it into a typed record.
pub fn validate_record(candidate: &Value) -> Result<RequestRecord, SchemaError> {
    let obj = candidate.as_object().ok_or(SchemaError::NotAnObject {
        found: json_type(candidate),
    })?;

    for field in REQUIRED_FIELDS {
        if !obj.contains_key(field) {
            return Err(SchemaError::MissingField { field });
        }
    }

    if let Some(extra) = obj.keys().find(|k| !REQUIRED_FIELDS.contains(&k.as_str())) {
        return Err(SchemaError::UnexpectedField {
            field: extra.clone(),
        });
    }

    let tenant_name = non_empty_string(obj, "tenant_name")?;
    let address = nullable_string(obj, "address")?;
    let request_type = request_type(obj)?;
    let summary = non_empty_string(obj, "summary")?;
    let full_body = non_empty_string(obj, "full_body")?;

    Ok(RequestRecord {
        tenant_name,
        address,
        request_type,
        summary,
        full_body,
    })
}

fn non_empty_string(obj: &Map<String, Value>, field: &'static str) -> Result<String, SchemaError> {
    match &obj[field] {
        Value::String(s) if s.is_empty() => Err(SchemaError::EmptyField { field }),
        Value::String(s) => Ok(s.clone()),
        other => Err(SchemaError::WrongType {
            field,
            expected: "string",
            found: json_type(other),
        }),
    }
}

fn nullable_string(
    obj: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, SchemaError> {
    match &obj[field] {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        other => Err(SchemaError::WrongType {
            field,
            expected: "string or null",
            found: json_type(other),
        }),
    }
}

fn request_type(obj: &Map<String, Value>) -> Result<RequestType, SchemaError> {
    match &obj["request_type"] {
        Value::String(s) => s
            .parse()
            .map_err(|_| SchemaError::InvalidRequestType { value: s.clone() }),
        other => Err(SchemaError::WrongType {
            field: "request_type",
            expected: "string",
            found: json_type(other),
        }),
    }
}

/// JSON type name for error messages.
fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> Value {
        json!({
            "tenant_name": "Alice",
            "address": "4B",
            "request_type": "maintenance",
            "summary": "The sink is leaking",
            "full_body": "The sink is leaking\nPlease help",
        })
    }

    #[test]
    fn accepts_exact_schema() {
        let record = validate_record(&valid()).unwrap();
        assert_eq!(record.tenant_name, "Alice");
        assert_eq!(record.address.as_deref(), Some("4B"));
        assert_eq!(record.request_type, RequestType::Maintenance);
    }

    #[test]
    fn accepts_null_address() {
        let mut candidate = valid();
        candidate["address"] = Value::Null;
        let record = validate_record(&candidate).unwrap();
        assert!(record.address.is_none());
    }

    #[test]
    fn accepts_every_request_type() {
        for t in ["maintenance", "payment", "lease", "general"] {
            let mut candidate = valid();
            candidate["request_type"] = json!(t);
            assert!(validate(&candidate).is_ok(), "{t} should validate");
        }
    }

    #[test]
    fn rejects_each_missing_field() {
        for field in REQUIRED_FIELDS {
            let mut candidate = valid();
            candidate.as_object_mut().unwrap().remove(field);
            assert_eq!(
                validate(&candidate),
                Err(SchemaError::MissingField { field }),
            );
        }
    }

    #[test]
    fn rejects_extra_field() {
        let mut candidate = valid();
        candidate["priority"] = json!("high");
        assert_eq!(
            validate(&candidate),
            Err(SchemaError::UnexpectedField {
                field: "priority".into()
            }),
        );
    }

    #[test]
    fn rejects_request_type_outside_enum() {
        let mut candidate = valid();
        candidate["request_type"] = json!("emergency");
        assert!(matches!(
            validate(&candidate),
            Err(SchemaError::InvalidRequestType { .. })
        ));

        candidate["request_type"] = json!("Maintenance");
        assert!(matches!(
            validate(&candidate),
            Err(SchemaError::InvalidRequestType { .. })
        ));
    }

    #[test]
    fn rejects_empty_required_strings() {
        for field in ["tenant_name", "summary", "full_body"] {
            let mut candidate = valid();
            candidate[field] = json!("");
            assert!(matches!(
                validate(&candidate),
                Err(SchemaError::EmptyField { .. })
            ));
        }
    }

    #[test]
    fn empty_address_string_is_allowed() {
        let mut candidate = valid();
        candidate["address"] = json!("");
        assert!(validate(&candidate).is_ok());
    }

    #[test]
    fn rejects_wrong_types() {
        let mut candidate = valid();
        candidate["tenant_name"] = json!(42);
        assert_eq!(
            validate(&candidate),
            Err(SchemaError::WrongType {
                field: "tenant_name",
                expected: "string",
                found: "number",
            }),
        );

        let mut candidate = valid();
        candidate["address"] = json!(["4B"]);
        assert!(matches!(
            validate(&candidate),
            Err(SchemaError::WrongType { field: "address", .. })
        ));

        let mut candidate = valid();
        candidate["request_type"] = Value::Null;
        assert!(matches!(
            validate(&candidate),
            Err(SchemaError::WrongType { field: "request_type", .. })
        ));
    }

    #[test]
    fn rejects_non_objects() {
        for candidate in [json!(null), json!("text"), json!([1, 2]), json!(3.5), json!(true)] {
            assert!(matches!(
                validate(&candidate),
                Err(SchemaError::NotAnObject { .. })
            ));
        }
    }
}
