//! Argument sanitization for audit details
//!
//! Long strings are cut and structured values are replaced by a placeholder,
//! which keeps entries small and keeps sensitive payloads out of the log.

use serde_json::{json, Value};

use crate::endpoint::Access;

pub const MAX_LOGGED_LEN: usize = 100;
const TRUNCATION_MARKER: &str = "...";
const STRUCTURED_PLACEHOLDER: &str = "[Object]";

pub fn sanitize_value(value: &Value) -> Value {
    match value {
        Value::String(s) if s.chars().count() > MAX_LOGGED_LEN => {
            let cut: String = s.chars().take(MAX_LOGGED_LEN).collect();
            Value::String(format!("{}{}", cut, TRUNCATION_MARKER))
        }
        Value::Array(_) | Value::Object(_) => Value::String(STRUCTURED_PLACEHOLDER.to_string()),
        other => other.clone(),
    }
}

pub(crate) fn details_for(access: &Access) -> Value {
    match access {
        Access::Read => json!({}),
        Access::Write(value) => json!({ "newValue": sanitize_value(value) }),
        Access::Call(args) => {
            let args: Vec<Value> = args.iter().map(sanitize_value).collect();
            json!({ "args": args })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_strings_are_truncated() {
        let long = "a".repeat(MAX_LOGGED_LEN + 20);
        let sanitized = sanitize_value(&Value::String(long));
        let expected = format!("{}...", "a".repeat(MAX_LOGGED_LEN));
        assert_eq!(sanitized, Value::String(expected));

        let exact = "b".repeat(MAX_LOGGED_LEN);
        assert_eq!(sanitize_value(&json!(exact)), json!(exact));
    }

    #[test]
    fn test_structured_values_are_opaque() {
        assert_eq!(sanitize_value(&json!({ "secret": 1 })), json!("[Object]"));
        assert_eq!(sanitize_value(&json!([1, 2, 3])), json!("[Object]"));
        assert_eq!(sanitize_value(&json!(42)), json!(42));
        assert_eq!(sanitize_value(&Value::Null), Value::Null);
    }

    #[test]
    fn test_details_shape() {
        assert_eq!(details_for(&Access::Read), json!({}));
        assert_eq!(
            details_for(&Access::Write(json!("session=1"))),
            json!({ "newValue": "session=1" })
        );
        assert_eq!(
            details_for(&Access::Call(vec![json!("2d"), json!({ "alpha": false })])),
            json!({ "args": ["2d", "[Object]"] })
        );
    }
}
