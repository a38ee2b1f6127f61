//! Order event payload helpers.
//!
//! Payloads cross the hub as raw JSON. These helpers read the handful of
//! fields the relay cares about without imposing a schema on the rest.

pub mod model;

use chrono::DateTime;
use serde_json::{Number, Value};

/// Payload key for the human-readable order number.
pub const ORDER_NO: &str = "orderNo";
/// Payload key for the client-generated customer identifier.
pub const CUSTOMER_IDENTIFIER: &str = "customerIdentifier";
/// Payload key for the restaurant reference.
pub const RESTAURANT: &str = "restaurant";
/// Payload key for the order status.
pub const STATUS: &str = "status";
/// Payload key for the creation timestamp.
pub const CREATED_AT: &str = "createdAt";
/// Payload key for the last update timestamp.
pub const UPDATED_AT: &str = "updatedAt";
/// Payload key for the explicit transition tag.
pub const TRANSITION: &str = "transition";

/// Coerce a scalar JSON value to its string form.
///
/// Strings are returned as-is and numbers use their shortest decimal
/// rendering, so `123`, `123.0` and `"123"` all compare equal. A populated
/// reference (an object carrying `_id`) is reduced to its id.
pub fn coerce_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(number_to_string(n)),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(map) => map.get("_id").and_then(coerce_to_string),
        _ => None,
    }
}

fn number_to_string(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if !n.is_i64() && !n.is_u64() && f.fract() == 0.0 && f.abs() < MAX_SAFE_INTEGER => {
            format!("{}", f as i64)
        }
        _ => n.to_string(),
    }
}

/// Largest integer an f64 holds exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Read a payload field and coerce it to a string.
pub fn string_field(payload: &Value, key: &str) -> Option<String> {
    payload.get(key).and_then(coerce_to_string)
}

/// Parse a timestamp to epoch milliseconds.
///
/// Accepts RFC 3339 strings (`2024-05-01T12:00:00.000Z`) and integer epoch
/// milliseconds. Anything else yields `None`.
pub fn parse_timestamp_ms(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.timestamp_millis()),
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        _ => None,
    }
}

/// Read a payload timestamp field as epoch milliseconds.
pub fn timestamp_field(payload: &Value, key: &str) -> Option<i64> {
    payload.get(key).and_then(parse_timestamp_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_number_and_string_match() {
        assert_eq!(coerce_to_string(&json!(42)), Some("42".to_string()));
        assert_eq!(coerce_to_string(&json!("42")), Some("42".to_string()));
    }

    #[test]
    fn test_coerce_integral_float_matches_integer() {
        assert_eq!(coerce_to_string(&json!(42.0)), Some("42".to_string()));
        assert_eq!(coerce_to_string(&json!(-7.0)), Some("-7".to_string()));
        assert_eq!(coerce_to_string(&json!(42.5)), Some("42.5".to_string()));
        assert_eq!(string_field(&json!({ "customerIdentifier": 1001.0 }), CUSTOMER_IDENTIFIER), Some("1001".to_string()));
    }

    #[test]
    fn test_coerce_populated_reference() {
        let restaurant = json!({ "_id": "r-1", "name": "Trattoria" });
        assert_eq!(coerce_to_string(&restaurant), Some("r-1".to_string()));
    }

    #[test]
    fn test_coerce_rejects_null_and_arrays() {
        assert_eq!(coerce_to_string(&Value::Null), None);
        assert_eq!(coerce_to_string(&json!(["a"])), None);
    }

    #[test]
    fn test_parse_rfc3339_millis() {
        let a = parse_timestamp_ms(&json!("2024-05-01T12:00:00.000Z")).unwrap();
        let b = parse_timestamp_ms(&json!("2024-05-01T12:00:01.000Z")).unwrap();
        assert_eq!(b - a, 1000);
    }

    #[test]
    fn test_parse_epoch_millis() {
        assert_eq!(parse_timestamp_ms(&json!(1714564800000_i64)), Some(1714564800000));
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(parse_timestamp_ms(&json!("yesterday")), None);
        assert_eq!(parse_timestamp_ms(&Value::Null), None);
    }
}
