use serde_json::Value;
use sha2::{Digest, Sha256};

/// SHA-256 of the invoice JSON. `serde_json` keeps object keys sorted, so
/// key order in the incoming payload does not change the hash.
pub fn payload_hash(invoice: &Value) -> String {
    let bytes = serde_json::to_vec(invoice).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))
}

/// An invoice payload must be present and non-empty.
pub fn is_present(invoice: Option<&Value>) -> bool {
    match invoice {
        None | Some(Value::Null) => false,
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(_) => true,
    }
}

/// Required string field: present and not blank.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn hash_ignores_key_order() {
        let a: Value = serde_json::from_str(r#"{"a":1,"b":{"c":2,"d":3}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"b":{"d":3,"c":2},"a":1}"#).unwrap();
        assert_eq!(payload_hash(&a), payload_hash(&b));
        assert_ne!(payload_hash(&a), payload_hash(&json!({"a": 2})));
        assert_eq!(payload_hash(&a).len(), 64);
    }

    #[test]
    fn empty_payloads_are_missing() {
        assert!(!is_present(None));
        assert!(!is_present(Some(&Value::Null)));
        assert!(!is_present(Some(&json!({}))));
        assert!(!is_present(Some(&json!("  "))));
        assert!(is_present(Some(&json!({"numero": "1"}))));
    }

    #[test]
    fn blank_strings_are_missing() {
        assert_eq!(non_blank(Some(" x ")), Some("x"));
        assert_eq!(non_blank(Some("")), None);
        assert_eq!(non_blank(None), None);
    }
}
