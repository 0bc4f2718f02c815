//! Locating the record and its identifier inside a handler's response body

use serde_json::Value;

/// Identifier fields checked in order
const ID_FIELDS: &[&str] = &["id", "_id"];

/// Read a record's identifier from `id` or `_id`
///
/// Accepts string and integer identifiers and ObjectId-like objects of the
/// form `{"$oid": "..."}`. Empty strings count as missing.
pub fn record_id(record: &Value) -> Option<String> {
    let obj = record.as_object()?;
    ID_FIELDS
        .iter()
        .filter_map(|field| obj.get(*field))
        .find_map(id_value)
}

fn id_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) if n.is_u64() || n.is_i64() => Some(n.to_string()),
        Value::Object(obj) => obj.get("$oid").and_then(id_value),
        _ => None,
    }
}

/// Pick the record out of a response body
///
/// The record nested under `envelope_key` wins; otherwise the body itself is
/// the record when it is an object. Returns `None` for any other shape.
pub fn unwrap_envelope<'a>(body: &'a Value, envelope_key: &str) -> Option<&'a Value> {
    let obj = body.as_object()?;
    match obj.get(envelope_key) {
        Some(inner) if inner.is_object() => Some(inner),
        _ => Some(body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_id_variants() {
        assert_eq!(record_id(&json!({"id": "E1"})).as_deref(), Some("E1"));
        assert_eq!(record_id(&json!({"_id": "65f0c2"})).as_deref(), Some("65f0c2"));
        assert_eq!(record_id(&json!({"id": 42})).as_deref(), Some("42"));
        assert_eq!(
            record_id(&json!({"_id": {"$oid": "65f0c2aa"}})).as_deref(),
            Some("65f0c2aa")
        );
    }

    #[test]
    fn test_record_id_missing() {
        assert!(record_id(&json!({"name": "Acme"})).is_none());
        assert!(record_id(&json!({"id": ""})).is_none());
        assert!(record_id(&json!({"id": 1.5})).is_none());
        assert!(record_id(&json!(["E1"])).is_none());
    }

    #[test]
    fn test_id_falls_back_to_underscore_id() {
        let record = json!({"id": null, "_id": "E9"});
        assert_eq!(record_id(&record).as_deref(), Some("E9"));
    }

    #[test]
    fn test_unwrap_envelope() {
        let body = json!({"message": "ok", "expense": {"id": "E1", "amount": 5000}});
        assert_eq!(unwrap_envelope(&body, "expense").unwrap()["amount"], 5000);

        let bare = json!({"id": "E1", "amount": 5000});
        assert_eq!(unwrap_envelope(&bare, "expense").unwrap(), &bare);

        assert!(unwrap_envelope(&json!("created"), "expense").is_none());
    }

    #[test]
    fn test_envelope_key_is_type_specific() {
        let body = json!({"customer": {"id": "C1"}, "id": "outer"});
        assert_eq!(unwrap_envelope(&body, "customer").unwrap()["id"], "C1");
        assert_eq!(unwrap_envelope(&body, "employee").unwrap()["id"], "outer");
    }
}
