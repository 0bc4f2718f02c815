//! Field-level change summaries between two record snapshots
//!
//! Used by the single-entry history view to show what an update touched.

use serde::Serialize;
use serde_json::Value;

/// Fields that are bookkeeping noise rather than business changes
const IGNORED_FIELDS: &[&str] = &["updatedAt", "updated_at", "__v"];

/// One top-level field that differs between the old and new snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub field: String,
    /// `None` when the field was added
    pub old: Option<Value>,
    /// `None` when the field was removed
    pub new: Option<Value>,
}

/// List the top-level fields that differ between two object snapshots
///
/// Non-object snapshots are compared as a whole under the field name `""`.
pub fn field_changes(old: &Value, new: &Value) -> Vec<FieldChange> {
    let (Value::Object(old_obj), Value::Object(new_obj)) = (old, new) else {
        if old == new {
            return Vec::new();
        }
        return vec![FieldChange {
            field: String::new(),
            old: Some(old.clone()),
            new: Some(new.clone()),
        }];
    };

    let mut changes: Vec<FieldChange> = old_obj
        .iter()
        .filter(|(key, _)| !IGNORED_FIELDS.contains(&key.as_str()))
        .filter_map(|(key, old_val)| match new_obj.get(key) {
            Some(new_val) if new_val == old_val => None,
            new_val => Some(FieldChange {
                field: key.clone(),
                old: Some(old_val.clone()),
                new: new_val.cloned(),
            }),
        })
        .collect();

    changes.extend(
        new_obj
            .iter()
            .filter(|(key, _)| !IGNORED_FIELDS.contains(&key.as_str()))
            .filter(|(key, _)| !old_obj.contains_key(key.as_str()))
            .map(|(key, new_val)| FieldChange {
                field: key.clone(),
                old: None,
                new: Some(new_val.clone()),
            }),
    );

    changes
}

/// Render changes as `field: old -> new, ...`, or `None` when nothing changed
pub fn summarize(changes: &[FieldChange]) -> Option<String> {
    if changes.is_empty() {
        return None;
    }

    let parts: Vec<String> = changes
        .iter()
        .map(|c| {
            let old = c.old.as_ref().map_or("(added)".to_string(), format_value);
            let new = c.new.as_ref().map_or("(removed)".to_string(), format_value);
            if c.field.is_empty() {
                format!("{} -> {}", old, new)
            } else {
                format!("{}: {} -> {}", c.field, old, new)
            }
        })
        .collect();

    Some(parts.join(", "))
}

/// Format a JSON value for human-readable display
fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) if s.chars().count() > 50 => {
            let head: String = s.chars().take(47).collect();
            format!("\"{}...\"", head)
        }
        Value::String(s) => format!("\"{}\"", s),
        Value::Array(arr) => format!("[{} items]", arr.len()),
        Value::Object(obj) => format!("{{{} fields}}", obj.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_amount_change() {
        let old = json!({"description": "Cement", "amount": 5000});
        let new = json!({"description": "Cement", "amount": 6000});

        let changes = field_changes(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, "amount");
        assert_eq!(summarize(&changes).unwrap(), "amount: 5000 -> 6000");
    }

    #[test]
    fn test_added_and_removed_fields() {
        let old = json!({"name": "Acme", "fax": "555-0100"});
        let new = json!({"name": "Acme", "email": "ops@acme.test"});

        let summary = summarize(&field_changes(&old, &new)).unwrap();
        assert!(summary.contains("fax: \"555-0100\" -> (removed)"));
        assert!(summary.contains("email: (added) -> \"ops@acme.test\""));
    }

    #[test]
    fn test_timestamp_noise_ignored() {
        let old = json!({"amount": 1, "updatedAt": "2024-01-01"});
        let new = json!({"amount": 1, "updatedAt": "2024-02-01"});

        assert!(field_changes(&old, &new).is_empty());
        assert!(summarize(&[]).is_none());
    }

    #[test]
    fn test_non_object_snapshots() {
        let changes = field_changes(&json!(1), &json!(2));
        assert_eq!(summarize(&changes).unwrap(), "1 -> 2");
    }

    #[test]
    fn test_long_string_truncation() {
        let old = json!({"notes": "a".repeat(100)});
        let new = json!({"notes": "short"});

        let summary = summarize(&field_changes(&old, &new)).unwrap();
        assert!(summary.contains("...\""));
        assert!(summary.ends_with("\"short\""));
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&json!(null)), "null");
        assert_eq!(format_value(&json!(true)), "true");
        assert_eq!(format_value(&json!([1, 2, 3])), "[3 items]");
        assert_eq!(format_value(&json!({"a": 1, "b": 2})), "{2 fields}");
    }
}
