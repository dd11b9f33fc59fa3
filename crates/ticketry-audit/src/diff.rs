//! Field-level diffs between two state snapshots.

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use ticketry_core::Redactor;

use crate::event::State;

/// How a field differs between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// Present only in the new snapshot.
    Added,
    /// Present in both with different values.
    Modified,
    /// Present only in the old snapshot.
    Removed,
    /// Same elements in a different order. Never produced by
    /// [`calculate_changes`]; available to callers that diff ordered
    /// collections themselves.
    Reordered,
}

/// A single field difference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Top-level field name.
    pub field: String,

    /// Value before the change; `None` if the field was absent.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_value"
    )]
    pub old_value: Option<Value>,

    /// Value after the change; `None` if the field was absent.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_value"
    )]
    pub new_value: Option<Value>,

    /// Kind of change.
    pub change_type: ChangeType,
}

/// Distinguishes a field holding `null` from an absent one: absent slots are
/// omitted on write, so any value that is present, `null` included, is `Some`.
fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl FieldChange {
    /// Returns a copy with the values redacted, or `None` if the change
    /// carries a non-string value under a sensitive field name.
    pub(crate) fn redacted(&self, redactor: &mut Redactor) -> Option<Self> {
        let old_value = redact_slot(redactor, &self.field, self.old_value.as_ref())?;
        let new_value = redact_slot(redactor, &self.field, self.new_value.as_ref())?;
        Some(Self {
            field: self.field.clone(),
            old_value,
            new_value,
            change_type: self.change_type,
        })
    }
}

fn redact_slot(redactor: &mut Redactor, field: &str, value: Option<&Value>) -> Option<Option<Value>> {
    match value {
        None => Some(None),
        Some(v) => redactor.redact_entry(field, v).map(Some),
    }
}

/// Computes the top-level field differences from `before` to `after`.
///
/// Values are compared structurally, so identical snapshots produce no
/// changes. Nested objects are not descended into: any difference inside one
/// is reported as a single `Modified` change of the top-level field. Changes
/// are ordered by field name.
///
/// ```
/// use serde_json::json;
/// use ticketry_audit::{calculate_changes, ChangeType};
///
/// let before = json!({ "a": 1, "b": 2 });
/// let after = json!({ "a": 1, "b": 3, "c": 4 });
/// let changes = calculate_changes(
///     before.as_object().unwrap(),
///     after.as_object().unwrap(),
/// );
///
/// assert_eq!(changes.len(), 2);
/// assert_eq!(changes[0].field, "b");
/// assert_eq!(changes[0].change_type, ChangeType::Modified);
/// assert_eq!(changes[1].field, "c");
/// assert_eq!(changes[1].change_type, ChangeType::Added);
/// ```
#[must_use]
pub fn calculate_changes(before: &State, after: &State) -> Vec<FieldChange> {
    let fields: BTreeSet<&String> = before.keys().chain(after.keys()).collect();

    fields
        .into_iter()
        .filter_map(|field| {
            let old_value = before.get(field);
            let new_value = after.get(field);
            let change_type = match (old_value, new_value) {
                (None, Some(_)) => ChangeType::Added,
                (Some(_), None) => ChangeType::Removed,
                (Some(old), Some(new)) if old != new => ChangeType::Modified,
                _ => return None,
            };
            Some(FieldChange {
                field: field.clone(),
                old_value: old_value.cloned(),
                new_value: new_value.cloned(),
                change_type,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state(value: Value) -> State {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_identical_snapshots_have_no_changes() {
        let s = state(json!({ "title": "X", "nested": { "a": [1, 2] } }));
        assert!(calculate_changes(&s, &s.clone()).is_empty());
    }

    #[test]
    fn test_added_modified_removed() {
        let before = state(json!({ "a": 1, "b": 2, "gone": true }));
        let after = state(json!({ "a": 1, "b": 3, "c": 4 }));

        let changes = calculate_changes(&before, &after);
        assert_eq!(
            changes,
            vec![
                FieldChange {
                    field: "b".into(),
                    old_value: Some(json!(2)),
                    new_value: Some(json!(3)),
                    change_type: ChangeType::Modified,
                },
                FieldChange {
                    field: "c".into(),
                    old_value: None,
                    new_value: Some(json!(4)),
                    change_type: ChangeType::Added,
                },
                FieldChange {
                    field: "gone".into(),
                    old_value: Some(json!(true)),
                    new_value: None,
                    change_type: ChangeType::Removed,
                },
            ]
        );
    }

    #[test]
    fn test_nested_change_reported_at_top_level() {
        let before = state(json!({ "meta": { "labels": ["bug"] } }));
        let after = state(json!({ "meta": { "labels": ["bug", "p1"] } }));

        let changes = calculate_changes(&before, &after);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, "meta");
        assert_eq!(changes[0].change_type, ChangeType::Modified);
    }

    #[test]
    fn test_null_is_a_value() {
        let before = state(json!({ "assignee": null }));
        let after = state(json!({}));

        let changes = calculate_changes(&before, &after);
        assert_eq!(changes[0].change_type, ChangeType::Removed);
        assert_eq!(changes[0].old_value, Some(Value::Null));
    }

    #[test]
    fn test_order_is_by_field_name() {
        let before = state(json!({ "z": 1, "m": 1 }));
        let after = state(json!({ "a": 1, "z": 2 }));

        let fields: Vec<_> = calculate_changes(&before, &after)
            .into_iter()
            .map(|c| c.field)
            .collect();
        assert_eq!(fields, vec!["a", "m", "z"]);
    }

    #[test]
    fn test_redacted_change() {
        let mut redactor = Redactor::new();
        let change = FieldChange {
            field: "password".into(),
            old_value: Some(json!("old")),
            new_value: Some(json!("new")),
            change_type: ChangeType::Modified,
        };
        let redacted = change.redacted(&mut redactor).unwrap();
        assert_eq!(redacted.old_value, Some(json!(ticketry_core::REDACTION_MARKER)));
        assert_eq!(redacted.new_value, Some(json!(ticketry_core::REDACTION_MARKER)));

        let structured = FieldChange {
            field: "apiKey".into(),
            old_value: None,
            new_value: Some(json!({ "k": 1 })),
            change_type: ChangeType::Added,
        };
        assert!(structured.redacted(&mut redactor).is_none());
    }

    #[test]
    fn test_change_serialization() {
        let change = FieldChange {
            field: "c".into(),
            old_value: None,
            new_value: Some(json!(4)),
            change_type: ChangeType::Added,
        };
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(
            json,
            json!({ "field": "c", "new_value": 4, "change_type": "added" })
        );

        let back: FieldChange = serde_json::from_value(json).unwrap();
        assert_eq!(back, change);
    }

    #[test]
    fn test_null_value_is_kept_apart_from_absent() {
        let before = state(json!({ "assignee": null, "a": 1 }));
        let after = state(json!({ "assignee": "bob" }));
        let changes = calculate_changes(&before, &after);
        assert_eq!(changes[1].field, "assignee");
        assert_eq!(changes[1].old_value, Some(Value::Null));

        let json = serde_json::to_value(&changes).unwrap();
        assert_eq!(json[1].get("old_value"), Some(&Value::Null));
        assert!(json[0].get("new_value").is_none());

        let back: Vec<FieldChange> = serde_json::from_value(json).unwrap();
        assert_eq!(back, changes);
    }
}
