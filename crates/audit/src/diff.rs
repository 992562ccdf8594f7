use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use taskhub_models::FieldChange;

/// Field-level before/after diff between two entity snapshots.
///
/// Every field present in either snapshot is compared by value (arrays
/// element-wise, in order); unchanged fields are skipped, as are fields
/// absent from both sides. A pure creation (no `before`) therefore lists
/// every field of `after`; identical snapshots produce an empty map.
pub fn diff(before: Option<&Value>, after: Option<&Value>) -> BTreeMap<String, FieldChange> {
    let empty = serde_json::Map::new();
    let before_fields = before.and_then(Value::as_object).unwrap_or(&empty);
    let after_fields = after.and_then(Value::as_object).unwrap_or(&empty);

    let names: BTreeSet<&String> = before_fields.keys().chain(after_fields.keys()).collect();

    let mut changes = BTreeMap::new();
    for name in names {
        let old = before_fields.get(name.as_str());
        let new = after_fields.get(name.as_str());
        if old == new {
            continue;
        }
        changes.insert(
            name.clone(),
            FieldChange {
                before: old.cloned(),
                after: new.cloned(),
            },
        );
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_field_change() {
        let before = json!({"title": "a", "status": "backlog"});
        let after = json!({"title": "a", "status": "done"});
        let changes = diff(Some(&before), Some(&after));
        assert_eq!(changes.len(), 1);
        let change = &changes["status"];
        assert_eq!(change.before, Some(json!("backlog")));
        assert_eq!(change.after, Some(json!("done")));
    }

    #[test]
    fn test_identical_snapshots_yield_empty_diff() {
        let snap = json!({"title": "a", "tags": ["x", "y"]});
        assert!(diff(Some(&snap), Some(&snap)).is_empty());
    }

    #[test]
    fn test_creation_lists_every_field() {
        let after = json!({"title": "a", "status": "backlog"});
        let changes = diff(None, Some(&after));
        assert_eq!(changes.len(), 2);
        assert_eq!(changes["title"].before, None);
        assert_eq!(changes["title"].after, Some(json!("a")));
    }

    #[test]
    fn test_deletion_lists_every_field() {
        let before = json!({"title": "a"});
        let changes = diff(Some(&before), None);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes["title"].after, None);
    }

    #[test]
    fn test_arrays_compared_element_wise() {
        let before = json!({"assigneeIds": ["u1", "u2"]});
        let after = json!({"assigneeIds": ["u2", "u1"]});
        // Same elements, different order: a change.
        assert_eq!(diff(Some(&before), Some(&after)).len(), 1);

        let same = json!({"assigneeIds": ["u1", "u2"]});
        assert!(diff(Some(&before), Some(&same)).is_empty());
    }

    #[test]
    fn test_field_appearing_and_disappearing() {
        let before = json!({"dueDate": "2026-09-01T00:00:00Z"});
        let after = json!({"priority": "high"});
        let changes = diff(Some(&before), Some(&after));
        assert_eq!(changes.len(), 2);
        assert_eq!(changes["dueDate"].after, None);
        assert_eq!(changes["priority"].before, None);
    }
}
