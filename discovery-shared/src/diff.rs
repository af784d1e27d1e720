//! Field-level change tracking.
//!
//! Rows are compared as flat maps of their serialized fields. A save is only
//! persisted (and only appends history) when the diff is [`FieldDiff::Changed`].

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Fields that never count as a change on their own.
pub const DEFAULT_EXCLUDED_FIELDS: &[&str] = &["modified"];

pub type FieldMap = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field: String,
    pub old: Value,
    pub new: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldDiff {
    Changed(Vec<FieldChange>),
    Unchanged,
}

impl FieldDiff {
    pub fn is_changed(&self) -> bool {
        matches!(self, FieldDiff::Changed(_))
    }

    pub fn changed_fields(&self) -> Vec<&str> {
        match self {
            FieldDiff::Changed(changes) => changes.iter().map(|c| c.field.as_str()).collect(),
            FieldDiff::Unchanged => Vec::new(),
        }
    }
}

/// Serializes a struct into its top-level field map.
///
/// Non-object values map to an empty field set.
pub fn field_map<T: Serialize>(value: &T) -> Result<FieldMap, serde_json::Error> {
    Ok(object_fields(serde_json::to_value(value)?))
}

pub fn object_fields(value: Value) -> FieldMap {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        _ => FieldMap::new(),
    }
}

/// Compares two field maps, ignoring `exclude`.
///
/// A field missing on one side compares as `null`.
pub fn diff_fields(old: &FieldMap, new: &FieldMap, exclude: &[&str]) -> FieldDiff {
    let mut changes = Vec::new();
    let fields = old.keys().chain(new.keys().filter(|k| !old.contains_key(*k)));

    for field in fields {
        if exclude.contains(&field.as_str()) {
            continue;
        }
        let before = old.get(field).unwrap_or(&Value::Null);
        let after = new.get(field).unwrap_or(&Value::Null);
        if before != after {
            changes.push(FieldChange {
                field: field.clone(),
                old: before.clone(),
                new: after.clone(),
            });
        }
    }

    if changes.is_empty() {
        FieldDiff::Unchanged
    } else {
        FieldDiff::Changed(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> FieldMap {
        object_fields(value)
    }

    #[test]
    fn test_identical_maps_are_unchanged() {
        let a = map(json!({"title": "Intro", "modified": "2024-01-01"}));
        assert_eq!(diff_fields(&a, &a, DEFAULT_EXCLUDED_FIELDS), FieldDiff::Unchanged);
    }

    #[test]
    fn test_excluded_fields_are_ignored() {
        let a = map(json!({"title": "Intro", "modified": "2024-01-01"}));
        let b = map(json!({"title": "Intro", "modified": "2024-02-02"}));
        assert_eq!(diff_fields(&a, &b, DEFAULT_EXCLUDED_FIELDS), FieldDiff::Unchanged);
        assert!(diff_fields(&a, &b, &[]).is_changed());
    }

    #[test]
    fn test_changes_are_reported_per_field() {
        let a = map(json!({"title": "Intro", "hidden": false}));
        let b = map(json!({"title": "Intro II", "hidden": false, "slug": "intro"}));
        let diff = diff_fields(&a, &b, DEFAULT_EXCLUDED_FIELDS);
        let mut fields = diff.changed_fields();
        fields.sort();
        assert_eq!(fields, vec!["slug", "title"]);
    }

    #[test]
    fn test_missing_field_equals_null() {
        let a = map(json!({"title": null}));
        let b = map(json!({}));
        assert_eq!(diff_fields(&a, &b, &[]), FieldDiff::Unchanged);
    }
}
