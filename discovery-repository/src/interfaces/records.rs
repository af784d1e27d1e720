use chrono::{DateTime, Utc};
use discovery_shared::diff::{diff_fields, object_fields, FieldChange, FieldMap};
use discovery_shared::{CatalogEntity, EntityKind, Scope};
use serde_json::Value;
use uuid::Uuid;

/// Columns the store owns. They are never part of a diff.
const ENVELOPE_FIELDS: &[&str] = &["id", "uuid", "created", "modified"];

/// A persisted row: store-owned columns plus the serialized entity.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub kind: EntityKind,
    pub id: i64,
    pub uuid: Uuid,
    pub partner_id: Option<i64>,
    pub natural_key: String,
    pub draft: bool,
    /// Upstream source that last wrote the row, if any.
    pub source: Option<String>,
    /// Soft-pruned rows are hidden from listings until they are written again.
    pub retired: bool,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub data: Value,
}

impl StoredRecord {
    /// Entity data with the store-owned columns written back in.
    pub fn snapshot(&self) -> Value {
        let mut data = self.data.clone();
        if let Value::Object(map) = &mut data {
            map.insert("id".into(), Value::from(self.id));
            map.insert("uuid".into(), Value::String(self.uuid.to_string()));
            map.insert("created".into(), Value::String(self.created.to_rfc3339()));
            map.insert("modified".into(), Value::String(self.modified.to_rfc3339()));
        }
        data
    }

    pub fn decode<E: CatalogEntity>(&self) -> Result<E, serde_json::Error> {
        serde_json::from_value(self.snapshot())
    }

    fn content_fields(&self) -> FieldMap {
        strip_envelope(object_fields(self.data.clone()))
    }
}

/// A row to create or update, matched on `(scope, natural_key, draft)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordWrite {
    pub kind: EntityKind,
    pub scope: Scope,
    pub natural_key: String,
    pub draft: bool,
    /// Used only when the row is created; nil assigns a fresh one.
    pub uuid: Uuid,
    pub source: Option<String>,
    pub data: Value,
    /// Fields ignored when deciding whether the row changed.
    pub excluded_fields: Vec<String>,
}

impl RecordWrite {
    pub fn from_entity<E: CatalogEntity>(
        entity: &E,
        source: Option<&str>,
        excluded_fields: &[String],
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind: E::KIND,
            scope: entity.scope(),
            natural_key: entity.natural_key(),
            draft: entity.draft(),
            uuid: entity.uuid(),
            source: source.map(str::to_string),
            data: serde_json::to_value(entity)?,
            excluded_fields: excluded_fields.to_vec(),
        })
    }

    /// Whether `record` matches this write's natural key.
    pub fn matches(&self, record: &StoredRecord) -> bool {
        let same_scope = self.kind.key_is_global() || record.partner_id == self.scope.partner_id();
        record.kind == self.kind
            && same_scope
            && record.natural_key == self.natural_key
            && record.draft == self.draft
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub partner_id: Option<i64>,
    pub source: Option<String>,
    pub draft: Option<bool>,
    pub include_retired: bool,
}

impl RecordFilter {
    pub fn partner(partner_id: i64) -> Self {
        Self {
            partner_id: Some(partner_id),
            ..Default::default()
        }
    }

    pub fn official(mut self) -> Self {
        self.draft = Some(false);
        self
    }

    pub fn from_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn including_retired(mut self) -> Self {
        self.include_retired = true;
        self
    }

    pub fn accepts(&self, record: &StoredRecord) -> bool {
        self.partner_id.map_or(true, |p| record.partner_id == Some(p))
            && self
                .source
                .as_ref()
                .map_or(true, |s| record.source.as_ref() == Some(s))
            && self.draft.map_or(true, |d| record.draft == d)
            && (self.include_retired || !record.retired)
    }
}

/// Result of a save as reported by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOutcome {
    Created(StoredRecord),
    Updated {
        record: StoredRecord,
        changes: Vec<FieldChange>,
    },
    Unchanged(StoredRecord),
}

impl StoreOutcome {
    pub fn record(&self) -> &StoredRecord {
        match self {
            StoreOutcome::Created(record)
            | StoreOutcome::Updated { record, .. }
            | StoreOutcome::Unchanged(record) => record,
        }
    }

    pub fn into_record(self) -> StoredRecord {
        match self {
            StoreOutcome::Created(record)
            | StoreOutcome::Updated { record, .. }
            | StoreOutcome::Unchanged(record) => record,
        }
    }
}

/// What a store must do to apply a write.
#[derive(Debug, Clone, PartialEq)]
pub enum SavePlan {
    /// Insert this record; its `id` is assigned by the store.
    Insert(StoredRecord),
    Update(StoredRecord, Vec<FieldChange>),
    Unchanged(StoredRecord),
}

/// Decides how to apply `write` given the row currently holding its natural key.
///
/// Both store implementations call this inside their write transaction so the
/// skip-if-unchanged decision is made against the locked row.
pub fn plan_save(existing: Option<&StoredRecord>, write: &RecordWrite, now: DateTime<Utc>) -> SavePlan {
    let incoming = strip_envelope(object_fields(write.data.clone()));

    match existing {
        None => SavePlan::Insert(StoredRecord {
            kind: write.kind,
            id: 0,
            uuid: if write.uuid.is_nil() {
                Uuid::new_v4()
            } else {
                write.uuid
            },
            partner_id: write.scope.partner_id(),
            natural_key: write.natural_key.clone(),
            draft: write.draft,
            source: write.source.clone(),
            retired: false,
            created: now,
            modified: now,
            data: Value::Object(incoming.into_iter().collect()),
        }),
        Some(current) => {
            let excluded: Vec<&str> = write.excluded_fields.iter().map(String::as_str).collect();
            let mut changes = match diff_fields(&current.content_fields(), &incoming, &excluded) {
                discovery_shared::FieldDiff::Changed(changes) => changes,
                discovery_shared::FieldDiff::Unchanged => Vec::new(),
            };

            if current.retired {
                changes.push(FieldChange {
                    field: "retired".into(),
                    old: Value::Bool(true),
                    new: Value::Bool(false),
                });
            }

            if changes.is_empty() {
                return SavePlan::Unchanged(current.clone());
            }

            SavePlan::Update(
                StoredRecord {
                    source: write.source.clone().or_else(|| current.source.clone()),
                    retired: false,
                    modified: now,
                    data: Value::Object(incoming.into_iter().collect()),
                    ..current.clone()
                },
                changes,
            )
        }
    }
}

fn strip_envelope(mut fields: FieldMap) -> FieldMap {
    for field in ENVELOPE_FIELDS {
        fields.remove(*field);
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery_shared::{Course, DEFAULT_EXCLUDED_FIELDS};

    fn write_for(course: &Course) -> RecordWrite {
        let excluded: Vec<String> = DEFAULT_EXCLUDED_FIELDS.iter().map(|s| s.to_string()).collect();
        RecordWrite::from_entity(course, Some("courses_api"), &excluded).unwrap()
    }

    fn course(title: &str) -> Course {
        Course {
            partner_id: 1,
            key: "MITx+0.111x".into(),
            title: Some(title.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_insert_assigns_uuid() {
        let plan = plan_save(None, &write_for(&course("A")), Utc::now());
        match plan {
            SavePlan::Insert(record) => {
                assert!(!record.uuid.is_nil());
                assert_eq!(record.partner_id, Some(1));
                assert!(record.data.get("id").is_none());
            }
            other => panic!("expected insert, got {other:?}"),
        }
    }

    #[test]
    fn test_same_content_is_unchanged() {
        let now = Utc::now();
        let SavePlan::Insert(mut stored) = plan_save(None, &write_for(&course("A")), now) else {
            panic!("expected insert");
        };
        stored.id = 7;

        // Envelope fields on the incoming entity never count as changes.
        let mut again = course("A");
        again.id = 99;
        again.modified = now + chrono::Duration::days(1);
        assert!(matches!(
            plan_save(Some(&stored), &write_for(&again), now),
            SavePlan::Unchanged(_)
        ));
    }

    #[test]
    fn test_changed_content_keeps_identity() {
        let now = Utc::now();
        let SavePlan::Insert(mut stored) = plan_save(None, &write_for(&course("A")), now) else {
            panic!("expected insert");
        };
        stored.id = 7;

        match plan_save(Some(&stored), &write_for(&course("B")), now) {
            SavePlan::Update(record, changes) => {
                assert_eq!(record.id, 7);
                assert_eq!(record.uuid, stored.uuid);
                assert_eq!(changes.len(), 1);
                assert_eq!(changes[0].field, "title");
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn test_retired_row_is_revived() {
        let now = Utc::now();
        let SavePlan::Insert(mut stored) = plan_save(None, &write_for(&course("A")), now) else {
            panic!("expected insert");
        };
        stored.retired = true;

        match plan_save(Some(&stored), &write_for(&course("A")), now) {
            SavePlan::Update(record, changes) => {
                assert!(!record.retired);
                assert_eq!(changes[0].field, "retired");
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn test_snapshot_decodes_entity() {
        let now = Utc::now();
        let SavePlan::Insert(mut stored) = plan_save(None, &write_for(&course("A")), now) else {
            panic!("expected insert");
        };
        stored.id = 3;
        let decoded: Course = stored.decode().unwrap();
        assert_eq!(decoded.id, 3);
        assert_eq!(decoded.uuid, stored.uuid);
        assert_eq!(decoded.title.as_deref(), Some("A"));
    }

    #[test]
    fn test_filter_accepts() {
        let now = Utc::now();
        let SavePlan::Insert(stored) = plan_save(None, &write_for(&course("A")), now) else {
            panic!("expected insert");
        };
        assert!(RecordFilter::partner(1).accepts(&stored));
        assert!(!RecordFilter::partner(2).accepts(&stored));
        assert!(RecordFilter::partner(1).from_source("courses_api").accepts(&stored));
        assert!(!RecordFilter::partner(1).from_source("ecommerce_api").accepts(&stored));
    }
}
