//! In-memory catalog store.
//!
//! Mirrors the PostgreSQL store's semantics (natural-key and uuid uniqueness,
//! history, idempotency keys, slug history) behind a single lock, so each
//! mutating call is atomic. Used in tests and local runs without a database.

use async_trait::async_trait;
use chrono::Utc;
use discovery_shared::{
    ChangeContext, EntityKind, HistoryRecord, HistoryType, Partner, Scope,
};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::CatalogRepositoryError;
use crate::interfaces::{
    plan_save, CatalogStore, RecordFilter, RecordWrite, SavePlan, StoreOutcome, StoredRecord,
};

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    next_history_id: i64,
    partners: Vec<Partner>,
    records: HashMap<EntityKind, BTreeMap<i64, StoredRecord>>,
    history: Vec<HistoryRecord>,
    idempotency: HashMap<(EntityKind, String), i64>,
    /// `(partner_id, slug) -> course id`
    slugs: HashMap<(i64, String), i64>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn rows(&self, kind: EntityKind) -> impl Iterator<Item = &StoredRecord> {
        self.records.get(&kind).into_iter().flat_map(|m| m.values())
    }

    fn append_history(
        &mut self,
        record: &StoredRecord,
        history_type: HistoryType,
        ctx: &ChangeContext,
    ) {
        if !record.kind.has_history() {
            return;
        }
        self.next_history_id += 1;
        self.history.push(HistoryRecord {
            history_id: self.next_history_id,
            kind: record.kind,
            entity_id: record.id,
            history_type,
            history_date: Utc::now(),
            history_user: ctx.user.clone(),
            change_reason: ctx.reason.clone(),
            snapshot: record.snapshot(),
        });
    }

    fn check_uuid_free(&self, record: &StoredRecord) -> Result<(), CatalogRepositoryError> {
        let clash = self.rows(record.kind).any(|other| {
            other.id != record.id
                && other.uuid == record.uuid
                && other.draft == record.draft
                && other.partner_id == record.partner_id
        });
        if clash {
            return Err(CatalogRepositoryError::conflict(format!(
                "{} with uuid {} already exists",
                record.kind, record.uuid
            )));
        }
        Ok(())
    }
}

/// Catalog store backed by process memory.
#[derive(Default)]
pub struct InMemoryCatalogStore {
    state: RwLock<MemoryState>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of history rows across all kinds.
    pub async fn history_len(&self) -> usize {
        self.state.read().await.history.len()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn ensure_partner(
        &self,
        short_code: &str,
        name: &str,
    ) -> Result<Partner, CatalogRepositoryError> {
        let mut state = self.state.write().await;
        if let Some(partner) = state.partners.iter().find(|p| p.short_code == short_code) {
            return Ok(partner.clone());
        }
        let partner = Partner {
            id: state.next_id(),
            short_code: short_code.to_string(),
            name: name.to_string(),
        };
        state.partners.push(partner.clone());
        Ok(partner)
    }

    async fn get_partner(&self, short_code: &str) -> Result<Option<Partner>, CatalogRepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .partners
            .iter()
            .find(|p| p.short_code == short_code)
            .cloned())
    }

    async fn list_partners(&self) -> Result<Vec<Partner>, CatalogRepositoryError> {
        Ok(self.state.read().await.partners.clone())
    }

    async fn find_by_id(
        &self,
        kind: EntityKind,
        id: i64,
    ) -> Result<Option<StoredRecord>, CatalogRepositoryError> {
        let state = self.state.read().await;
        Ok(state.records.get(&kind).and_then(|m| m.get(&id)).cloned())
    }

    async fn find_by_key(
        &self,
        kind: EntityKind,
        scope: Scope,
        natural_key: &str,
        draft: bool,
    ) -> Result<Option<StoredRecord>, CatalogRepositoryError> {
        let state = self.state.read().await;
        let found = state
            .rows(kind)
            .find(|r| {
                (kind.key_is_global() || r.partner_id == scope.partner_id())
                    && r.natural_key == natural_key
                    && r.draft == draft
            })
            .cloned();
        Ok(found)
    }

    async fn find_by_uuid(
        &self,
        kind: EntityKind,
        uuid: Uuid,
        draft: bool,
    ) -> Result<Option<StoredRecord>, CatalogRepositoryError> {
        let state = self.state.read().await;
        let found = state
            .rows(kind)
            .find(|r| r.uuid == uuid && r.draft == draft)
            .cloned();
        Ok(found)
    }

    async fn list(
        &self,
        kind: EntityKind,
        filter: &RecordFilter,
    ) -> Result<Vec<StoredRecord>, CatalogRepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .rows(kind)
            .filter(|r| filter.accepts(r))
            .cloned()
            .collect())
    }

    async fn save(
        &self,
        write: RecordWrite,
        ctx: &ChangeContext,
    ) -> Result<StoreOutcome, CatalogRepositoryError> {
        let mut state = self.state.write().await;

        if let Some(key) = &ctx.idempotency_key {
            if let Some(id) = state.idempotency.get(&(write.kind, key.clone())) {
                if let Some(record) = state.records.get(&write.kind).and_then(|m| m.get(id)) {
                    return Ok(StoreOutcome::Unchanged(record.clone()));
                }
            }
        }

        let existing = state.rows(write.kind).find(|r| write.matches(r)).cloned();
        if let Some(current) = &existing {
            if current.partner_id != write.scope.partner_id() {
                return Err(CatalogRepositoryError::conflict(format!(
                    "{} '{}' belongs to another partner",
                    write.kind, write.natural_key
                )));
            }
        }

        let outcome = match plan_save(existing.as_ref(), &write, Utc::now()) {
            SavePlan::Unchanged(record) => StoreOutcome::Unchanged(record),
            SavePlan::Insert(mut record) => {
                record.id = state.next_id();
                state.check_uuid_free(&record)?;
                state
                    .records
                    .entry(record.kind)
                    .or_default()
                    .insert(record.id, record.clone());
                if !ctx.skip_history {
                    state.append_history(&record, HistoryType::Created, ctx);
                }
                StoreOutcome::Created(record)
            }
            SavePlan::Update(record, changes) => {
                state
                    .records
                    .entry(record.kind)
                    .or_default()
                    .insert(record.id, record.clone());
                if !ctx.skip_history {
                    state.append_history(&record, HistoryType::Changed, ctx);
                }
                StoreOutcome::Updated { record, changes }
            }
        };

        if let Some(key) = &ctx.idempotency_key {
            let id = outcome.record().id;
            state.idempotency.insert((write.kind, key.clone()), id);
        }

        Ok(outcome)
    }

    async fn delete(
        &self,
        kind: EntityKind,
        id: i64,
        ctx: &ChangeContext,
    ) -> Result<Option<StoredRecord>, CatalogRepositoryError> {
        let mut state = self.state.write().await;
        let removed = state.records.get_mut(&kind).and_then(|m| m.remove(&id));
        if let Some(record) = &removed {
            state.append_history(record, HistoryType::Deleted, ctx);
            if kind == EntityKind::Course {
                state.slugs.retain(|_, course_id| *course_id != id);
            }
        }
        Ok(removed)
    }

    async fn retire(
        &self,
        kind: EntityKind,
        id: i64,
        ctx: &ChangeContext,
    ) -> Result<Option<StoredRecord>, CatalogRepositoryError> {
        let mut state = self.state.write().await;
        let retired = match state.records.get_mut(&kind).and_then(|m| m.get_mut(&id)) {
            Some(record) if !record.retired => {
                record.retired = true;
                record.modified = Utc::now();
                Some(record.clone())
            }
            _ => None,
        };
        if let Some(record) = &retired {
            state.append_history(record, HistoryType::Changed, ctx);
        }
        Ok(retired)
    }

    async fn history(
        &self,
        kind: EntityKind,
        entity_id: i64,
    ) -> Result<Vec<HistoryRecord>, CatalogRepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .history
            .iter()
            .filter(|h| h.kind == kind && h.entity_id == entity_id)
            .cloned()
            .collect())
    }

    async fn list_history(
        &self,
        kind: EntityKind,
    ) -> Result<Vec<HistoryRecord>, CatalogRepositoryError> {
        let state = self.state.read().await;
        let mut rows: Vec<HistoryRecord> = state
            .history
            .iter()
            .filter(|h| h.kind == kind)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (a.entity_id, a.history_date, a.history_id).cmp(&(b.entity_id, b.history_date, b.history_id))
        });
        Ok(rows)
    }

    async fn delete_history(
        &self,
        kind: EntityKind,
        history_ids: &[i64],
    ) -> Result<u64, CatalogRepositoryError> {
        let mut state = self.state.write().await;
        let before = state.history.len();
        state
            .history
            .retain(|h| !(h.kind == kind && history_ids.contains(&h.history_id)));
        Ok((before - state.history.len()) as u64)
    }

    async fn replace_history_user(
        &self,
        old_username: &str,
        new_username: &str,
    ) -> Result<u64, CatalogRepositoryError> {
        let mut state = self.state.write().await;
        let mut updated = 0;
        for row in state.history.iter_mut() {
            if row.history_user.as_deref() == Some(old_username) {
                row.history_user = Some(new_username.to_string());
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn record_historical_slug(
        &self,
        partner_id: i64,
        course_id: i64,
        slug: &str,
    ) -> Result<(), CatalogRepositoryError> {
        let mut state = self.state.write().await;
        state.slugs.insert((partner_id, slug.to_string()), course_id);
        Ok(())
    }

    async fn find_course_by_historical_slug(
        &self,
        partner_id: i64,
        slug: &str,
    ) -> Result<Option<i64>, CatalogRepositoryError> {
        let state = self.state.read().await;
        Ok(state.slugs.get(&(partner_id, slug.to_string())).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery_shared::{Course, CourseRun, DEFAULT_EXCLUDED_FIELDS};

    fn write<E: discovery_shared::CatalogEntity>(entity: &E) -> RecordWrite {
        let excluded: Vec<String> = DEFAULT_EXCLUDED_FIELDS.iter().map(|s| s.to_string()).collect();
        RecordWrite::from_entity(entity, None, &excluded).unwrap()
    }

    fn course(partner_id: i64, key: &str) -> Course {
        Course {
            partner_id,
            key: key.into(),
            title: Some("Circuits".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_save_is_idempotent_for_identical_content() {
        let store = InMemoryCatalogStore::new();
        let ctx = ChangeContext::refresh();

        let first = store.save(write(&course(1, "MITx+6.002x")), &ctx).await.unwrap();
        let second = store.save(write(&course(1, "MITx+6.002x")), &ctx).await.unwrap();

        assert!(matches!(first, StoreOutcome::Created(_)));
        assert!(matches!(second, StoreOutcome::Unchanged(_)));
        assert_eq!(store.history_len().await, 1);
    }

    #[tokio::test]
    async fn test_same_key_in_two_partners_is_two_rows() {
        let store = InMemoryCatalogStore::new();
        let ctx = ChangeContext::refresh();

        store.save(write(&course(1, "X+1")), &ctx).await.unwrap();
        store.save(write(&course(2, "X+1")), &ctx).await.unwrap();

        let rows = store.list(EntityKind::Course, &RecordFilter::default()).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_run_keys_are_global() {
        let store = InMemoryCatalogStore::new();
        let ctx = ChangeContext::refresh();
        let run = CourseRun {
            partner_id: 1,
            course_id: 1,
            key: "course-v1:X+1+2T2024".into(),
            ..Default::default()
        };

        store.save(write(&run), &ctx).await.unwrap();
        let other_partner = CourseRun {
            partner_id: 2,
            ..run.clone()
        };
        let err = store.save(write(&other_partner), &ctx).await.unwrap_err();
        assert!(matches!(err, CatalogRepositoryError::Conflict(_)));

        // A draft twin may share the key.
        let draft = CourseRun {
            draft: true,
            ..run
        };
        assert!(matches!(
            store.save(write(&draft), &ctx).await.unwrap(),
            StoreOutcome::Created(_)
        ));
    }

    #[tokio::test]
    async fn test_idempotency_key_short_circuits() {
        let store = InMemoryCatalogStore::new();
        let ctx = ChangeContext::refresh().with_idempotency_key("req-1");

        store.save(write(&course(1, "X+1")), &ctx).await.unwrap();
        let mut changed = course(1, "X+1");
        changed.title = Some("Other".into());
        let outcome = store.save(write(&changed), &ctx).await.unwrap();

        assert!(matches!(outcome, StoreOutcome::Unchanged(_)));
        let stored: Course = outcome.record().decode().unwrap();
        assert_eq!(stored.title.as_deref(), Some("Circuits"));
    }

    #[tokio::test]
    async fn test_skip_history_is_honored_on_save() {
        let store = InMemoryCatalogStore::new();
        let ctx = ChangeContext::refresh().skipping_history();
        store.save(write(&course(1, "X+1")), &ctx).await.unwrap();
        assert_eq!(store.history_len().await, 0);
    }

    #[tokio::test]
    async fn test_retire_hides_row_until_written_again() {
        let store = InMemoryCatalogStore::new();
        let ctx = ChangeContext::refresh();
        let created = store.save(write(&course(1, "X+1")), &ctx).await.unwrap();
        let id = created.record().id;

        store.retire(EntityKind::Course, id, &ctx).await.unwrap();
        assert!(store
            .list(EntityKind::Course, &RecordFilter::partner(1))
            .await
            .unwrap()
            .is_empty());

        let revived = store.save(write(&course(1, "X+1")), &ctx).await.unwrap();
        assert!(matches!(revived, StoreOutcome::Updated { .. }));
        assert_eq!(
            store
                .list(EntityKind::Course, &RecordFilter::partner(1))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_replace_history_user() {
        let store = InMemoryCatalogStore::new();
        let ctx = ChangeContext::refresh().with_user("alice");
        store.save(write(&course(1, "X+1")), &ctx).await.unwrap();

        assert_eq!(store.replace_history_user("alice", "alice2").await.unwrap(), 1);
        assert_eq!(store.replace_history_user("nobody", "x").await.unwrap(), 0);

        let history = store.list_history(EntityKind::Course).await.unwrap();
        assert_eq!(history[0].history_user.as_deref(), Some("alice2"));
    }
}
