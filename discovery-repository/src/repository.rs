//! Typed access to one entity kind.

use discovery_shared::diff::FieldChange;
use discovery_shared::{CatalogEntity, ChangeContext, HistoryRecord, DEFAULT_EXCLUDED_FIELDS};
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::CatalogRepositoryError;
use crate::interfaces::{CatalogStore, RecordFilter, RecordWrite, StoreOutcome, StoredRecord};

/// Result of [`Repository::upsert`].
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome<E> {
    Created(E),
    Updated {
        entity: E,
        changed_fields: Vec<String>,
    },
    Unchanged(E),
}

impl<E> SaveOutcome<E> {
    pub fn entity(&self) -> &E {
        match self {
            SaveOutcome::Created(entity)
            | SaveOutcome::Updated { entity, .. }
            | SaveOutcome::Unchanged(entity) => entity,
        }
    }

    pub fn into_entity(self) -> E {
        match self {
            SaveOutcome::Created(entity)
            | SaveOutcome::Updated { entity, .. }
            | SaveOutcome::Unchanged(entity) => entity,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, SaveOutcome::Created(_))
    }

    pub fn is_updated(&self) -> bool {
        matches!(self, SaveOutcome::Updated { .. })
    }

    pub fn is_unchanged(&self) -> bool {
        matches!(self, SaveOutcome::Unchanged(_))
    }
}

fn changed_field_names(changes: &[FieldChange]) -> Vec<String> {
    changes.iter().map(|c| c.field.clone()).collect()
}

/// Typed repository over a shared [`CatalogStore`].
///
/// `upsert` is the only write path that honors [`ChangeContext::skip_history`]
/// and custom excluded fields; deletes always record history.
pub struct Repository<E: CatalogEntity> {
    store: Arc<dyn CatalogStore>,
    excluded_fields: Vec<String>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: CatalogEntity> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            excluded_fields: self.excluded_fields.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: CatalogEntity> Repository<E> {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self {
            store,
            excluded_fields: DEFAULT_EXCLUDED_FIELDS.iter().map(|f| f.to_string()).collect(),
            _entity: PhantomData,
        }
    }

    /// Replaces the fields ignored by the change check.
    pub fn with_excluded_fields(mut self, fields: &[&str]) -> Self {
        self.excluded_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub async fn upsert(
        &self,
        entity: &E,
        ctx: &ChangeContext,
    ) -> Result<SaveOutcome<E>, CatalogRepositoryError> {
        self.upsert_from_source(entity, None, ctx).await
    }

    /// Upserts and tags the row with the upstream source that produced it.
    pub async fn upsert_from_source(
        &self,
        entity: &E,
        source: Option<&str>,
        ctx: &ChangeContext,
    ) -> Result<SaveOutcome<E>, CatalogRepositoryError> {
        let write = RecordWrite::from_entity(entity, source, &self.excluded_fields)?;
        let outcome = self.store.save(write, ctx).await?;
        Self::typed(outcome)
    }

    pub(crate) fn typed(outcome: StoreOutcome) -> Result<SaveOutcome<E>, CatalogRepositoryError> {
        Ok(match outcome {
            StoreOutcome::Created(record) => SaveOutcome::Created(record.decode()?),
            StoreOutcome::Updated { record, changes } => SaveOutcome::Updated {
                entity: record.decode()?,
                changed_fields: changed_field_names(&changes),
            },
            StoreOutcome::Unchanged(record) => SaveOutcome::Unchanged(record.decode()?),
        })
    }

    pub async fn get(&self, id: i64) -> Result<Option<E>, CatalogRepositoryError> {
        decode_optional(self.store.find_by_id(E::KIND, id).await?)
    }

    /// Like [`Repository::get`] but missing rows are an error.
    pub async fn require(&self, id: i64) -> Result<E, CatalogRepositoryError> {
        self.get(id).await?.ok_or_else(|| {
            CatalogRepositoryError::not_found(format!("{} {}", E::KIND, id))
        })
    }

    pub async fn get_by_natural_key(
        &self,
        scope: discovery_shared::Scope,
        natural_key: &str,
        draft: bool,
    ) -> Result<Option<E>, CatalogRepositoryError> {
        decode_optional(self.store.find_by_key(E::KIND, scope, natural_key, draft).await?)
    }

    pub async fn get_by_uuid(&self, uuid: Uuid, draft: bool) -> Result<Option<E>, CatalogRepositoryError> {
        decode_optional(self.store.find_by_uuid(E::KIND, uuid, draft).await?)
    }

    /// Official, non-retired rows of one partner.
    pub async fn list_by_partner(&self, partner_id: i64) -> Result<Vec<E>, CatalogRepositoryError> {
        self.list(&RecordFilter::partner(partner_id).official()).await
    }

    pub async fn list_all(&self) -> Result<Vec<E>, CatalogRepositoryError> {
        self.list(&RecordFilter::default()).await
    }

    /// Rows of one partner last written by `source`.
    pub async fn list_from_source(
        &self,
        partner_id: i64,
        source: &str,
    ) -> Result<Vec<E>, CatalogRepositoryError> {
        self.list(&RecordFilter::partner(partner_id).official().from_source(source))
            .await
    }

    pub async fn list(&self, filter: &RecordFilter) -> Result<Vec<E>, CatalogRepositoryError> {
        self.store
            .list(E::KIND, filter)
            .await?
            .iter()
            .map(|record| record.decode().map_err(CatalogRepositoryError::from))
            .collect()
    }

    pub async fn delete(&self, id: i64, ctx: &ChangeContext) -> Result<Option<E>, CatalogRepositoryError> {
        decode_optional(self.store.delete(E::KIND, id, ctx).await?)
    }

    pub async fn retire(&self, id: i64, ctx: &ChangeContext) -> Result<Option<E>, CatalogRepositoryError> {
        decode_optional(self.store.retire(E::KIND, id, ctx).await?)
    }

    pub async fn history(&self, id: i64) -> Result<Vec<HistoryRecord>, CatalogRepositoryError> {
        self.store.history(E::KIND, id).await
    }
}

fn decode_optional<E: CatalogEntity>(
    record: Option<StoredRecord>,
) -> Result<Option<E>, CatalogRepositoryError> {
    Ok(record.map(|r| r.decode()).transpose()?)
}
