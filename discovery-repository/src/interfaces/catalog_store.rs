use async_trait::async_trait;
use discovery_shared::{ChangeContext, EntityKind, HistoryRecord, Partner, Scope};
use uuid::Uuid;

use crate::errors::CatalogRepositoryError;
use crate::interfaces::{RecordFilter, RecordWrite, StoreOutcome, StoredRecord};

/// Abstracts the backend that persists catalog rows and their history.
///
/// Every mutating method runs in its own transaction: the row change, its
/// history entry and the idempotency marker commit together or not at all.
/// Implementations are injected into [`crate::CatalogService`], which layers
/// the cross-entity invariants on top.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Returns the partner with `short_code`, creating it if needed.
    async fn ensure_partner(
        &self,
        short_code: &str,
        name: &str,
    ) -> Result<Partner, CatalogRepositoryError>;

    async fn get_partner(&self, short_code: &str) -> Result<Option<Partner>, CatalogRepositoryError>;

    async fn list_partners(&self) -> Result<Vec<Partner>, CatalogRepositoryError>;

    async fn find_by_id(
        &self,
        kind: EntityKind,
        id: i64,
    ) -> Result<Option<StoredRecord>, CatalogRepositoryError>;

    /// Looks a row up by natural key. Kinds with global keys ignore `scope`.
    async fn find_by_key(
        &self,
        kind: EntityKind,
        scope: Scope,
        natural_key: &str,
        draft: bool,
    ) -> Result<Option<StoredRecord>, CatalogRepositoryError>;

    async fn find_by_uuid(
        &self,
        kind: EntityKind,
        uuid: Uuid,
        draft: bool,
    ) -> Result<Option<StoredRecord>, CatalogRepositoryError>;

    /// Rows of `kind` accepted by `filter`, ordered by id.
    async fn list(
        &self,
        kind: EntityKind,
        filter: &RecordFilter,
    ) -> Result<Vec<StoredRecord>, CatalogRepositoryError>;

    /// Creates or updates the row matching the write's natural key.
    ///
    /// Unchanged saves write nothing and append no history.
    async fn save(
        &self,
        write: RecordWrite,
        ctx: &ChangeContext,
    ) -> Result<StoreOutcome, CatalogRepositoryError>;

    /// Hard-deletes a row, returning it if it existed.
    async fn delete(
        &self,
        kind: EntityKind,
        id: i64,
        ctx: &ChangeContext,
    ) -> Result<Option<StoredRecord>, CatalogRepositoryError>;

    /// Hides a row from listings without deleting it.
    async fn retire(
        &self,
        kind: EntityKind,
        id: i64,
        ctx: &ChangeContext,
    ) -> Result<Option<StoredRecord>, CatalogRepositoryError>;

    /// History of one row, oldest first.
    async fn history(
        &self,
        kind: EntityKind,
        entity_id: i64,
    ) -> Result<Vec<HistoryRecord>, CatalogRepositoryError>;

    /// All history of a kind, ordered by entity, then date, then history id.
    async fn list_history(
        &self,
        kind: EntityKind,
    ) -> Result<Vec<HistoryRecord>, CatalogRepositoryError>;

    async fn delete_history(
        &self,
        kind: EntityKind,
        history_ids: &[i64],
    ) -> Result<u64, CatalogRepositoryError>;

    /// Rewrites `history_user` across every history table.
    async fn replace_history_user(
        &self,
        old_username: &str,
        new_username: &str,
    ) -> Result<u64, CatalogRepositoryError>;

    /// Remembers a slug a course used to have.
    async fn record_historical_slug(
        &self,
        partner_id: i64,
        course_id: i64,
        slug: &str,
    ) -> Result<(), CatalogRepositoryError>;

    async fn find_course_by_historical_slug(
        &self,
        partner_id: i64,
        slug: &str,
    ) -> Result<Option<i64>, CatalogRepositoryError>;
}
