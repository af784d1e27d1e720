//! Pushes committed catalog changes to the live index.

use async_trait::async_trait;
use discovery_repository::{CatalogChange, CatalogService, ChangeListener, ChangeOp};
use discovery_search_repository::{SearchIndexError, SearchIndexService};
use discovery_search_shared::SearchDocument;
use discovery_shared::{Course, CourseRun, EntityKind, Person, Program};
use tracing::{debug, warn};

use crate::indexing::projection::Projector;

/// Indexes courses, runs, programs and people as they are written.
///
/// Deletes are always propagated. Runs of non-marketable types are never
/// created or updated in the index. Drafts are ignored. Engine failures are
/// returned to the dispatcher, which logs them; the next rebuild repairs the
/// index.
pub struct RealtimeIndexer {
    search: SearchIndexService,
}

impl RealtimeIndexer {
    pub fn new(search: SearchIndexService) -> Self {
        Self { search }
    }

    fn is_indexed(kind: EntityKind) -> bool {
        matches!(
            kind,
            EntityKind::Course | EntityKind::CourseRun | EntityKind::Program | EntityKind::Person
        )
    }

    async fn project(
        &self,
        change: &CatalogChange,
        catalog: &CatalogService,
    ) -> anyhow::Result<Option<SearchDocument>> {
        let mut projector = Projector::new(catalog);
        let document = match change.kind {
            EntityKind::Course => Some(projector.course_document(&change.decode::<Course>()?).await?),
            EntityKind::CourseRun => projector.course_run_document(&change.decode::<CourseRun>()?).await?,
            EntityKind::Program => projector.program_document(&change.decode::<Program>()?).await?,
            EntityKind::Person => Some(projector.person_document(&change.decode::<Person>()?).await?),
            _ => None,
        };
        Ok(document)
    }

    /// Upserts through the alias, binding it to a fresh index first if it is missing.
    async fn upsert(&self, document: &SearchDocument) -> Result<(), SearchIndexError> {
        match self.search.upsert(document).await {
            Err(SearchIndexError::IndexNotFound(target)) => {
                warn!(target = %target, "Alias is unbound, creating an index for it");
                self.search.ensure_alias().await?;
                self.search.upsert(document).await
            }
            other => other,
        }
    }
}

#[async_trait]
impl ChangeListener for RealtimeIndexer {
    fn name(&self) -> &'static str {
        "realtime_indexer"
    }

    async fn on_change(&self, change: &CatalogChange, catalog: &CatalogService) -> anyhow::Result<()> {
        if change.draft || !Self::is_indexed(change.kind) {
            return Ok(());
        }
        match change.op {
            ChangeOp::Deleted => match self.search.delete(&change.uuid.to_string()).await {
                Ok(()) | Err(SearchIndexError::IndexNotFound(_)) => {
                    debug!(kind = %change.kind, uuid = %change.uuid, "Removed document");
                    Ok(())
                }
                Err(e) => Err(e.into()),
            },
            ChangeOp::Created | ChangeOp::Updated => match self.project(change, catalog).await? {
                Some(document) => {
                    self.upsert(&document).await?;
                    debug!(kind = %change.kind, uuid = %change.uuid, "Indexed document");
                    Ok(())
                }
                None => {
                    debug!(kind = %change.kind, uuid = %change.uuid, "Not indexable, skipping");
                    Ok(())
                }
            },
        }
    }
}
