//! Loaders: one per upstream listing, run by the orchestrator in dependency order.
//!
//! Every loader follows the same steps. It fetches its whole listing, maps
//! each record onto the canonical type (resolving references by natural key
//! and creating placeholders for missing ones), saves it through the catalog
//! service, and remembers the natural keys it saw. At the end it prunes the
//! rows its source wrote earlier but no longer lists.

mod commerce;
mod courses;
mod organizations;
mod people;
mod programs;
mod vocabulary;

pub use commerce::{EntitlementsLoader, SeatsLoader};
pub use courses::{CourseMarketingLoader, CoursesLoader};
pub use organizations::OrganizationsLoader;
pub use people::PeopleLoader;
pub use programs::ProgramsLoader;
pub use vocabulary::VocabularyLoader;

use std::collections::HashSet;
use std::future::Future;

use async_trait::async_trait;
use discovery_clients::Rejection;
use discovery_repository::CatalogService;
use discovery_shared::{
    CatalogEntity, ChangeContext, Course, EntityKind, FeatureFlags, Organization, Partner, Scope,
};
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::errors::LoaderError;
use crate::outcome::{KindOutcome, RefreshOutcome, WriteStatus};
use crate::prune::{prune_unseen, PrunePolicy};

pub const DEFAULT_WRITE_WORKERS: usize = 8;

/// Knobs of one refresh task, read once when the task starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefreshSettings {
    pub flags: FeatureFlags,
    pub prune: PrunePolicy,
    /// Concurrent writes per loader when `threaded_metadata_write` is on.
    pub write_workers: usize,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            flags: FeatureFlags::default(),
            prune: PrunePolicy::default(),
            write_workers: DEFAULT_WRITE_WORKERS,
        }
    }
}

impl RefreshSettings {
    pub fn new(flags: FeatureFlags) -> Self {
        Self {
            flags,
            ..Self::default()
        }
    }

    pub fn with_prune_policy(mut self, prune: PrunePolicy) -> Self {
        self.prune = prune;
        self
    }

    pub fn with_write_workers(mut self, workers: usize) -> Self {
        self.write_workers = workers.max(1);
        self
    }
}

/// What one loader needs to write a partner's rows.
pub struct LoaderContext {
    pub catalog: CatalogService,
    pub partner: Partner,
    pub settings: RefreshSettings,
    pub change: ChangeContext,
}

impl LoaderContext {
    pub fn new(catalog: CatalogService, partner: Partner, settings: RefreshSettings) -> Self {
        Self {
            catalog,
            partner,
            settings,
            change: ChangeContext::refresh(),
        }
    }

    pub fn partner_id(&self) -> i64 {
        self.partner.id
    }

    pub fn scope(&self) -> Scope {
        Scope::Partner(self.partner.id)
    }

    /// Awaits record writes, through a bounded pool when threaded writes are on.
    ///
    /// With the pool, completion order is not upstream order.
    pub async fn run_writes<Fut, R>(&self, writes: Vec<Fut>) -> Vec<R>
    where
        Fut: Future<Output = R>,
    {
        if self.settings.flags.threaded_metadata_write && self.settings.write_workers > 1 {
            stream::iter(writes)
                .buffer_unordered(self.settings.write_workers)
                .collect()
                .await
        } else {
            let mut results = Vec::with_capacity(writes.len());
            for write in writes {
                results.push(write.await);
            }
            results
        }
    }

    /// Official row of `E` with natural key `key` in this partner.
    pub async fn find<E: CatalogEntity>(&self, key: &str) -> Result<Option<E>, LoaderError> {
        Ok(self
            .catalog
            .repo::<E>()
            .get_by_natural_key(self.scope(), key, false)
            .await?)
    }

    /// Shared vocabulary row with natural key `key`.
    pub async fn find_global<E: CatalogEntity>(&self, key: &str) -> Result<Option<E>, LoaderError> {
        Ok(self
            .catalog
            .repo::<E>()
            .get_by_natural_key(Scope::Global, key, false)
            .await?)
    }

    /// The organization with `key`, created as a bare placeholder when missing.
    pub async fn ensure_organization(&self, key: &str) -> Result<Organization, LoaderError> {
        if let Some(org) = self.find::<Organization>(key).await? {
            return Ok(org);
        }
        debug!(key, "Creating placeholder organization");
        let placeholder = Organization {
            partner_id: self.partner_id(),
            key: key.to_string(),
            ..Default::default()
        };
        Ok(self
            .catalog
            .save_organization(&placeholder, None, &self.change)
            .await?
            .into_entity())
    }

    pub async fn ensure_organizations(&self, keys: &[String]) -> Result<Vec<i64>, LoaderError> {
        let mut ids = Vec::with_capacity(keys.len());
        for key in keys {
            ids.push(self.ensure_organization(key).await?.id);
        }
        Ok(ids)
    }

    /// The course with `key`, created as a placeholder owned by its key's organization.
    pub async fn ensure_course(&self, key: &str) -> Result<Course, LoaderError> {
        if let Some(course) = self.find::<Course>(key).await? {
            return Ok(course);
        }
        debug!(key, "Creating placeholder course");
        let mut placeholder = Course {
            partner_id: self.partner_id(),
            key: key.to_string(),
            ..Default::default()
        };
        if let Some(org) = course_org(key) {
            placeholder.authoring_organization_ids = vec![self.ensure_organization(org).await?.id];
        }
        Ok(self
            .catalog
            .save_course(&placeholder, None, &self.change)
            .await?
            .into_entity())
    }

    /// Removes rows of `E` this source wrote before but did not list this time.
    pub async fn prune<E: CatalogEntity>(
        &self,
        source: &str,
        tally: &KindTally,
        outcome: &mut RefreshOutcome,
    ) -> Result<(), LoaderError> {
        let report = prune_unseen::<E>(
            &self.catalog,
            self.partner_id(),
            source,
            &tally.seen,
            &self.settings.prune,
            &self.change,
        )
        .await?;
        let counts = outcome.kind_mut(E::KIND);
        counts.deleted += report.deleted;
        counts.failed += report.failed;
        if report.aborted {
            outcome.prune_aborted.push(E::KIND);
        }
        Ok(())
    }
}

/// Organization part of a course key (`MITx+0.111x` or `MITx/0.111x`).
pub fn course_org(course_key: &str) -> Option<&str> {
    course_key
        .split(['+', '/'])
        .next()
        .filter(|org| !org.is_empty() && *org != course_key)
}

/// A saved record and the natural key it was saved under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Written {
    pub status: WriteStatus,
    pub key: String,
}

impl Written {
    pub fn new<E: CatalogEntity>(outcome: &discovery_repository::SaveOutcome<E>) -> Self {
        Self {
            status: WriteStatus::from(outcome),
            key: outcome.entity().natural_key(),
        }
    }
}

/// Counts and seen keys of one kind during one loader.
#[derive(Debug, Default)]
pub struct KindTally {
    pub kind: Option<EntityKind>,
    pub outcome: KindOutcome,
    pub seen: HashSet<String>,
}

impl KindTally {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind: Some(kind),
            ..Default::default()
        }
    }

    pub fn observe(&mut self, key: impl Into<String>) {
        self.seen.insert(key.into());
    }

    /// Counts one write; failures are logged and skipped.
    pub fn apply(&mut self, label: &str, result: Result<Written, LoaderError>) {
        match result {
            Ok(written) => {
                self.outcome.record(written.status);
                self.seen.insert(written.key);
            }
            Err(e) => {
                warn!(kind = ?self.kind, record = label, error = %e, "Skipping record");
                self.outcome.failed += 1;
            }
        }
    }

    /// Records upstream rejected at decode time. Their keys still count as seen.
    pub fn reject(&mut self, rejections: &[Rejection]) {
        for rejection in rejections {
            warn!(
                kind = ?self.kind,
                index = rejection.index,
                key = ?rejection.key,
                error = %rejection.error,
                "Rejected upstream record"
            );
            self.outcome.failed += 1;
            if let Some(key) = &rejection.key {
                self.seen.insert(key.clone());
            }
        }
    }

    /// Adds this tally's counts to the refresh outcome.
    pub fn flush(&self, outcome: &mut RefreshOutcome) {
        if let Some(kind) = self.kind {
            outcome.kind_mut(kind).merge(&self.outcome);
        }
    }
}

/// One step of a partner refresh.
#[async_trait]
pub trait Loader: Send + Sync {
    fn name(&self) -> &'static str;

    /// Loads the source into the catalog.
    ///
    /// `LoaderError::Source` means the listing could not be fetched; nothing
    /// was pruned. Record-level failures never surface here, they are counted
    /// in `outcome`.
    async fn load(&self, ctx: &LoaderContext, outcome: &mut RefreshOutcome) -> Result<(), LoaderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery_repository::InMemoryCatalogStore;
    use std::sync::Arc;

    async fn context(flags: FeatureFlags) -> LoaderContext {
        let catalog = CatalogService::new(Arc::new(InMemoryCatalogStore::new()));
        let partner = catalog.ensure_partner("edx", "edX").await.unwrap();
        LoaderContext::new(catalog, partner, RefreshSettings::new(flags))
    }

    #[test]
    fn test_course_org() {
        assert_eq!(course_org("MITx+0.111x"), Some("MITx"));
        assert_eq!(course_org("HarvardX/CS50"), Some("HarvardX"));
        assert_eq!(course_org("nokey"), None);
    }

    #[tokio::test]
    async fn test_placeholder_course_gets_its_organization() {
        let ctx = context(FeatureFlags::default()).await;
        let course = ctx.ensure_course("MITx+0.111x").await.unwrap();
        let again = ctx.ensure_course("MITx+0.111x").await.unwrap();

        assert_eq!(course.id, again.id);
        let org = ctx.find::<Organization>("MITx").await.unwrap().unwrap();
        assert_eq!(course.authoring_organization_ids, vec![org.id]);
        assert!(org.name.is_none());
    }

    #[tokio::test]
    async fn test_threaded_writes_return_every_result() {
        let flags = FeatureFlags {
            threaded_metadata_write: true,
            ..Default::default()
        };
        let ctx = context(flags).await;
        let writes: Vec<_> = (0..20).map(|i| async move { i * 2 }).collect();

        let mut results = ctx.run_writes(writes).await;
        results.sort();
        assert_eq!(results.len(), 20);
        assert_eq!(results[19], 38);
    }

    #[test]
    fn test_tally_counts_failures_and_rejections() {
        let mut tally = KindTally::new(EntityKind::CourseRun);
        tally.apply(
            "course-v1:MITx+1+1",
            Ok(Written {
                status: WriteStatus::Created,
                key: "course-v1:MITx+1+1".into(),
            }),
        );
        tally.apply("course-v1:MITx+2+1", Err(LoaderError::rejected("bad pacing")));
        tally.reject(&[Rejection {
            index: 3,
            key: Some("course-v1:MITx+3+1".into()),
            error: "invalid type".into(),
        }]);

        assert_eq!(tally.outcome.created, 1);
        assert_eq!(tally.outcome.failed, 2);
        assert!(tally.seen.contains("course-v1:MITx+1+1"));
        assert!(tally.seen.contains("course-v1:MITx+3+1"));
        assert!(!tally.seen.contains("course-v1:MITx+2+1"));
    }
}
