//! Removal of rows a source no longer lists.
//!
//! At the end of a loader every official row of the loader's kind that was
//! last written by the loader's source and was not seen in this run is
//! deleted (or retired). The delete-ratio guard aborts the whole phase when
//! too large a share of the existing rows would go, which is what an
//! upstream answering with an empty listing looks like.

use std::collections::HashSet;
use std::str::FromStr;

use discovery_repository::CatalogService;
use discovery_shared::{CatalogEntity, ChangeContext};
use tracing::{error, info, warn};

use crate::errors::LoaderError;

pub const DEFAULT_MAX_DELETE_RATIO: f64 = 0.5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PruneMode {
    /// Delete through the catalog, cascading to dependents.
    Hard,
    /// Mark retired; the row is hidden and revived by the next upsert.
    #[default]
    Soft,
}

impl FromStr for PruneMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hard" => Ok(PruneMode::Hard),
            "soft" => Ok(PruneMode::Soft),
            other => Err(format!("unknown prune mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrunePolicy {
    pub mode: PruneMode,
    /// Largest share of existing rows one prune may remove.
    pub max_delete_ratio: f64,
}

impl Default for PrunePolicy {
    fn default() -> Self {
        Self {
            mode: PruneMode::default(),
            max_delete_ratio: DEFAULT_MAX_DELETE_RATIO,
        }
    }
}

impl PrunePolicy {
    pub fn new(mode: PruneMode, max_delete_ratio: f64) -> Self {
        Self {
            mode,
            max_delete_ratio: max_delete_ratio.clamp(0.0, 1.0),
        }
    }

    pub fn exceeds_ratio(&self, existing: usize, doomed: usize) -> bool {
        existing > 0 && doomed as f64 / existing as f64 > self.max_delete_ratio
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub deleted: u64,
    pub failed: u64,
    pub aborted: bool,
}

/// Removes rows of `E` last written by `source` whose natural key is not in `seen`.
pub async fn prune_unseen<E: CatalogEntity>(
    catalog: &CatalogService,
    partner_id: i64,
    source: &str,
    seen: &HashSet<String>,
    policy: &PrunePolicy,
    ctx: &ChangeContext,
) -> Result<PruneReport, LoaderError> {
    let existing = catalog
        .repo::<E>()
        .list_from_source(partner_id, source)
        .await?;
    let doomed: Vec<&E> = existing
        .iter()
        .filter(|e| !e.draft() && !seen.contains(&e.natural_key()))
        .collect();

    let mut report = PruneReport::default();
    if doomed.is_empty() {
        return Ok(report);
    }

    if policy.exceeds_ratio(existing.len(), doomed.len()) {
        error!(
            kind = %E::KIND,
            source,
            existing = existing.len(),
            unseen = doomed.len(),
            max_ratio = policy.max_delete_ratio,
            "Prune aborted: delete ratio above threshold"
        );
        report.aborted = true;
        return Ok(report);
    }

    for entity in doomed {
        let result = match policy.mode {
            PruneMode::Hard => catalog.delete_by_kind(E::KIND, entity.id(), ctx).await,
            PruneMode::Soft => catalog.retire_by_kind(E::KIND, entity.id(), ctx).await,
        };
        match result {
            Ok(true) => report.deleted += 1,
            Ok(false) => {}
            Err(e) => {
                warn!(kind = %E::KIND, key = %entity.natural_key(), error = %e, "Failed to prune row");
                report.failed += 1;
            }
        }
    }

    info!(kind = %E::KIND, source, deleted = report.deleted, mode = ?policy.mode, "Pruned unseen rows");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery_repository::InMemoryCatalogStore;
    use discovery_shared::Organization;
    use std::sync::Arc;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("hard".parse::<PruneMode>(), Ok(PruneMode::Hard));
        assert_eq!(" Soft ".parse::<PruneMode>(), Ok(PruneMode::Soft));
        assert!("purge".parse::<PruneMode>().is_err());
    }

    #[test]
    fn test_ratio_guard() {
        let policy = PrunePolicy::new(PruneMode::Hard, 0.5);
        assert!(!policy.exceeds_ratio(4, 2));
        assert!(policy.exceeds_ratio(4, 3));
        assert!(policy.exceeds_ratio(1, 1));
        assert!(!policy.exceeds_ratio(0, 0));
    }

    async fn seed(catalog: &CatalogService, partner_id: i64, keys: &[&str]) {
        let ctx = ChangeContext::refresh();
        for key in keys {
            let org = Organization {
                partner_id,
                key: key.to_string(),
                ..Default::default()
            };
            catalog
                .save_organization(&org, Some("organizations_api"), &ctx)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_soft_prune_retires_unseen_rows() {
        let catalog = CatalogService::new(Arc::new(InMemoryCatalogStore::new()));
        let partner = catalog.ensure_partner("edx", "edX").await.unwrap();
        seed(&catalog, partner.id, &["MITx", "HarvardX", "BerkeleyX"]).await;

        let seen: HashSet<String> = ["MITx", "HarvardX"].iter().map(|s| s.to_string()).collect();
        let report = prune_unseen::<Organization>(
            &catalog,
            partner.id,
            "organizations_api",
            &seen,
            &PrunePolicy::default(),
            &ChangeContext::refresh(),
        )
        .await
        .unwrap();

        assert_eq!(report.deleted, 1);
        let listed = catalog.repo::<Organization>().list_by_partner(partner.id).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|o| o.key != "BerkeleyX"));
    }

    #[tokio::test]
    async fn test_empty_listing_does_not_wipe_partner() {
        let catalog = CatalogService::new(Arc::new(InMemoryCatalogStore::new()));
        let partner = catalog.ensure_partner("edx", "edX").await.unwrap();
        seed(&catalog, partner.id, &["MITx", "HarvardX"]).await;

        let report = prune_unseen::<Organization>(
            &catalog,
            partner.id,
            "organizations_api",
            &HashSet::new(),
            &PrunePolicy::new(PruneMode::Hard, 0.5),
            &ChangeContext::refresh(),
        )
        .await
        .unwrap();

        assert!(report.aborted);
        assert_eq!(report.deleted, 0);
        let listed = catalog.repo::<Organization>().list_by_partner(partner.id).await.unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn test_rows_from_other_sources_are_kept() {
        let catalog = CatalogService::new(Arc::new(InMemoryCatalogStore::new()));
        let partner = catalog.ensure_partner("edx", "edX").await.unwrap();
        seed(&catalog, partner.id, &["MITx", "HarvardX"]).await;
        let manual = Organization {
            partner_id: partner.id,
            key: "Manual".into(),
            ..Default::default()
        };
        catalog
            .save_organization(&manual, None, &ChangeContext::refresh())
            .await
            .unwrap();

        let seen: HashSet<String> = ["MITx"].iter().map(|s| s.to_string()).collect();
        let report = prune_unseen::<Organization>(
            &catalog,
            partner.id,
            "organizations_api",
            &seen,
            &PrunePolicy::new(PruneMode::Hard, 0.5),
            &ChangeContext::refresh(),
        )
        .await
        .unwrap();

        assert_eq!(report.deleted, 1);
        let keys: Vec<String> = catalog
            .repo::<Organization>()
            .list_by_partner(partner.id)
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.key)
            .collect();
        assert!(keys.contains(&"Manual".to_string()));
        assert!(keys.contains(&"MITx".to_string()));
    }
}
