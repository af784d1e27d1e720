//! Counters reported by a refresh.

use std::collections::BTreeMap;
use std::fmt;

use discovery_repository::SaveOutcome;
use discovery_shared::EntityKind;
use serde::Serialize;

/// How a single record write ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Created,
    Updated,
    Unchanged,
}

impl<E> From<&SaveOutcome<E>> for WriteStatus {
    fn from(outcome: &SaveOutcome<E>) -> Self {
        match outcome {
            SaveOutcome::Created(_) => WriteStatus::Created,
            SaveOutcome::Updated { .. } => WriteStatus::Updated,
            SaveOutcome::Unchanged(_) => WriteStatus::Unchanged,
        }
    }
}

/// Counts for one entity kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindOutcome {
    pub created: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub deleted: u64,
    pub failed: u64,
}

impl KindOutcome {
    pub fn record(&mut self, status: WriteStatus) {
        match status {
            WriteStatus::Created => self.created += 1,
            WriteStatus::Updated => self.updated += 1,
            WriteStatus::Unchanged => self.unchanged += 1,
        }
    }

    pub fn merge(&mut self, other: &KindOutcome) {
        self.created += other.created;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.deleted += other.deleted;
        self.failed += other.failed;
    }

    pub fn total(&self) -> u64 {
        self.created + self.updated + self.unchanged + self.failed
    }
}

impl fmt::Display for KindOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created={} updated={} unchanged={} deleted={} failed={}",
            self.created, self.updated, self.unchanged, self.deleted, self.failed
        )
    }
}

/// A loader that could not reach its source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub loader: &'static str,
    pub error: String,
}

/// Aggregate result of `refresh(partner)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshOutcome {
    pub partner: String,
    pub kinds: BTreeMap<EntityKind, KindOutcome>,
    /// Loaders aborted by a source-wide failure; their prune phase was skipped.
    pub source_failures: Vec<SourceFailure>,
    /// Kinds whose prune was aborted by the delete-ratio guard.
    pub prune_aborted: Vec<EntityKind>,
}

impl RefreshOutcome {
    pub fn new(partner: impl Into<String>) -> Self {
        Self {
            partner: partner.into(),
            ..Default::default()
        }
    }

    pub fn kind(&self, kind: EntityKind) -> KindOutcome {
        self.kinds.get(&kind).copied().unwrap_or_default()
    }

    pub fn kind_mut(&mut self, kind: EntityKind) -> &mut KindOutcome {
        self.kinds.entry(kind).or_default()
    }

    /// Sum over every kind.
    pub fn totals(&self) -> KindOutcome {
        let mut totals = KindOutcome::default();
        for outcome in self.kinds.values() {
            totals.merge(outcome);
        }
        totals
    }

    /// No source failed, no record failed and no prune was held back.
    pub fn is_clean(&self) -> bool {
        self.source_failures.is_empty() && self.prune_aborted.is_empty() && self.totals().failed == 0
    }
}
