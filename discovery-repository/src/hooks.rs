//! Post-commit change hooks.
//!
//! The catalog service collects one [`CatalogChange`] per committed mutation
//! into a [`PostCommitQueue`] and hands the batch to the [`ChangeDispatcher`]
//! once every write of the operation has committed. Listeners (search index,
//! event broadcaster) therefore never observe rolled-back writes, and their
//! failures never fail the write that triggered them.

use async_trait::async_trait;
use discovery_shared::{CatalogEntity, EntityKind};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

use crate::interfaces::StoredRecord;
use crate::service::CatalogService;

/// Default bound on changes buffered by one operation.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
    Created,
    Updated,
    Deleted,
}

/// A committed mutation of one row.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogChange {
    pub kind: EntityKind,
    pub op: ChangeOp,
    pub entity_id: i64,
    pub uuid: Uuid,
    pub partner_id: Option<i64>,
    pub draft: bool,
    /// Row after the change; the last stored state for deletes.
    pub snapshot: Value,
}

impl CatalogChange {
    pub fn from_record(record: &StoredRecord, op: ChangeOp) -> Self {
        Self {
            kind: record.kind,
            op,
            entity_id: record.id,
            uuid: record.uuid,
            partner_id: record.partner_id,
            draft: record.draft,
            snapshot: record.snapshot(),
        }
    }

    pub fn decode<E: CatalogEntity>(&self) -> Result<E, serde_json::Error> {
        serde_json::from_value(self.snapshot.clone())
    }
}

/// Receives committed changes.
#[async_trait]
pub trait ChangeListener: Send + Sync {
    fn name(&self) -> &'static str;

    /// Errors are logged by the dispatcher and otherwise ignored.
    async fn on_change(&self, change: &CatalogChange, catalog: &CatalogService) -> anyhow::Result<()>;
}

/// Bounded buffer of changes awaiting dispatch.
#[derive(Debug)]
pub struct PostCommitQueue {
    capacity: usize,
    changes: Vec<CatalogChange>,
    dropped: usize,
}

impl Default for PostCommitQueue {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }
}

impl PostCommitQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            changes: Vec::new(),
            dropped: 0,
        }
    }

    /// Buffers `change`; past capacity the change is dropped and counted.
    pub fn push(&mut self, change: CatalogChange) {
        if self.changes.len() >= self.capacity {
            self.dropped += 1;
            warn!(
                kind = %change.kind,
                entity_id = change.entity_id,
                capacity = self.capacity,
                "Post-commit queue full, dropping change"
            );
            return;
        }
        self.changes.push(change);
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn drain(&mut self) -> Vec<CatalogChange> {
        std::mem::take(&mut self.changes)
    }
}

/// Fans committed changes out to every registered listener.
#[derive(Clone, Default)]
pub struct ChangeDispatcher {
    listeners: Vec<Arc<dyn ChangeListener>>,
}

impl ChangeDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: Arc<dyn ChangeListener>) {
        self.listeners.push(listener);
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Delivers each change to each listener in registration order.
    pub async fn dispatch(&self, changes: Vec<CatalogChange>, catalog: &CatalogService) {
        for change in &changes {
            for listener in &self.listeners {
                if let Err(e) = listener.on_change(change, catalog).await {
                    error!(
                        listener = listener.name(),
                        kind = %change.kind,
                        entity_id = change.entity_id,
                        error = %e,
                        "Change listener failed"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(id: i64) -> CatalogChange {
        CatalogChange {
            kind: EntityKind::Course,
            op: ChangeOp::Created,
            entity_id: id,
            uuid: Uuid::nil(),
            partner_id: Some(1),
            draft: false,
            snapshot: Value::Null,
        }
    }

    #[test]
    fn test_queue_drops_past_capacity() {
        let mut queue = PostCommitQueue::with_capacity(2);
        queue.push(change(1));
        queue.push(change(2));
        queue.push(change(3));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 1);
        let drained = queue.drain();
        assert_eq!(drained[1].entity_id, 2);
        assert!(queue.is_empty());
    }
}
