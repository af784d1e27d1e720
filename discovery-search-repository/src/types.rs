//! Result types for search index operations.

use crate::errors::SearchIndexError;

/// Outcome of a single document within a batch.
#[derive(Debug, Clone)]
pub struct BatchOperationResult {
    pub document_id: String,
    pub success: bool,
    pub error: Option<SearchIndexError>,
}

/// Aggregate outcome of a bulk operation. Partial failures are reported here
/// rather than as an error so callers can log and carry on.
#[derive(Debug, Clone, Default)]
pub struct BatchOperationSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BatchOperationResult>,
}

impl BatchOperationSummary {
    pub fn record(&mut self, document_id: String, outcome: Result<(), SearchIndexError>) {
        self.total += 1;
        match outcome {
            Ok(()) => {
                self.succeeded += 1;
                self.results.push(BatchOperationResult {
                    document_id,
                    success: true,
                    error: None,
                });
            }
            Err(e) => {
                self.failed += 1;
                self.results.push(BatchOperationResult {
                    document_id,
                    success: false,
                    error: Some(e),
                });
            }
        }
    }

    pub fn merge(&mut self, other: BatchOperationSummary) {
        self.total += other.total;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.results.extend(other.results);
    }
}

/// What a full rebuild did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildOutcome {
    /// The new physical index, now bound to the alias.
    pub index: String,
    /// The index the alias pointed to before the swap.
    pub previous: Option<String>,
    pub indexed: usize,
    pub failed: usize,
}
