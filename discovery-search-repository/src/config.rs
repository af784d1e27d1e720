//! Configuration for the SearchIndexService.

pub const DEFAULT_INDEX_ALIAS: &str = "catalog";
pub const DEFAULT_RETENTION_LIMIT: usize = 3;
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchIndexServiceConfig {
    /// Stable alias every reader and realtime writer goes through.
    pub alias: String,
    /// Physical indices kept by the janitor, newest first, live one included.
    pub retention_limit: usize,
    /// Documents per bulk request during a rebuild.
    pub max_batch_size: usize,
}

impl Default for SearchIndexServiceConfig {
    fn default() -> Self {
        Self {
            alias: DEFAULT_INDEX_ALIAS.to_string(),
            retention_limit: DEFAULT_RETENTION_LIMIT,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

impl SearchIndexServiceConfig {
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            ..Self::default()
        }
    }

    pub fn with_retention_limit(mut self, retention_limit: usize) -> Self {
        self.retention_limit = retention_limit;
        self
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }
}
