//! Store interface and the record types that cross it.

mod catalog_store;
mod records;

pub use catalog_store::CatalogStore;
pub use records::{plan_save, RecordFilter, RecordWrite, SavePlan, StoreOutcome, StoredRecord};
