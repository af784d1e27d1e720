//! Search indexing: document projection, full rebuilds and realtime updates.

pub mod projection;
pub mod realtime;
pub mod rebuild;

pub use projection::Projector;
pub use realtime::RealtimeIndexer;
pub use rebuild::{collect_documents, rebuild_index};
