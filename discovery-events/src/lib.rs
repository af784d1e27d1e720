//! # Discovery Events
//!
//! Broadcasts committed catalog changes to Kafka. Courses, course runs,
//! organizations and programs each have a `discovery_{entity}_change` and a
//! `discovery_{entity}_delete` topic; payloads are protobuf messages keyed by
//! the entity uuid. Delivery is fire-and-forget: a failed publish is logged
//! and never undoes the write that caused it.

pub mod broadcaster;
pub mod errors;
pub mod pb;
pub mod producer;
pub mod projection;
pub mod publisher;
pub mod topics;

pub use broadcaster::ChangeBroadcaster;
pub use errors::EventError;
pub use producer::{create_producer_with_config, ProducerConfig};
pub use publisher::{EventPublisher, KafkaPublisher, OutgoingEvent, RecordingPublisher};
pub use topics::{all_topics, topic_name, EventAction, EventEntity};
