//! Event publishers.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{BaseProducer, BaseRecord, Producer};
use tracing::debug;

use crate::errors::EventError;

/// One message handed to a publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEvent {
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
    pub event_type: String,
}

/// Fire-and-forget delivery to the message bus.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: &OutgoingEvent) -> Result<(), EventError>;
}

/// Publishes through a long-lived Kafka producer.
pub struct KafkaPublisher {
    producer: BaseProducer,
}

impl KafkaPublisher {
    pub fn new(producer: BaseProducer) -> Self {
        Self { producer }
    }

    /// Waits for queued messages to be delivered.
    pub fn flush(&self, timeout: Duration) -> Result<(), EventError> {
        self.producer.flush(timeout)?;
        Ok(())
    }
}

impl EventPublisher for KafkaPublisher {
    fn publish(&self, event: &OutgoingEvent) -> Result<(), EventError> {
        let record = BaseRecord::to(&event.topic)
            .key(&event.key)
            .payload(&event.payload)
            .headers(OwnedHeaders::new().insert(Header {
                key: "event-type",
                value: Some(event.event_type.as_str()),
            }));

        self.producer
            .send(record)
            .map_err(|(e, _)| EventError::from(e))?;
        // Serve delivery callbacks without blocking.
        self.producer.poll(Duration::ZERO);
        debug!(topic = %event.topic, key = %event.key, "Event queued");
        Ok(())
    }
}

/// Keeps published events in memory.
#[derive(Default)]
pub struct RecordingPublisher {
    events: RwLock<Vec<OutgoingEvent>>,
    failing: RwLock<bool>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later publish fail, as an unreachable broker would.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.write().unwrap_or_else(PoisonError::into_inner) = failing;
    }

    pub fn events(&self) -> Vec<OutgoingEvent> {
        self.events.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn on_topic(&self, topic: &str) -> Vec<OutgoingEvent> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.topic == topic)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.events.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: &OutgoingEvent) -> Result<(), EventError> {
        if *self.failing.read().unwrap_or_else(PoisonError::into_inner) {
            return Err(EventError::Kafka("broker unavailable".to_string()));
        }
        self.events.write().unwrap_or_else(PoisonError::into_inner).push(event.clone());
        Ok(())
    }
}
