use rdkafka::error::KafkaError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Kafka error: {0}")]
    Kafka(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Projection error: {0}")]
    Projection(String),
}

impl EventError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn projection(msg: impl Into<String>) -> Self {
        Self::Projection(msg.into())
    }
}

impl From<KafkaError> for EventError {
    fn from(e: KafkaError) -> Self {
        Self::Kafka(e.to_string())
    }
}

impl From<prost::EncodeError> for EventError {
    fn from(e: prost::EncodeError) -> Self {
        Self::Encode(e.to_string())
    }
}
