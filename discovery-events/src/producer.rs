//! Kafka producer configuration.
//!
//! ```ignore
//! use discovery_events::producer::{create_producer_with_config, ProducerConfig};
//!
//! let config = ProducerConfig::from_env("localhost:9092", "discovery");
//! let producer = create_producer_with_config(&config)?;
//! ```

use std::env;

use rdkafka::config::ClientConfig;
use rdkafka::producer::BaseProducer;

use crate::errors::EventError;

pub const DEFAULT_CLIENT_ID: &str = "discovery";

#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Kafka broker address (e.g., "localhost:9092")
    pub broker: String,
    pub client_id: String,
    /// SASL username (enables SASL/SSL if set)
    pub username: Option<String>,
    pub password: Option<String>,
    /// Custom CA certificate in PEM format
    pub ssl_ca_pem: Option<String>,
}

impl ProducerConfig {
    pub fn new(broker: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            broker: broker.into(),
            client_id: client_id.into(),
            username: None,
            password: None,
            ssl_ca_pem: None,
        }
    }

    /// Reads `KAFKA_BROKER`, `KAFKA_USERNAME`, `KAFKA_PASSWORD` and `KAFKA_SSL_CA_PEM`.
    pub fn from_env(default_broker: &str, client_id: impl Into<String>) -> Self {
        Self {
            broker: env::var("KAFKA_BROKER").unwrap_or_else(|_| default_broker.to_string()),
            client_id: client_id.into(),
            username: env::var("KAFKA_USERNAME").ok(),
            password: env::var("KAFKA_PASSWORD").ok(),
            ssl_ca_pem: env::var("KAFKA_SSL_CA_PEM").ok(),
        }
    }

    pub fn with_credentials(mut self, username: String, password: String) -> Self {
        self.username = Some(username);
        self.password = Some(password);
        self
    }

    pub fn with_ssl_ca(mut self, ca_pem: String) -> Self {
        self.ssl_ca_pem = Some(ca_pem);
        self
    }

    fn client_config(&self) -> Result<ClientConfig, EventError> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &self.broker)
            .set("client.id", &self.client_id)
            .set("compression.type", "zstd")
            .set("message.timeout.ms", "5000")
            .set("queue.buffering.max.messages", "100000")
            .set("queue.buffering.max.kbytes", "1048576");

        match (&self.username, &self.password) {
            (Some(username), Some(password)) => {
                client_config
                    .set("security.protocol", "SASL_SSL")
                    .set("sasl.mechanisms", "PLAIN")
                    .set("sasl.username", username)
                    .set("sasl.password", password);
                if let Some(ca_pem) = &self.ssl_ca_pem {
                    client_config.set("ssl.ca.pem", ca_pem);
                }
            }
            (Some(_), None) => {
                return Err(EventError::configuration(
                    "KAFKA_PASSWORD is required when KAFKA_USERNAME is set",
                ))
            }
            _ => {}
        }
        Ok(client_config)
    }
}

/// Create a producer with zstd compression, and SASL/SSL when credentials are set.
pub fn create_producer_with_config(config: &ProducerConfig) -> Result<BaseProducer, EventError> {
    Ok(config.client_config()?.create()?)
}
