//! Message bus producer subsystem.
//!
//! # Data Flow
//! ```text
//! BusSink publish worker
//!     → BusProducer::send (bounded producer input)
//!     → kafka.rs delivery task (acks=all, bounded retries, backoff.rs)
//!     → on final failure: delivery error stream
//!     → BusSink error-drain worker (diagnostics only)
//! ```
//!
//! # Design Decisions
//! - The producer is a trait so tests inject a recording fake
//! - Delivery errors surface asynchronously, never to the logging caller
//! - Construction fails fast when the brokers cannot be reached

pub mod backoff;
pub mod kafka;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

pub use kafka::{KafkaProducer, ProducerConfig};

/// Partition key used for every log message.
pub const LOG_KEY: &str = "log";

/// Errors raised by a bus producer.
#[derive(Debug, Error)]
pub enum BusError {
    /// Could not reach the brokers or fetch metadata.
    #[error("failed to connect to brokers: {0}")]
    Connect(String),

    /// Connecting took longer than the configured timeout.
    #[error("timed out connecting to brokers after {0} ms")]
    ConnectTimeout(u64),

    /// The topic does not exist on the cluster.
    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    /// The producer no longer accepts messages.
    #[error("producer is closed")]
    Closed,

    /// Releasing the producer failed.
    #[error("failed to close producer: {0}")]
    Close(String),
}

/// A message handed to the producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl BusMessage {
    /// A message keyed with [`LOG_KEY`].
    pub fn log(topic: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            key: LOG_KEY.as_bytes().to_vec(),
            value,
        }
    }
}

/// A message the producer gave up on after exhausting its retries.
#[derive(Debug, Clone, Error)]
#[error("failed to deliver message to {topic} after {attempts} attempts: {reason}")]
pub struct DeliveryError {
    pub topic: String,
    pub attempts: u32,
    pub reason: String,
}

/// Asynchronous producer for the message bus.
#[async_trait]
pub trait BusProducer: Send + Sync + 'static {
    /// Submit a message. May wait while the producer's own input is full.
    async fn send(&self, message: BusMessage) -> Result<(), BusError>;

    /// The stream of delivery failures. Yields `Some` at most once.
    fn take_errors(&mut self) -> Option<mpsc::Receiver<DeliveryError>>;

    /// Stop accepting messages and release the connection.
    async fn close(&self) -> Result<(), BusError>;
}
