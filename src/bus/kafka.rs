//! Kafka producer built on rskafka.
//!
//! # Responsibilities
//! - Connect to the bootstrap brokers with a deadline
//! - Resolve the partition for the constant log key (hash partitioner)
//! - Deliver messages from a bounded input with acks from all replicas
//! - Retry failed deliveries with backoff, then report them on the error stream

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rskafka::client::partition::{Compression, PartitionClient, UnknownTopicHandling};
use rskafka::client::ClientBuilder;
use rskafka::record::Record as KafkaRecord;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::bus::backoff::RetryPolicy;
use crate::bus::{BusError, BusMessage, BusProducer, DeliveryError, LOG_KEY};
use crate::observability::metrics;

/// Connection and delivery settings for [`KafkaProducer`].
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    pub brokers: Vec<String>,
    pub topic: String,
    pub connect_timeout: Duration,
    /// Capacity of the producer's own input buffer.
    pub input_capacity: usize,
    /// Capacity of the delivery error stream; errors beyond it are dropped.
    pub error_capacity: usize,
    pub retry: RetryPolicy,
}

impl ProducerConfig {
    pub fn new(brokers: Vec<String>, topic: impl Into<String>) -> Self {
        Self {
            brokers,
            topic: topic.into(),
            connect_timeout: Duration::from_secs(5),
            input_capacity: 256,
            error_capacity: 64,
            retry: RetryPolicy::default(),
        }
    }
}

/// Asynchronous Kafka producer.
pub struct KafkaProducer {
    input: Mutex<Option<mpsc::Sender<BusMessage>>>,
    errors: Option<mpsc::Receiver<DeliveryError>>,
    delivery: Mutex<Option<JoinHandle<()>>>,
}

impl KafkaProducer {
    /// Connect to the cluster and start the delivery task.
    pub async fn connect(config: &ProducerConfig) -> Result<Self, BusError> {
        let client = with_deadline(
            config.connect_timeout,
            ClientBuilder::new(config.brokers.clone()).build(),
        )
        .await?
        .map_err(|e| BusError::Connect(e.to_string()))?;

        let topics = with_deadline(config.connect_timeout, client.list_topics())
            .await?
            .map_err(|e| BusError::Connect(e.to_string()))?;

        let partitions: Vec<i32> = topics
            .into_iter()
            .find(|t| t.name == config.topic)
            .map(|t| t.partitions.into_iter().collect())
            .unwrap_or_default();

        let partition = select_partition(LOG_KEY.as_bytes(), &partitions)
            .ok_or_else(|| BusError::UnknownTopic(config.topic.clone()))?;

        let partition_client = with_deadline(
            config.connect_timeout,
            client.partition_client(config.topic.clone(), partition, UnknownTopicHandling::Error),
        )
        .await?
        .map_err(|e| BusError::Connect(e.to_string()))?;

        tracing::info!(
            brokers = ?config.brokers,
            topic = %config.topic,
            partition,
            "Kafka producer connected"
        );

        let (input_tx, input_rx) = mpsc::channel(config.input_capacity.max(1));
        let (errors_tx, errors_rx) = mpsc::channel(config.error_capacity.max(1));

        let delivery = tokio::spawn(deliver(
            partition_client,
            config.topic.clone(),
            input_rx,
            errors_tx,
            config.retry,
        ));

        Ok(Self {
            input: Mutex::new(Some(input_tx)),
            errors: Some(errors_rx),
            delivery: Mutex::new(Some(delivery)),
        })
    }
}

#[async_trait]
impl BusProducer for KafkaProducer {
    async fn send(&self, message: BusMessage) -> Result<(), BusError> {
        let input = self
            .input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(BusError::Closed)?;
        input.send(message).await.map_err(|_| BusError::Closed)
    }

    fn take_errors(&mut self) -> Option<mpsc::Receiver<DeliveryError>> {
        self.errors.take()
    }

    async fn close(&self) -> Result<(), BusError> {
        // Dropping the sender lets the delivery task finish what it already holds.
        drop(self.input.lock().unwrap_or_else(PoisonError::into_inner).take());

        let delivery = self
            .delivery
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = delivery {
            handle.await.map_err(|e| BusError::Close(e.to_string()))?;
            tracing::debug!("Kafka producer closed");
        }
        Ok(())
    }
}

/// Where the delivery task writes a single message.
#[async_trait]
trait PartitionWriter: Send + Sync + 'static {
    async fn write(&self, message: &BusMessage) -> Result<(), String>;
}

#[async_trait]
impl PartitionWriter for PartitionClient {
    async fn write(&self, message: &BusMessage) -> Result<(), String> {
        let record = KafkaRecord {
            key: Some(message.key.clone()),
            value: Some(message.value.clone()),
            headers: BTreeMap::new(),
            timestamp: Utc::now(),
        };
        self.produce(vec![record], Compression::NoCompression)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// Delivery loop: one message at a time, in submission order.
async fn deliver<W: PartitionWriter>(
    writer: W,
    topic: String,
    mut input: mpsc::Receiver<BusMessage>,
    errors: mpsc::Sender<DeliveryError>,
    retry: RetryPolicy,
) {
    while let Some(message) = input.recv().await {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match writer.write(&message).await {
                Ok(()) => break,
                Err(e) if attempt <= retry.max_retries => {
                    let delay = retry.delay(attempt);
                    tracing::debug!(attempt, delay = ?delay, error = %e, "Retrying kafka delivery");
                    tokio::time::sleep(delay).await;
                }
                Err(reason) => {
                    metrics::record_delivery_failure();
                    let failure = DeliveryError {
                        topic: topic.clone(),
                        attempts: attempt,
                        reason,
                    };
                    if errors.try_send(failure).is_err() {
                        tracing::warn!(topic = %topic, "Delivery error stream full, dropping error");
                    }
                    break;
                }
            }
        }
    }
}

async fn with_deadline<F: Future>(deadline: Duration, fut: F) -> Result<F::Output, BusError> {
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| BusError::ConnectTimeout(deadline.as_millis() as u64))
}

/// 32-bit FNV-1a.
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0x811c_9dc5u32, |hash, b| {
        (hash ^ u32::from(*b)).wrapping_mul(0x0100_0193)
    })
}

/// Pick a partition for `key` the way a hash partitioner does.
/// `partitions` must be in ascending order; `None` when it is empty.
pub fn select_partition(key: &[u8], partitions: &[i32]) -> Option<i32> {
    if partitions.is_empty() {
        return None;
    }
    let count = partitions.len() as i32;
    let index = ((fnv1a_32(key) as i32) % count).wrapping_abs();
    partitions.get(index as usize).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Fails every write before `succeed_on` (1-based); `None` never succeeds.
    #[derive(Clone)]
    struct FlakyWriter {
        calls: Arc<AtomicU32>,
        succeed_on: Option<u32>,
    }

    impl FlakyWriter {
        fn new(succeed_on: Option<u32>) -> Self {
            Self {
                calls: Arc::new(AtomicU32::new(0)),
                succeed_on,
            }
        }
    }

    #[async_trait]
    impl PartitionWriter for FlakyWriter {
        async fn write(&self, _message: &BusMessage) -> Result<(), String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            match self.succeed_on {
                Some(n) if call >= n => Ok(()),
                _ => Err("leader not available".to_string()),
            }
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 5,
            base_delay_ms: 1,
            max_delay_ms: 4,
        }
    }

    async fn run_delivery(writer: FlakyWriter, messages: usize) -> Vec<DeliveryError> {
        let (input_tx, input_rx) = mpsc::channel(8);
        let (errors_tx, mut errors_rx) = mpsc::channel(8);
        for i in 0..messages {
            input_tx
                .send(BusMessage::log("logs", format!("m{i}").into_bytes()))
                .await
                .unwrap();
        }
        drop(input_tx);

        deliver(writer, "logs".into(), input_rx, errors_tx, fast_retry()).await;

        let mut failures = Vec::new();
        while let Some(failure) = errors_rx.recv().await {
            failures.push(failure);
        }
        failures
    }

    #[tokio::test]
    async fn test_exhausted_retries_report_one_error() {
        let writer = FlakyWriter::new(None);
        let failures = run_delivery(writer.clone(), 1).await;

        assert_eq!(writer.calls.load(Ordering::SeqCst), 6);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].topic, "logs");
        assert_eq!(failures[0].attempts, 6);
        assert_eq!(failures[0].reason, "leader not available");
    }

    #[tokio::test]
    async fn test_success_stops_retrying() {
        let writer = FlakyWriter::new(Some(3));
        let failures = run_delivery(writer.clone(), 1).await;

        assert_eq!(writer.calls.load(Ordering::SeqCst), 3);
        assert!(failures.is_empty());
    }

    #[tokio::test]
    async fn test_each_message_gets_its_own_retries() {
        let writer = FlakyWriter::new(None);
        let failures = run_delivery(writer.clone(), 2).await;

        assert_eq!(writer.calls.load(Ordering::SeqCst), 12);
        assert_eq!(failures.len(), 2);
    }

    #[test]
    fn test_fnv1a_known_value() {
        assert_eq!(fnv1a_32(b""), 0x811c_9dc5);
        assert_eq!(fnv1a_32(b"log"), 1_062_293_841);
    }

    #[test]
    fn test_select_partition() {
        assert_eq!(select_partition(b"log", &[]), None);
        assert_eq!(select_partition(b"log", &[0]), Some(0));
        assert_eq!(select_partition(b"log", &[0, 1, 2, 3, 4, 5]), Some(3));
        assert_eq!(select_partition(b"log", &[10, 11, 12, 13, 14, 15]), Some(13));
    }

    #[test]
    fn test_default_producer_config() {
        let config = ProducerConfig::new(vec!["localhost:9092".into()], "logs");
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_unreachable_broker_fails_connect() {
        let mut config = ProducerConfig::new(vec!["127.0.0.1:1".into()], "logs");
        config.connect_timeout = Duration::from_millis(300);
        assert!(KafkaProducer::connect(&config).await.is_err());
    }
}
