//! Sink publishing records to the message bus.
//!
//! `handle` only attempts a non-blocking enqueue; a publish worker serializes
//! queued records and hands them to the producer, and an error-drain worker
//! reports asynchronous delivery failures as local diagnostics.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bus::{BusError, BusMessage, BusProducer, DeliveryError, KafkaProducer, ProducerConfig};
use crate::logger::record::{Attr, Level, Record};
use crate::logger::sink::{Scope, Sink, SinkError};
use crate::observability::metrics;

const SINK_NAME: &str = "bus";

struct BusShared {
    queue: mpsc::Sender<Arc<Record>>,
    stop: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
    producer: Arc<dyn BusProducer>,
    closed: AtomicBool,
}

/// Asynchronous message bus sink.
#[derive(Clone)]
pub struct BusSink {
    shared: Arc<BusShared>,
    scope: Scope,
}

impl BusSink {
    /// Connect a Kafka producer and start the sink's workers.
    pub async fn connect(config: &ProducerConfig, buffer_size: usize) -> Result<Self, BusError> {
        let producer = KafkaProducer::connect(config).await?;
        Ok(Self::new(Box::new(producer), config.topic.clone(), buffer_size))
    }

    /// Start the sink over an already constructed producer.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(mut producer: Box<dyn BusProducer>, topic: String, buffer_size: usize) -> Self {
        let errors = producer.take_errors();
        let producer: Arc<dyn BusProducer> = Arc::from(producer);
        let (queue, records) = mpsc::channel(buffer_size.max(1));
        let stop = CancellationToken::new();

        let mut workers = vec![tokio::spawn(publish(
            records,
            Arc::clone(&producer),
            topic,
            stop.clone(),
        ))];
        if let Some(errors) = errors {
            workers.push(tokio::spawn(drain_errors(errors, stop.clone())));
        }

        Self {
            shared: Arc::new(BusShared {
                queue,
                stop,
                workers: Mutex::new(workers),
                producer,
                closed: AtomicBool::new(false),
            }),
            scope: Scope::default(),
        }
    }

    fn scoped(&self, scope: Scope) -> Arc<dyn Sink> {
        Arc::new(Self {
            shared: Arc::clone(&self.shared),
            scope,
        })
    }
}

#[async_trait]
impl Sink for BusSink {
    fn enabled(&self, _level: Level) -> bool {
        true
    }

    fn handle(&self, record: &Arc<Record>) -> Result<(), SinkError> {
        match self.shared.queue.try_send(self.scope.apply(record)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                metrics::record_dropped(SINK_NAME);
                tracing::warn!(sink = SINK_NAME, "log channel is full, dropping log message");
            }
            Err(TrySendError::Closed(_)) => {
                metrics::record_dropped(SINK_NAME);
                tracing::warn!(sink = SINK_NAME, "sink closed, dropping log message");
            }
        }
        Ok(())
    }

    fn with_attrs(&self, attrs: Vec<Attr>) -> Arc<dyn Sink> {
        self.scoped(self.scope.with_attrs(attrs))
    }

    fn with_group(&self, name: &str) -> Arc<dyn Sink> {
        self.scoped(self.scope.with_group(name))
    }

    async fn close(&self) -> Result<(), SinkError> {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.shared.stop.cancel();

        let workers = {
            let mut guard = self.shared.workers.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        let mut join_error = None;
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::warn!(sink = SINK_NAME, error = %e, "Bus sink worker failed");
                join_error.get_or_insert(SinkError::Worker(e.to_string()));
            }
        }

        self.shared.producer.close().await?;
        join_error.map_or(Ok(()), Err)
    }
}

async fn publish(
    mut records: mpsc::Receiver<Arc<Record>>,
    producer: Arc<dyn BusProducer>,
    topic: String,
    stop: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            received = records.recv() => {
                let Some(record) = received else { break };
                let payload = match record.bus_payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to marshal log entry");
                        continue;
                    }
                };
                if let Err(e) = producer.send(BusMessage::log(topic.as_str(), payload)).await {
                    tracing::warn!(error = %e, "failed to hand log entry to producer");
                }
            }
        }
    }
}

async fn drain_errors(mut errors: mpsc::Receiver<DeliveryError>, stop: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            received = errors.recv() => match received {
                Some(failure) => tracing::warn!(error = %failure, "failed to write message to kafka"),
                None => break,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingProducer {
        sent: Arc<Mutex<Vec<BusMessage>>>,
        closed: Arc<AtomicBool>,
        errors: Option<mpsc::Receiver<DeliveryError>>,
        fail_close: bool,
    }

    #[async_trait]
    impl BusProducer for RecordingProducer {
        async fn send(&self, message: BusMessage) -> Result<(), BusError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        fn take_errors(&mut self) -> Option<mpsc::Receiver<DeliveryError>> {
            self.errors.take()
        }

        async fn close(&self) -> Result<(), BusError> {
            self.closed.store(true, Ordering::SeqCst);
            if self.fail_close {
                return Err(BusError::Close("flush interrupted".into()));
            }
            Ok(())
        }
    }

    async fn wait_for(cond: impl Fn() -> bool) {
        for _ in 0..400 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn info(message: &str) -> Arc<Record> {
        Arc::new(Record::new(Level::Info, message, Vec::new()))
    }

    #[tokio::test]
    async fn test_publishes_json_with_log_key() {
        let producer = RecordingProducer::default();
        let sent = producer.sent.clone();
        let sink = BusSink::new(Box::new(producer), "app-logs".into(), 10);

        let time = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        sink.handle(&Arc::new(Record::at(time, Level::Info, "x", Vec::new())))
            .unwrap();

        wait_for(|| sent.lock().unwrap().len() == 1).await;
        let messages = sent.lock().unwrap().clone();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].topic, "app-logs");
        assert_eq!(messages[0].key, b"log".to_vec());
        assert_eq!(
            String::from_utf8(messages[0].value.clone()).unwrap(),
            r#"{"time":"2024-05-01T12:00:00Z","level":"INFO","msg":"x"}"#
        );

        sink.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_full_queue_drops_newest_record() {
        let producer = RecordingProducer::default();
        let sent = producer.sent.clone();
        let sink = BusSink::new(Box::new(producer), "logs".into(), 2);

        // Single-threaded runtime: the worker cannot drain between these calls.
        for message in ["first", "second", "third"] {
            assert!(sink.handle(&info(message)).is_ok());
        }

        wait_for(|| sent.lock().unwrap().len() >= 2).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let bodies: Vec<String> = sent
            .lock()
            .unwrap()
            .iter()
            .map(|m| String::from_utf8(m.value.clone()).unwrap())
            .collect();
        assert_eq!(bodies.len(), 2);
        assert!(bodies[0].contains(r#""msg":"first""#));
        assert!(bodies[1].contains(r#""msg":"second""#));

        sink.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_preserves_submission_order() {
        let producer = RecordingProducer::default();
        let sent = producer.sent.clone();
        let sink = BusSink::new(Box::new(producer), "logs".into(), 64);

        for i in 0..50 {
            sink.handle(&info(&format!("m{i}"))).unwrap();
        }
        wait_for(|| sent.lock().unwrap().len() == 50).await;

        let sent = sent.lock().unwrap();
        for (i, message) in sent.iter().enumerate() {
            let body = String::from_utf8(message.value.clone()).unwrap();
            assert!(body.contains(&format!(r#""msg":"m{i}""#)));
        }
        drop(sent);
        sink.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_stops_workers_and_producer() {
        let (errors_tx, errors_rx) = mpsc::channel(4);
        let producer = RecordingProducer {
            errors: Some(errors_rx),
            ..Default::default()
        };
        let closed = producer.closed.clone();
        let sink = BusSink::new(Box::new(producer), "logs".into(), 4);

        errors_tx
            .send(DeliveryError {
                topic: "logs".into(),
                attempts: 6,
                reason: "broker down".into(),
            })
            .await
            .unwrap();

        sink.close().await.unwrap();
        assert!(closed.load(Ordering::SeqCst));
        assert!(errors_tx.is_closed(), "error drain worker should have exited");

        // Closed sinks swallow records and closing again is a no-op.
        assert!(sink.handle(&info("late")).is_ok());
        assert!(sink.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_scoped_handle_shares_queue() {
        let producer = RecordingProducer::default();
        let sent = producer.sent.clone();
        let sink = BusSink::new(Box::new(producer), "logs".into(), 8);

        let scoped = sink.with_attrs(vec![Attr::string("service", "watchlist")]);
        scoped.handle(&info("scoped")).unwrap();
        wait_for(|| sent.lock().unwrap().len() == 1).await;

        let body: serde_json::Value =
            serde_json::from_slice(&sent.lock().unwrap()[0].value).unwrap();
        assert_eq!(body["attrs"]["service"], "watchlist");

        scoped.close().await.unwrap();
        assert!(sink.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_producer_close_failure_is_returned() {
        let producer = RecordingProducer {
            fail_close: true,
            ..Default::default()
        };
        let closed = producer.closed.clone();
        let sink = BusSink::new(Box::new(producer), "logs".into(), 2);

        for message in ["a", "b", "c"] {
            assert!(sink.handle(&info(message)).is_ok());
        }

        let err = sink.close().await.unwrap_err();
        assert!(matches!(err, SinkError::Bus(BusError::Close(ref reason)) if reason == "flush interrupted"));
        assert!(closed.load(Ordering::SeqCst));

        // The failure is reported once; a second close is a no-op.
        assert!(sink.close().await.is_ok());
    }
}
