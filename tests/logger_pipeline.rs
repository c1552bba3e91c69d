//! End-to-end tests of the logger over a fake bus and a real file.

mod common;

use std::time::Duration;

use common::{read_lines, wait_for_line, wait_until, RecordingProducer};
use watchlist::logger::{
    new_logger, new_logger_with_producer, Attr, Context, ContextError, LoggerError, LoggerOptions,
};

fn options(log_dir: &std::path::Path) -> LoggerOptions {
    let mut opts = LoggerOptions::new(vec!["localhost:9092".into()], "app-logs", "watchlist", 16);
    opts.log_dir = log_dir.to_path_buf();
    opts
}

#[tokio::test]
async fn test_record_reaches_file_and_bus() {
    let dir = tempfile::tempdir().unwrap();
    let producer = RecordingProducer::default();
    let logger = new_logger_with_producer(&options(dir.path()), Box::new(producer.clone()))
        .await
        .unwrap();

    logger.info("media added", &[Attr::int("media_id", 10)]);

    let log_file = dir.path().join("watchlist").join("app.log");
    assert!(wait_for_line(&log_file, |_| true).await);
    assert!(wait_until(|| producer.messages().len() == 1).await);

    let line = &read_lines(&log_file).await[0];
    assert!(line.starts_with("[INFO] - "));
    assert!(line.ends_with("Z - media added media_id=10"));

    let message = &producer.messages()[0];
    assert_eq!(message.topic, "app-logs");
    assert_eq!(message.key, b"log".to_vec());
    let payload = &producer.payloads()[0];
    assert_eq!(payload["level"], "INFO");
    assert_eq!(payload["msg"], "media added");
    assert_eq!(payload["attrs"]["media_id"], 10);

    logger.shutdown().await.unwrap();
    assert!(producer.is_closed());
}

#[tokio::test]
async fn test_scoped_logger_qualifies_keys_everywhere() {
    let dir = tempfile::tempdir().unwrap();
    let producer = RecordingProducer::default();
    let logger = new_logger_with_producer(&options(dir.path()), Box::new(producer.clone()))
        .await
        .unwrap();

    logger
        .with_group("rpc")
        .with_attrs(vec![Attr::string("method", "add")])
        .warn("slow call", &[]);

    let log_file = dir.path().join("watchlist").join("app.log");
    assert!(wait_for_line(&log_file, |_| true).await);
    assert!(wait_until(|| !producer.messages().is_empty()).await);

    assert!(read_lines(&log_file).await[0].ends_with(" - slow call rpc.method=add"));
    assert_eq!(producer.payloads()[0]["attrs"]["rpc.method"], "add");

    logger.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_canceled_context_logs_cause() {
    let dir = tempfile::tempdir().unwrap();
    let producer = RecordingProducer::default();
    let logger = new_logger_with_producer(&options(dir.path()), Box::new(producer.clone()))
        .await
        .unwrap();

    let ctx = Context::new();
    ctx.cancel();
    assert_eq!(logger.info_ctx(&ctx, "never written", &[]), Err(ContextError::Canceled));

    assert!(wait_until(|| !producer.messages().is_empty()).await);
    let payload = &producer.payloads()[0];
    assert_eq!(payload["level"], "ERROR");
    assert_eq!(payload["msg"], "operation canceled");
    assert_eq!(payload["attrs"]["error"], "context canceled");

    logger.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_is_idempotent_and_later_records_are_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let producer = RecordingProducer::default();
    let logger = new_logger_with_producer(&options(dir.path()), Box::new(producer.clone()))
        .await
        .unwrap();

    logger.shutdown().await.unwrap();
    logger.shutdown().await.unwrap();

    logger.error("after shutdown", &[]);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(producer.messages().is_empty());
    let log_file = dir.path().join("watchlist").join("app.log");
    assert!(read_lines(&log_file).await.is_empty());
}

#[tokio::test]
async fn test_file_sink_failure_closes_bus_sink() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("logs");
    std::fs::write(&blocker, b"").unwrap();

    let producer = RecordingProducer::default();
    let result = new_logger_with_producer(&options(&blocker), Box::new(producer.clone())).await;

    assert!(matches!(result, Err(LoggerError::File { .. })));
    assert!(producer.is_closed());
}

#[tokio::test]
async fn test_unreachable_broker_fails_before_touching_disk() {
    let dir = tempfile::tempdir().unwrap();
    let log_dir = dir.path().join("logs");

    let mut opts = LoggerOptions::new(vec!["127.0.0.1:1".into()], "logs", "watchlist", 10);
    opts.log_dir = log_dir.clone();
    opts.connect_timeout = Duration::from_millis(300);

    let result = new_logger(&opts).await;
    assert!(matches!(result, Err(LoggerError::Bus(_))));
    assert!(!log_dir.exists());
}
