//! Application logger.
//!
//! # Data Flow
//! ```text
//! caller
//!     → Logger (leveled calls, context checks)
//!     → Dispatcher (fan-out, no filtering)
//!         → BusSink     (bounded queue → publish worker → producer)
//!         → FileSink    (bounded queue → writer → logs/<service>/app.log)
//!         → ConsoleSink (synchronous write to stdout)
//!
//! Shutdown: Logger::shutdown → Dispatcher::close_all → each sink's close
//! ```
//!
//! # Design Decisions
//! - Logging never fails the caller: overflow and sink errors become diagnostics
//! - Async sinks shed load by dropping the newest record when their queue is full
//! - Records still queued at shutdown are dropped, not flushed
//! - The logger is an explicit handle passed to whoever logs; no global state

pub mod bus_sink;
pub mod console_sink;
pub mod context;
pub mod dispatcher;
pub mod file_sink;
pub mod record;
pub mod sink;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::bus::{BusError, BusProducer, ProducerConfig};
use crate::config::ServiceConfig;

pub use bus_sink::BusSink;
pub use console_sink::ConsoleSink;
pub use context::{Context, ContextError};
pub use dispatcher::Dispatcher;
pub use file_sink::FileSink;
pub use record::{Attr, Level, Record};
pub use sink::{Sink, SinkError};

/// Queue capacity used when the configured value is not positive.
pub const DEFAULT_BUFFER_SIZE: usize = 100;

/// Errors that prevent the logger from being created.
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("failed to create bus sink: {0}")]
    Bus(#[from] BusError),

    #[error("failed to open log file under {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Everything needed to build the logger.
#[derive(Debug, Clone)]
pub struct LoggerOptions {
    pub brokers: Vec<String>,
    pub topic: String,
    pub service_name: String,
    pub buffer_size: usize,
    /// Root directory for file logs; the service gets its own subdirectory.
    pub log_dir: PathBuf,
    pub connect_timeout: Duration,
}

impl LoggerOptions {
    pub fn new(
        brokers: Vec<String>,
        topic: impl Into<String>,
        service_name: impl Into<String>,
        buffer_size: i64,
    ) -> Self {
        Self {
            brokers,
            topic: topic.into(),
            service_name: service_name.into(),
            buffer_size: normalize_buffer_size(buffer_size),
            log_dir: PathBuf::from("logs"),
            connect_timeout: Duration::from_secs(5),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            brokers: config.kafka.brokers.clone(),
            topic: config.kafka.topic.clone(),
            service_name: config.logging.service_name.clone(),
            buffer_size: config.logging.effective_buffer_size(),
            log_dir: PathBuf::from(&config.logging.log_dir),
            connect_timeout: Duration::from_millis(config.kafka.connect_timeout_ms),
        }
    }

    fn producer_config(&self) -> ProducerConfig {
        let mut config = ProducerConfig::new(self.brokers.clone(), self.topic.clone());
        config.connect_timeout = self.connect_timeout;
        config
    }
}

/// Queue capacity for a configured value; non-positive values use the default.
pub fn normalize_buffer_size(raw: i64) -> usize {
    if raw <= 0 {
        DEFAULT_BUFFER_SIZE
    } else {
        usize::try_from(raw).unwrap_or(DEFAULT_BUFFER_SIZE)
    }
}

/// Build the logger: Kafka sink, then file sink, then console sink.
pub async fn new_logger(options: &LoggerOptions) -> Result<Logger, LoggerError> {
    let bus = BusSink::connect(&options.producer_config(), options.buffer_size).await?;
    assemble(options, bus).await
}

/// Build the logger over a caller-supplied bus producer.
pub async fn new_logger_with_producer(
    options: &LoggerOptions,
    producer: Box<dyn BusProducer>,
) -> Result<Logger, LoggerError> {
    let bus = BusSink::new(producer, options.topic.clone(), options.buffer_size);
    assemble(options, bus).await
}

/// Open the file and console sinks behind `bus`. If the file sink cannot be
/// opened the bus sink is closed before the error is returned.
async fn assemble(options: &LoggerOptions, bus: BusSink) -> Result<Logger, LoggerError> {
    let file = match FileSink::open(&options.log_dir, &options.service_name, options.buffer_size).await {
        Ok(file) => file,
        Err(source) => {
            if let Err(e) = bus.close().await {
                tracing::warn!(error = %e, "Failed to close bus sink after file sink error");
            }
            return Err(LoggerError::File {
                path: options.log_dir.join(&options.service_name),
                source,
            });
        }
    };

    let console = ConsoleSink::new();

    Ok(Logger::new(Dispatcher::new(vec![
        Arc::new(bus),
        Arc::new(file),
        Arc::new(console),
    ])))
}

/// Cloneable leveled-logging handle.
#[derive(Clone)]
pub struct Logger {
    handler: Arc<dyn Sink>,
}

impl Logger {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self::from_sink(Arc::new(dispatcher))
    }

    pub fn from_sink(handler: Arc<dyn Sink>) -> Self {
        Self { handler }
    }

    pub fn enabled(&self, level: Level) -> bool {
        self.handler.enabled(level)
    }

    /// Emit a record. Never fails: sink errors become diagnostics.
    pub fn log(&self, level: Level, message: impl Into<String>, attrs: &[Attr]) {
        if !self.handler.enabled(level) {
            return;
        }
        let record = Arc::new(Record::new(level, message, attrs.to_vec()));
        if let Err(e) = self.handler.handle(&record) {
            tracing::warn!(error = %e, "Log sink failed to handle record");
        }
    }

    pub fn debug(&self, message: impl Into<String>, attrs: &[Attr]) {
        self.log(Level::Debug, message, attrs);
    }

    pub fn info(&self, message: impl Into<String>, attrs: &[Attr]) {
        self.log(Level::Info, message, attrs);
    }

    pub fn warn(&self, message: impl Into<String>, attrs: &[Attr]) {
        self.log(Level::Warn, message, attrs);
    }

    pub fn error(&self, message: impl Into<String>, attrs: &[Attr]) {
        self.log(Level::Error, message, attrs);
    }

    /// Log under `ctx`. A canceled context logs "operation canceled" at error
    /// level with the cause attached and returns the cause instead.
    pub fn log_ctx(
        &self,
        ctx: &Context,
        level: Level,
        message: impl Into<String>,
        attrs: &[Attr],
    ) -> Result<(), ContextError> {
        if let Some(cause) = ctx.err() {
            self.error("operation canceled", &[Attr::error(&cause)]);
            return Err(cause);
        }
        self.log(level, message, attrs);
        Ok(())
    }

    pub fn debug_ctx(&self, ctx: &Context, message: impl Into<String>, attrs: &[Attr]) -> Result<(), ContextError> {
        self.log_ctx(ctx, Level::Debug, message, attrs)
    }

    pub fn info_ctx(&self, ctx: &Context, message: impl Into<String>, attrs: &[Attr]) -> Result<(), ContextError> {
        self.log_ctx(ctx, Level::Info, message, attrs)
    }

    pub fn warn_ctx(&self, ctx: &Context, message: impl Into<String>, attrs: &[Attr]) -> Result<(), ContextError> {
        self.log_ctx(ctx, Level::Warn, message, attrs)
    }

    pub fn error_ctx(&self, ctx: &Context, message: impl Into<String>, attrs: &[Attr]) -> Result<(), ContextError> {
        self.log_ctx(ctx, Level::Error, message, attrs)
    }

    /// Fail with the cancellation cause if `ctx` is no longer live, logging
    /// "<operation> operation canceled".
    pub fn check_canceled(&self, ctx: &Context, operation: &str) -> Result<(), ContextError> {
        match ctx.err() {
            Some(cause) => {
                self.error(format!("{operation} operation canceled"), &[Attr::error(&cause)]);
                Err(cause)
            }
            None => Ok(()),
        }
    }

    pub fn with_attrs(&self, attrs: Vec<Attr>) -> Logger {
        Self::from_sink(self.handler.with_attrs(attrs))
    }

    pub fn with_group(&self, name: &str) -> Logger {
        Self::from_sink(self.handler.with_group(name))
    }

    /// Close every sink. Call once, after producers of log calls have stopped.
    pub async fn shutdown(&self) -> Result<(), SinkError> {
        self.handler.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    #[derive(Clone, Default)]
    struct MemorySink {
        records: Arc<Mutex<Vec<Record>>>,
    }

    #[async_trait]
    impl Sink for MemorySink {
        fn enabled(&self, _level: Level) -> bool {
            true
        }

        fn handle(&self, record: &Arc<Record>) -> Result<(), SinkError> {
            self.records.lock().unwrap().push(record.as_ref().clone());
            Ok(())
        }

        fn with_attrs(&self, _attrs: Vec<Attr>) -> Arc<dyn Sink> {
            Arc::new(self.clone())
        }

        fn with_group(&self, _name: &str) -> Arc<dyn Sink> {
            Arc::new(self.clone())
        }
    }

    fn memory_logger() -> (Logger, MemorySink) {
        let sink = MemorySink::default();
        let logger = Logger::new(Dispatcher::new(vec![Arc::new(sink.clone())]));
        (logger, sink)
    }

    #[test]
    fn test_normalize_buffer_size() {
        assert_eq!(normalize_buffer_size(0), DEFAULT_BUFFER_SIZE);
        assert_eq!(normalize_buffer_size(-5), DEFAULT_BUFFER_SIZE);
        assert_eq!(normalize_buffer_size(2), 2);
        assert_eq!(LoggerOptions::new(vec![], "t", "s", 0).buffer_size, 100);
    }

    #[test]
    fn test_leveled_calls() {
        let (logger, sink) = memory_logger();
        logger.debug("d", &[]);
        logger.info("i", &[Attr::int("user_id", 1)]);
        logger.warn("w", &[]);
        logger.error("e", &[]);

        let records = sink.records.lock().unwrap();
        let levels: Vec<Level> = records.iter().map(|r| r.level).collect();
        assert_eq!(levels, vec![Level::Debug, Level::Info, Level::Warn, Level::Error]);
        assert_eq!(records[1].attrs, vec![Attr::int("user_id", 1)]);
    }

    #[test]
    fn test_ctx_call_on_live_context_logs_normally() {
        let (logger, sink) = memory_logger();
        assert!(logger.info_ctx(&Context::new(), "fine", &[]).is_ok());

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "fine");
    }

    #[test]
    fn test_ctx_call_on_canceled_context() {
        let (logger, sink) = memory_logger();
        let ctx = Context::new();
        ctx.cancel();

        assert_eq!(logger.info_ctx(&ctx, "never", &[]), Err(ContextError::Canceled));

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, Level::Error);
        assert_eq!(records[0].message, "operation canceled");
        assert_eq!(records[0].attrs, vec![Attr::string("error", "context canceled")]);
    }

    #[test]
    fn test_check_canceled_names_operation() {
        let (logger, sink) = memory_logger();
        assert!(logger.check_canceled(&Context::new(), "GetWatchlist").is_ok());

        let expired = Context::with_timeout(Duration::ZERO);
        assert_eq!(
            logger.check_canceled(&expired, "GetWatchlist"),
            Err(ContextError::DeadlineExceeded)
        );
        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "GetWatchlist operation canceled");
    }

    #[test]
    fn test_disabled_dispatcher_skips_records() {
        let logger = Logger::new(Dispatcher::new(Vec::new()));
        assert!(!logger.enabled(Level::Error));
        logger.error("dropped", &[]);
    }
}
