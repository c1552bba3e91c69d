//! Append-only file sink.
//!
//! Lines go to `<log_dir>/<service>/app.log`. A single worker owns the file
//! handle and writes records in queue order; nothing else touches the file.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::logger::record::{Attr, Level, Record};
use crate::logger::sink::{Scope, Sink, SinkError};
use crate::observability::metrics;

/// Name of the log file inside the service directory.
pub const LOG_FILE_NAME: &str = "app.log";

const SINK_NAME: &str = "file";

struct FileShared {
    path: PathBuf,
    queue: mpsc::Sender<Arc<Record>>,
    stop: CancellationToken,
    worker: Mutex<Option<JoinHandle<io::Result<()>>>>,
    closed: AtomicBool,
}

/// Asynchronous file sink.
#[derive(Clone)]
pub struct FileSink {
    shared: Arc<FileShared>,
    scope: Scope,
}

impl FileSink {
    /// Create the service directory if needed, open the log file for append
    /// and start the writer.
    pub async fn open(log_dir: &Path, service_name: &str, buffer_size: usize) -> io::Result<Self> {
        let dir = log_dir.join(service_name);
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(LOG_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        let (queue, records) = mpsc::channel(buffer_size.max(1));
        let stop = CancellationToken::new();
        let worker = tokio::spawn(write_lines(file, records, stop.clone()));

        tracing::debug!(path = %path.display(), "File sink opened");

        Ok(Self {
            shared: Arc::new(FileShared {
                path,
                queue,
                stop,
                worker: Mutex::new(Some(worker)),
                closed: AtomicBool::new(false),
            }),
            scope: Scope::default(),
        })
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    fn scoped(&self, scope: Scope) -> Arc<dyn Sink> {
        Arc::new(Self {
            shared: Arc::clone(&self.shared),
            scope,
        })
    }
}

#[async_trait]
impl Sink for FileSink {
    fn enabled(&self, _level: Level) -> bool {
        true
    }

    fn handle(&self, record: &Arc<Record>) -> Result<(), SinkError> {
        match self.shared.queue.try_send(self.scope.apply(record)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                metrics::record_dropped(SINK_NAME);
                tracing::warn!(sink = SINK_NAME, "file log channel is full, dropping log message");
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

        let worker = self
            .shared
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match worker {
            Some(handle) => handle
                .await
                .map_err(|e| SinkError::Worker(e.to_string()))?
                .map_err(SinkError::from),
            None => Ok(()),
        }
    }
}

/// Writer loop. Returns once stopped; the file is closed when it is dropped.
async fn write_lines(
    mut file: File,
    mut records: mpsc::Receiver<Arc<Record>>,
    stop: CancellationToken,
) -> io::Result<()> {
    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            received = records.recv() => {
                let Some(record) = received else { break };
                let mut line = record.file_line();
                line.push('\n');
                let written = match file.write_all(line.as_bytes()).await {
                    Ok(()) => file.flush().await,
                    Err(e) => Err(e),
                };
                if let Err(e) = written {
                    tracing::warn!(sink = SINK_NAME, error = %e, "failed to write log line");
                }
            }
        }
    }
    file.flush().await
}
