//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use watchlist::bus::{BusError, BusMessage, BusProducer, DeliveryError};
use watchlist::config::ServerConfig;
use watchlist::logger::{Dispatcher, Logger};
use watchlist::repository::MemoryRepository;
use watchlist::service::WatchlistService;
use watchlist::{HttpServer, Shutdown};

/// Bus producer that keeps every message in memory.
#[derive(Clone, Default)]
pub struct RecordingProducer {
    pub sent: Arc<Mutex<Vec<BusMessage>>>,
    pub closed: Arc<AtomicBool>,
}

impl RecordingProducer {
    pub fn messages(&self) -> Vec<BusMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn payloads(&self) -> Vec<serde_json::Value> {
        self.messages()
            .iter()
            .map(|m| serde_json::from_slice(&m.value).unwrap())
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BusProducer for RecordingProducer {
    async fn send(&self, message: BusMessage) -> Result<(), BusError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    fn take_errors(&mut self) -> Option<mpsc::Receiver<DeliveryError>> {
        None
    }

    async fn close(&self) -> Result<(), BusError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Poll `cond` for up to two seconds.
pub async fn wait_until(cond: impl Fn() -> bool) -> bool {
    for _ in 0..400 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

/// Poll the file at `path` until it holds a line matching `pred`.
pub async fn wait_for_line(path: &Path, pred: impl Fn(&str) -> bool) -> bool {
    for _ in 0..400 {
        if read_lines(path).await.iter().any(|l| pred(l)) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

pub async fn read_lines(path: &Path) -> Vec<String> {
    tokio::fs::read_to_string(path)
        .await
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Logger with no sinks.
pub fn silent_logger() -> Logger {
    Logger::new(Dispatcher::new(Vec::new()))
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server should stop")
            .expect("server task panicked")
            .expect("server returned an error");
    }
}

/// Serve the API over an in-memory repository on an ephemeral port.
pub async fn start_server(logger: Logger) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let repo = Arc::new(MemoryRepository::new(logger.clone()));
    let service = WatchlistService::new(repo, logger);
    let server = HttpServer::new(service, &ServerConfig::default());

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let handle = tokio::spawn(server.run(listener, rx));

    TestServer {
        addr,
        shutdown,
        handle,
    }
}
