//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::logger::normalize_buffer_size;
use crate::observability::logging::DEFAULT_FILTER;

/// Root configuration for the watchlist service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// RPC listener settings.
    pub server: ServerConfig,

    /// Relational store settings.
    pub database: DatabaseConfig,

    /// Message bus used by the logger.
    pub kafka: KafkaConfig,

    /// Logger settings.
    pub logging: LoggingConfig,

    /// Metrics settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:50051").
    pub bind_address: String,

    /// Per-request deadline in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:50051".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Which repository implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    /// libpq-style SSL mode (disable, prefer, require, ...).
    pub sslmode: String,
    /// Pool size.
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Postgres,
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            name: "watchlist".to_string(),
            sslmode: "disable".to_string(),
            max_connections: 10,
        }
    }
}

/// Kafka configuration for the log bus sink.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KafkaConfig {
    /// Bootstrap broker addresses ("host:port").
    pub brokers: Vec<String>,

    /// Topic receiving log records.
    pub topic: String,

    /// Deadline for reaching the brokers at startup, in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            topic: "logs".to_string(),
            connect_timeout_ms: 5000,
        }
    }
}

/// Logger configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Service identity; also the file-log subdirectory.
    pub service_name: String,

    /// Per-sink queue capacity. Non-positive values fall back to 100.
    pub buffer_size: i64,

    /// Root directory for file logs.
    pub log_dir: String,

    /// Filter for local diagnostics when `RUST_LOG` is unset.
    pub diagnostics_filter: String,
}

impl LoggingConfig {
    pub fn effective_buffer_size(&self) -> usize {
        normalize_buffer_size(self.buffer_size)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            service_name: "watchlist".to_string(),
            buffer_size: 100,
            log_dir: "logs".to_string(),
            diagnostics_filter: DEFAULT_FILTER.to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
