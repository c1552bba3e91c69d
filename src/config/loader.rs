//! Configuration loading from disk and environment.
//!
//! Precedence, lowest to highest: built-in defaults, the TOML file (when one
//! is given), then environment variables.

use std::fmt;
use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{ServiceConfig, StorageBackend};
use crate::config::validation::{validate_config, ValidationError};
use crate::logger::DEFAULT_BUFFER_SIZE;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value {value:?} for {name}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A setting that was replaced by its default while loading.
///
/// Loading runs before diagnostics are installed, so these are returned to
/// the caller to report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigNotice {
    BufferSizeFallback { source: &'static str, value: String },
}

impl fmt::Display for ConfigNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigNotice::BufferSizeFallback { source, value } => write!(
                f,
                "invalid {} {:?}, using default buffer size {}",
                source, value, DEFAULT_BUFFER_SIZE
            ),
        }
    }
}

/// Load configuration: defaults, then `path` if given, then the process
/// environment. The result is validated before it is returned, together with
/// any values that fell back to defaults.
pub fn load_config(path: Option<&Path>) -> Result<(ServiceConfig, Vec<ConfigNotice>), ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => ServiceConfig::default(),
    };

    let mut notices = apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    if config.logging.buffer_size <= 0 {
        notices.push(ConfigNotice::BufferSizeFallback {
            source: "logging.buffer_size",
            value: config.logging.buffer_size.to_string(),
        });
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok((config, notices))
}

/// Overlay environment variables onto `config`.
///
/// `lookup` returns the value of a variable; empty values count as unset.
/// An unparsable or non-positive `LOG_BUFFER_SIZE` yields the default
/// buffer size and a notice rather than an error.
pub fn apply_env_overrides<F>(
    config: &mut ServiceConfig,
    lookup: F,
) -> Result<Vec<ConfigNotice>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
    let mut notices = Vec::new();

    if let Some(v) = get("DB_BACKEND") {
        config.database.backend = match v.as_str() {
            "postgres" => StorageBackend::Postgres,
            "memory" => StorageBackend::Memory,
            _ => return Err(ConfigError::InvalidEnv { name: "DB_BACKEND", value: v }),
        };
    }
    if let Some(v) = get("DB_HOST") {
        config.database.host = v;
    }
    if let Some(v) = get("DB_PORT") {
        config.database.port = v
            .parse()
            .map_err(|_| ConfigError::InvalidEnv { name: "DB_PORT", value: v })?;
    }
    if let Some(v) = get("DB_USER") {
        config.database.user = v;
    }
    if let Some(v) = get("DB_PASSWORD") {
        config.database.password = v;
    }
    if let Some(v) = get("DB_NAME") {
        config.database.name = v;
    }
    if let Some(v) = get("DB_SSLMODE") {
        config.database.sslmode = v;
    }

    if let Some(v) = get("KAFKA_BROKERS") {
        config.kafka.brokers = v.split(',').map(|b| b.trim().to_string()).collect();
    }
    if let Some(v) = get("KAFKA_TOPIC") {
        config.kafka.topic = v;
    }

    if let Some(v) = get("SERVER_ADDR") {
        config.server.bind_address = v;
    }
    if let Some(v) = get("SERVICE_NAME") {
        config.logging.service_name = v;
    }
    if let Some(v) = get("LOG_BUFFER_SIZE") {
        config.logging.buffer_size = match v.trim().parse::<i64>() {
            Ok(n) if n > 0 => n,
            _ => {
                notices.push(ConfigNotice::BufferSizeFallback {
                    source: "LOG_BUFFER_SIZE",
                    value: v,
                });
                DEFAULT_BUFFER_SIZE as i64
            }
        };
    }

    Ok(notices)
}
