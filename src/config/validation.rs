//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges (timeouts > 0, pool size > 0)
//! - Check the log bus has somewhere to publish
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{ServiceConfig, StorageBackend};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid {field} address: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("service name {0:?} must be a single path component")]
    InvalidServiceName(String),

    #[error("broker address {0:?} must be host:port")]
    InvalidBroker(String),
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "server.bind_address",
            value: config.server.bind_address.clone(),
        });
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::NotPositive("server.request_timeout_secs"));
    }

    if config.database.backend == StorageBackend::Postgres {
        if config.database.host.is_empty() {
            errors.push(ValidationError::Empty("database.host"));
        }
        if config.database.name.is_empty() {
            errors.push(ValidationError::Empty("database.name"));
        }
        if config.database.max_connections == 0 {
            errors.push(ValidationError::NotPositive("database.max_connections"));
        }
    }

    if config.kafka.brokers.is_empty() {
        errors.push(ValidationError::Empty("kafka.brokers"));
    }
    for broker in &config.kafka.brokers {
        if !is_host_port(broker) {
            errors.push(ValidationError::InvalidBroker(broker.clone()));
        }
    }
    if config.kafka.topic.is_empty() {
        errors.push(ValidationError::Empty("kafka.topic"));
    }
    if config.kafka.connect_timeout_ms == 0 {
        errors.push(ValidationError::NotPositive("kafka.connect_timeout_ms"));
    }

    let service_name = &config.logging.service_name;
    if service_name.is_empty() {
        errors.push(ValidationError::Empty("logging.service_name"));
    } else if service_name.contains(['/', '\\']) || service_name.contains("..") {
        errors.push(ValidationError::InvalidServiceName(service_name.clone()));
    }
    if config.logging.log_dir.is_empty() {
        errors.push(ValidationError::Empty("logging.log_dir"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_host_port(addr: &str) -> bool {
    match addr.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}
