//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment overrides: DB_*, KAFKA_*, SERVICE_NAME, ...)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env_overrides, load_config, ConfigError, ConfigNotice};
pub use schema::{
    DatabaseConfig, KafkaConfig, LoggingConfig, ObservabilityConfig, ServerConfig, ServiceConfig,
    StorageBackend,
};
pub use validation::{validate_config, ValidationError};
