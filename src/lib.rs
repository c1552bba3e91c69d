//! Watchlist service library.
//!
//! The core is the application logger (`logger`): a fan-out dispatcher over a
//! Kafka bus sink, an append-only file sink and a colorized console sink. The
//! rest is the service it serves: configuration, a watchlist repository, the
//! four watchlist operations and their HTTP transport.

pub mod bus;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod logger;
pub mod observability;
pub mod repository;
pub mod service;

pub use config::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use logger::{new_logger, Logger, LoggerOptions};
