//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → HTTP server stops accepting → in-flight requests drain
//!     → main closes the logger (once) → exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup lives in main: config, logger, repository, listener
//! - The logger is closed after the server stops so late request logs
//!   still reach the sinks

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::{shutdown_on_signal, wait_for_signal};
