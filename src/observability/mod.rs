//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Logger sinks, producer, HTTP layer produce:
//!     → logging.rs (local diagnostics via tracing, stderr)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Operator terminal / container log collector (stderr)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Diagnostics never go through the application Logger, so a failing
//!   sink cannot feed back into itself
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
