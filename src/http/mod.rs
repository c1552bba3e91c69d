//! HTTP transport for the watchlist operations.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, middleware: trace, timeout, request ID)
//!     → request.rs (request ID extraction)
//!     → handlers.rs (per-request Context, call WatchlistService)
//!     → response.rs (ServiceError → status code + JSON error body)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestId, X_REQUEST_ID};
pub use response::ApiError;
pub use server::{bind_listener, AppState, HttpServer};
