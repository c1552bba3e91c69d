//! HTTP server setup.
//!
//! # Responsibilities
//! - Create Axum Router with the watchlist endpoints
//! - Wire up middleware (tracing, timeout, request ID)
//! - Serve on a listener until the shutdown signal fires

use std::net::SocketAddr;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::http::handlers;
use crate::http::request::X_REQUEST_ID;
use crate::service::WatchlistService;

/// Bind `addr` and resolve the address actually bound, so a port of 0 is
/// reported as the assigned port.
pub async fn bind_listener(addr: &str) -> std::io::Result<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    Ok((listener, local))
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: WatchlistService,
    pub request_timeout: Duration,
}

/// HTTP server for the watchlist API.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(service: WatchlistService, config: &ServerConfig) -> Self {
        let state = AppState {
            service,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        };
        Self {
            router: Self::build_router(state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let timeout = state.request_timeout;
        Router::new()
            .route("/health", get(handlers::health))
            .route("/v1/watchlist/add", post(handlers::add))
            .route("/v1/watchlist/remove", post(handlers::remove))
            .route("/v1/watchlist/list", post(handlers::list))
            .route("/v1/watchlist/check", post(handlers::check))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::new(timeout))
                    .layer(PropagateRequestIdLayer::new(X_REQUEST_ID)),
            )
    }

    /// Serve until `shutdown` fires, then finish in-flight requests and return.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining requests");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
