//! Watchlist service.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ http (axum) ──▶ service ──▶ repository (Postgres | memory)
//!                                  │              │
//!                                  ▼              ▼
//!                             ┌──────────────────────────┐
//!                             │          Logger          │
//!                             │  Dispatcher              │
//!                             │   ├─ BusSink ──▶ Kafka   │
//!                             │   ├─ FileSink ──▶ app.log│
//!                             │   └─ ConsoleSink ──▶ out │
//!                             └──────────────────────────┘
//! ```
//!
//! Startup order: config, metrics, logger, repository, listener. Any failure
//! before the listener is bound is fatal.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use watchlist::config::{load_config, StorageBackend};
use watchlist::lifecycle::{shutdown_on_signal, Shutdown};
use watchlist::logger::{new_logger, Attr, LoggerOptions};
use watchlist::observability::{logging, metrics};
use watchlist::repository::{MemoryRepository, PostgresRepository, WatchlistRepository};
use watchlist::service::WatchlistService;
use watchlist::http::bind_listener;
use watchlist::HttpServer;

#[derive(Parser)]
#[command(name = "watchlist", about = "Watchlist service", version)]
struct Cli {
    /// Path to a TOML config file; environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let (config, notices) = match load_config(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            logging::init_diagnostics(logging::DEFAULT_FILTER);
            tracing::error!(error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };
    logging::init_diagnostics(&config.logging.diagnostics_filter);
    for notice in &notices {
        tracing::warn!("{}", notice);
    }

    tracing::info!(
        bind_address = %config.server.bind_address,
        service_name = %config.logging.service_name,
        brokers = ?config.kafka.brokers,
        topic = %config.kafka.topic,
        buffer_size = config.logging.effective_buffer_size(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let logger = new_logger(&LoggerOptions::from_config(&config)).await?;
    logger.info(
        "logger initialized",
        &[Attr::string("service", config.logging.service_name.clone())],
    );

    let repo: Arc<dyn WatchlistRepository> = match config.database.backend {
        StorageBackend::Postgres => {
            match PostgresRepository::connect(&config.database, logger.clone()).await {
                Ok(repo) => Arc::new(repo),
                Err(e) => {
                    logger.error("failed to connect to database", &[Attr::error(&e)]);
                    close_logger(&logger).await;
                    return Err(e.into());
                }
            }
        }
        StorageBackend::Memory => Arc::new(MemoryRepository::new(logger.clone())),
    };

    let listener = match bind_listener(&config.server.bind_address).await {
        Ok((listener, addr)) => {
            logger.info("server listening", &[Attr::string("address", addr.to_string())]);
            listener
        }
        Err(e) => {
            logger.error("failed to listen", &[Attr::error(&e)]);
            close_logger(&logger).await;
            return Err(e.into());
        }
    };

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let signals = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { shutdown_on_signal(&shutdown).await })
    };

    let service = WatchlistService::new(repo, logger.clone());
    let result = HttpServer::new(service, &config.server)
        .run(listener, server_shutdown)
        .await;
    signals.abort();

    if let Err(e) = &result {
        logger.error("server stopped with error", &[Attr::error(e)]);
    } else {
        logger.info("server stopped", &[]);
    }
    close_logger(&logger).await;

    tracing::info!("Shutdown complete");
    result.map_err(Into::into)
}

async fn close_logger(logger: &watchlist::Logger) {
    if let Err(e) = logger.shutdown().await {
        tracing::error!(error = %e, "Failed to close logger");
    }
}
