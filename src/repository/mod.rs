//! Watchlist storage boundary.
//!
//! # Responsibilities
//! - Persist (media, user) watchlist entries
//! - Reject duplicates and report missing entries as typed errors
//! - Refuse work on a context that is already canceled or past its deadline
//!
//! # Design Decisions
//! - Existence is checked before insert/delete so callers get
//!   `Duplicate`/`NotFound` instead of a driver error
//! - Every implementation logs its outcome through the application logger

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::logger::{Attr, ContextError};

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

pub use crate::logger::Context;

/// A stored watchlist entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchlistEntry {
    pub id: i64,
    pub media_id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Entry to be inserted; the store assigns `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewEntry {
    pub media_id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

impl NewEntry {
    pub fn now(media_id: i64, user_id: i64) -> Self {
        Self {
            media_id,
            user_id,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("duplicate entry")]
    Duplicate,

    #[error("record not found")]
    NotFound,

    #[error(transparent)]
    Canceled(#[from] ContextError),

    #[error("database error: {0}")]
    Database(String),
}

#[async_trait]
pub trait WatchlistRepository: Send + Sync + 'static {
    /// Insert an entry. Fails with `Duplicate` if the pair already exists.
    async fn add(&self, ctx: &Context, entry: NewEntry) -> Result<WatchlistEntry, RepositoryError>;

    /// Delete the entry for the pair. Fails with `NotFound` if absent.
    async fn remove(&self, ctx: &Context, media_id: i64, user_id: i64) -> Result<(), RepositoryError>;

    /// All entries of a user, oldest first.
    async fn list(&self, ctx: &Context, user_id: i64) -> Result<Vec<WatchlistEntry>, RepositoryError>;

    async fn contains(&self, ctx: &Context, media_id: i64, user_id: i64) -> Result<bool, RepositoryError>;
}

pub(crate) fn entry_attrs(media_id: i64, user_id: i64) -> [Attr; 2] {
    [Attr::int("media_id", media_id), Attr::int("user_id", user_id)]
}
