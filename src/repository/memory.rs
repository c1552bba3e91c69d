//! In-memory repository backed by a concurrent map.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::logger::{Attr, Logger};
use crate::repository::{
    entry_attrs, Context, NewEntry, RepositoryError, WatchlistEntry, WatchlistRepository,
};

/// Entries keyed by `(media_id, user_id)`.
pub struct MemoryRepository {
    entries: DashMap<(i64, i64), WatchlistEntry>,
    next_id: AtomicI64,
    logger: Logger,
}

impl MemoryRepository {
    pub fn new(logger: Logger) -> Self {
        Self {
            entries: DashMap::new(),
            next_id: AtomicI64::new(1),
            logger,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl WatchlistRepository for MemoryRepository {
    async fn add(&self, ctx: &Context, entry: NewEntry) -> Result<WatchlistEntry, RepositoryError> {
        self.logger.check_canceled(ctx, "AddToWatchlist")?;
        let attrs = entry_attrs(entry.media_id, entry.user_id);

        match self.entries.entry((entry.media_id, entry.user_id)) {
            Entry::Occupied(_) => {
                self.logger.warn("media already in watchlist", &attrs);
                Err(RepositoryError::Duplicate)
            }
            Entry::Vacant(slot) => {
                let stored = WatchlistEntry {
                    id: self.next_id.fetch_add(1, Ordering::Relaxed),
                    media_id: entry.media_id,
                    user_id: entry.user_id,
                    created_at: entry.created_at,
                };
                slot.insert(stored.clone());
                self.logger.info("media added to watchlist", &attrs);
                Ok(stored)
            }
        }
    }

    async fn remove(&self, ctx: &Context, media_id: i64, user_id: i64) -> Result<(), RepositoryError> {
        self.logger.check_canceled(ctx, "RemoveFromWatchlist")?;
        let attrs = entry_attrs(media_id, user_id);

        if self.entries.remove(&(media_id, user_id)).is_none() {
            self.logger.warn("media not found in watchlist", &attrs);
            return Err(RepositoryError::NotFound);
        }
        self.logger.info("media removed from watchlist", &attrs);
        Ok(())
    }

    async fn list(&self, ctx: &Context, user_id: i64) -> Result<Vec<WatchlistEntry>, RepositoryError> {
        self.logger.check_canceled(ctx, "GetWatchlist")?;

        let mut entries: Vec<WatchlistEntry> = self
            .entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.value().clone())
            .collect();
        entries.sort_by_key(|e| e.id);

        self.logger
            .info("watchlist fetched", &[Attr::int("user_id", user_id)]);
        Ok(entries)
    }

    async fn contains(&self, ctx: &Context, media_id: i64, user_id: i64) -> Result<bool, RepositoryError> {
        self.logger.check_canceled(ctx, "CheckInWatchlist")?;
        Ok(self.entries.contains_key(&(media_id, user_id)))
    }
}
