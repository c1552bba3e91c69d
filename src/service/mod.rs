//! Watchlist operations.
//!
//! # Responsibilities
//! - Validate requests (ids must be positive)
//! - Translate repository outcomes into responses: a duplicate add is a
//!   success, removing a missing entry is `success = false`
//! - Log each outcome with `media_id` / `user_id` attributes
//!
//! Transport concerns (status codes, JSON) live in `crate::http`.

pub mod types;

use std::sync::Arc;

use thiserror::Error;

use crate::logger::{Attr, Context, ContextError, Logger};
use crate::repository::{entry_attrs, NewEntry, RepositoryError, WatchlistRepository};

pub use types::{
    AddRequest, AddResponse, CheckRequest, CheckResponse, ListRequest, ListResponse, RemoveRequest,
    RemoveResponse, WatchlistItem,
};

const INVALID_IDS: &str = "media_id and user_id must be positive integers";
const INVALID_USER_ID: &str = "user_id must be a positive integer";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidArgument(&'static str),

    #[error(transparent)]
    Canceled(ContextError),

    #[error("{0}")]
    Internal(String),
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Canceled(cause) => ServiceError::Canceled(cause),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct WatchlistService {
    repo: Arc<dyn WatchlistRepository>,
    logger: Logger,
}

impl WatchlistService {
    pub fn new(repo: Arc<dyn WatchlistRepository>, logger: Logger) -> Self {
        Self { repo, logger }
    }

    /// Same service, logging with `attrs` attached to every record.
    pub fn with_attrs(&self, attrs: Vec<Attr>) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            logger: self.logger.with_attrs(attrs),
        }
    }

    fn check(&self, ctx: &Context, operation: &str) -> Result<(), ServiceError> {
        self.logger
            .check_canceled(ctx, operation)
            .map_err(ServiceError::Canceled)
    }

    fn validate_pair(&self, media_id: i64, user_id: i64) -> Result<(), ServiceError> {
        if media_id <= 0 || user_id <= 0 {
            self.logger.warn(
                "invalid media_id or user_id: must be positive integers",
                &entry_attrs(media_id, user_id),
            );
            return Err(ServiceError::InvalidArgument(INVALID_IDS));
        }
        Ok(())
    }

    fn internal(&self, message: &str, attrs: &[Attr], err: RepositoryError) -> ServiceError {
        let err = ServiceError::from(err);
        if let ServiceError::Internal(_) = &err {
            let mut attrs = attrs.to_vec();
            attrs.push(Attr::error(&err));
            self.logger.error(message, &attrs);
        }
        err
    }

    pub async fn add(&self, ctx: &Context, req: AddRequest) -> Result<AddResponse, ServiceError> {
        self.check(ctx, "AddToWatchlist")?;
        self.validate_pair(req.media_id, req.user_id)?;
        let attrs = entry_attrs(req.media_id, req.user_id);

        match self.repo.add(ctx, NewEntry::now(req.media_id, req.user_id)).await {
            Ok(_) => {
                self.logger.info("media added to watchlist successfully", &attrs);
                Ok(AddResponse { success: true })
            }
            Err(RepositoryError::Duplicate) => {
                self.logger.info("media already in watchlist", &attrs);
                Ok(AddResponse { success: true })
            }
            Err(e) => Err(self.internal("failed to add media to watchlist", &attrs, e)),
        }
    }

    pub async fn remove(&self, ctx: &Context, req: RemoveRequest) -> Result<RemoveResponse, ServiceError> {
        self.check(ctx, "RemoveFromWatchlist")?;
        self.validate_pair(req.media_id, req.user_id)?;
        let attrs = entry_attrs(req.media_id, req.user_id);

        match self.repo.remove(ctx, req.media_id, req.user_id).await {
            Ok(()) => {
                self.logger.info("media removed from watchlist successfully", &attrs);
                Ok(RemoveResponse { success: true })
            }
            Err(RepositoryError::NotFound) => {
                self.logger.warn("media not found in watchlist", &attrs);
                Ok(RemoveResponse { success: false })
            }
            Err(e) => Err(self.internal("failed to remove media from watchlist", &attrs, e)),
        }
    }

    pub async fn list(&self, ctx: &Context, req: ListRequest) -> Result<ListResponse, ServiceError> {
        self.check(ctx, "GetWatchlist")?;
        let attrs = [Attr::int("user_id", req.user_id)];
        if req.user_id <= 0 {
            self.logger.warn("invalid user_id: must be a positive integer", &attrs);
            return Err(ServiceError::InvalidArgument(INVALID_USER_ID));
        }

        let entries = self
            .repo
            .list(ctx, req.user_id)
            .await
            .map_err(|e| self.internal("failed to get watchlist", &attrs, e))?;

        self.logger.info("watchlist fetched successfully", &attrs);
        Ok(ListResponse {
            watchlists: entries.into_iter().map(WatchlistItem::from).collect(),
        })
    }

    pub async fn check_in(&self, ctx: &Context, req: CheckRequest) -> Result<CheckResponse, ServiceError> {
        self.check(ctx, "CheckInWatchlist")?;
        self.validate_pair(req.media_id, req.user_id)?;
        let attrs = entry_attrs(req.media_id, req.user_id);

        let in_watchlist = self
            .repo
            .contains(ctx, req.media_id, req.user_id)
            .await
            .map_err(|e| self.internal("failed to check watchlist", &attrs, e))?;

        let mut attrs = attrs.to_vec();
        attrs.push(Attr::bool("in_watchlist", in_watchlist));
        self.logger.info("watchlist membership checked", &attrs);
        Ok(CheckResponse { in_watchlist })
    }
}
