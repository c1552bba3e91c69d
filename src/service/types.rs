//! Request and response bodies for the watchlist operations.

use serde::{Deserialize, Serialize};

use crate::repository::WatchlistEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddRequest {
    pub user_id: i64,
    pub media_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveRequest {
    pub user_id: i64,
    pub media_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRequest {
    pub user_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchlistItem {
    pub id: i64,
    pub media_id: i64,
    pub user_id: i64,
    /// RFC3339, second precision.
    pub created_at: String,
}

impl From<WatchlistEntry> for WatchlistItem {
    fn from(entry: WatchlistEntry) -> Self {
        Self {
            id: entry.id,
            media_id: entry.media_id,
            user_id: entry.user_id,
            created_at: entry
                .created_at
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResponse {
    pub watchlists: Vec<WatchlistItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRequest {
    pub user_id: i64,
    pub media_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResponse {
    pub in_watchlist: bool,
}
