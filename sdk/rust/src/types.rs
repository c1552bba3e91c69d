use serde::{Deserialize, Serialize};

/// Body of the add, remove and check calls.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MediaRequest {
    pub user_id: i64,
    pub media_id: i64,
}

/// Body of the list call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UserRequest {
    pub user_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveResponse {
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchlistItem {
    pub id: i64,
    pub media_id: i64,
    pub user_id: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    pub watchlists: Vec<WatchlistItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResponse {
    pub in_watchlist: bool,
}
