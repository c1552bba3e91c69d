//! Client for the watchlist service HTTP API.

pub mod client;
pub mod types;

pub use client::{ClientError, WatchlistClient};
pub use types::{
    AddResponse, CheckResponse, ListResponse, MediaRequest, RemoveResponse, UserRequest,
    WatchlistItem,
};
