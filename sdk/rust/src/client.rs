use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{
    AddResponse, CheckResponse, ListResponse, MediaRequest, RemoveResponse, UserRequest,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("service returned {status}: {message}")]
    Api { status: StatusCode, message: String },
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct WatchlistClient {
    client: Client,
    base_url: String,
}

impl WatchlistClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn add(&self, user_id: i64, media_id: i64) -> Result<AddResponse, ClientError> {
        self.call("add", &MediaRequest { user_id, media_id }).await
    }

    pub async fn remove(&self, user_id: i64, media_id: i64) -> Result<RemoveResponse, ClientError> {
        self.call("remove", &MediaRequest { user_id, media_id }).await
    }

    pub async fn list(&self, user_id: i64) -> Result<ListResponse, ClientError> {
        self.call("list", &UserRequest { user_id }).await
    }

    pub async fn check(&self, user_id: i64, media_id: i64) -> Result<CheckResponse, ClientError> {
        self.call("check", &MediaRequest { user_id, media_id }).await
    }

    /// `true` if `/health` answers 200.
    pub async fn health(&self) -> Result<bool, ClientError> {
        let resp = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Ok(resp.status() == StatusCode::OK)
    }

    async fn call<B, T>(&self, operation: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self
            .client
            .post(format!("{}/v1/watchlist/{}", self.base_url, operation))
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await?;
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|b| b.error)
                .unwrap_or(text);
            return Err(ClientError::Api { status, message });
        }

        Ok(resp.json().await?)
    }
}
