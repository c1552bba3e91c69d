//! Endpoint handlers.
//!
//! Each handler builds a `Context` bounded by the request timeout, scopes the
//! service's logger with the request ID, and records request metrics.

use std::time::Instant;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::http::request::RequestId;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::logger::{Attr, Context};
use crate::observability::metrics;
use crate::service::{
    AddRequest, AddResponse, CheckRequest, CheckResponse, ListRequest, ListResponse, RemoveRequest,
    RemoveResponse, ServiceError, WatchlistService,
};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn add(
    State(state): State<AppState>,
    request_id: RequestId,
    Json(req): Json<AddRequest>,
) -> Result<Json<AddResponse>, ApiError> {
    let start = Instant::now();
    let (ctx, service) = prepare(&state, &request_id);
    let _cancel_on_drop = ctx.token().clone().drop_guard();
    finish("add", start, service.add(&ctx, req).await)
}

pub async fn remove(
    State(state): State<AppState>,
    request_id: RequestId,
    Json(req): Json<RemoveRequest>,
) -> Result<Json<RemoveResponse>, ApiError> {
    let start = Instant::now();
    let (ctx, service) = prepare(&state, &request_id);
    let _cancel_on_drop = ctx.token().clone().drop_guard();
    finish("remove", start, service.remove(&ctx, req).await)
}

pub async fn list(
    State(state): State<AppState>,
    request_id: RequestId,
    Json(req): Json<ListRequest>,
) -> Result<Json<ListResponse>, ApiError> {
    let start = Instant::now();
    let (ctx, service) = prepare(&state, &request_id);
    let _cancel_on_drop = ctx.token().clone().drop_guard();
    finish("list", start, service.list(&ctx, req).await)
}

pub async fn check(
    State(state): State<AppState>,
    request_id: RequestId,
    Json(req): Json<CheckRequest>,
) -> Result<Json<CheckResponse>, ApiError> {
    let start = Instant::now();
    let (ctx, service) = prepare(&state, &request_id);
    let _cancel_on_drop = ctx.token().clone().drop_guard();
    finish("check", start, service.check_in(&ctx, req).await)
}

fn prepare(state: &AppState, request_id: &RequestId) -> (Context, WatchlistService) {
    let ctx = Context::with_timeout(state.request_timeout);
    let service = state
        .service
        .with_attrs(vec![Attr::string("request_id", request_id.0.clone())]);
    (ctx, service)
}

fn finish<T>(
    operation: &'static str,
    start: Instant,
    result: Result<T, ServiceError>,
) -> Result<Json<T>, ApiError> {
    match result {
        Ok(body) => {
            metrics::record_request(operation, 200, start);
            Ok(Json(body))
        }
        Err(e) => {
            let err = ApiError::from(e);
            metrics::record_request(operation, err.status.as_u16(), start);
            tracing::debug!(operation, status = %err.status, error = %err.message, "Request failed");
            Err(err)
        }
    }
}
