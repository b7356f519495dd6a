//! HTTP API handlers.
//!
//! Everything here is served under `/api`. Error responses are JSON
//! objects with an `error` key; informational responses use a `msg` key.

pub mod authors;
pub mod books;
pub mod callback;
pub mod orders;

use axum::Json;
use axum::Router;
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

/// Build the `/api` router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(books::router())
        .merge(authors::router())
        .merge(orders::router())
        .merge(callback::router())
}

/// `{"error": …}` with the given status.
fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// `{"msg": …}` with the given status.
fn msg_response(status: StatusCode, message: &'static str) -> Response {
    (status, Json(serde_json::json!({ "msg": message }))).into_response()
}

/// A pre-serialized JSON body, as stored in the listing cache.
fn raw_json(body: &str) -> Response {
    (
        [(header::CONTENT_TYPE, "application/json")],
        body.to_owned(),
    )
        .into_response()
}

/// Listing cache key: the request path with its query string.
fn cache_key(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path())
        .to_owned()
}
