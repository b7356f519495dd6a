//! Author catalog endpoints.
//!
//! Authors are created implicitly when books are added; these routes
//! only read.
//!
//! # Endpoints
//!
//! - `GET /authors`      – list authors, optionally filtered by name
//! - `GET /authors/{id}` – fetch one author

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
};
use bookstore_core::store::{AuthorFilter, Page, StoreError};
use serde::Deserialize;

use super::{cache_key, error_response, msg_response, raw_json};
use crate::state::AppState;

/// Build the authors router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/authors", get(list_authors))
        .route("/authors/{id}", get(get_author))
}

/// Accepted query parameters for `GET /authors`. Anything else is a 400.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AuthorListParams {
    name: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

/// `GET /authors` — list authors, cached like the book listing.
async fn list_authors(State(state): State<AppState>, uri: Uri) -> Result<Response, AuthorApiError> {
    let Query(params) =
        Query::<AuthorListParams>::try_from_uri(&uri).map_err(|_| AuthorApiError::InvalidQuery)?;

    let key = cache_key(&uri);
    if let Some(body) = state.listings.get(&key).await {
        return Ok(raw_json(&body));
    }

    let filter = AuthorFilter {
        name: params.name.filter(|s| !s.is_empty()),
        page: Page::new(params.limit, params.offset),
    };
    let filtered = filter.name.is_some();
    let authors = state.store.list_authors(&filter).await?;

    if authors.is_empty() {
        if filtered {
            return Ok(msg_response(
                StatusCode::NOT_FOUND,
                "no authors found by filters",
            ));
        }
        return Ok(msg_response(StatusCode::OK, "no authors yet"));
    }

    let body = serde_json::to_string(&authors).map_err(AuthorApiError::Serialize)?;
    state.listings.put(key, body.as_str().into()).await;
    Ok(raw_json(&body))
}

/// `GET /authors/{id}` — fetch one author.
async fn get_author(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AuthorApiError> {
    let id: i64 = id.parse().map_err(|_| AuthorApiError::NotFound)?;
    let author = state
        .store
        .author_by_id(id)
        .await?
        .ok_or(AuthorApiError::NotFound)?;
    Ok(Json(author))
}

// ---------------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------------

/// Errors that can occur in author handlers.
#[derive(Debug)]
enum AuthorApiError {
    /// A database query failed.
    Database(StoreError),
    /// Listing serialization failed.
    Serialize(serde_json::Error),
    /// Unknown or unparseable query parameters.
    InvalidQuery,
    /// The requested author does not exist.
    NotFound,
}

impl From<StoreError> for AuthorApiError {
    fn from(e: StoreError) -> Self {
        Self::Database(e)
    }
}

impl IntoResponse for AuthorApiError {
    fn into_response(self) -> Response {
        match self {
            AuthorApiError::Database(e) => {
                tracing::error!(error = %e, "author API database error");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
            AuthorApiError::Serialize(e) => {
                tracing::error!(error = %e, "author API serialization error");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
            AuthorApiError::InvalidQuery => {
                error_response(StatusCode::BAD_REQUEST, "invalid query params")
            }
            AuthorApiError::NotFound => error_response(StatusCode::NOT_FOUND, "author not found"),
        }
    }
}
