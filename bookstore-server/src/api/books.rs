//! Book catalog endpoints.
//!
//! # Endpoints
//!
//! - `GET    /books`      – list books, with optional substring filters
//! - `POST   /books`      – add a book (author upserted by name)
//! - `GET    /books/{id}` – fetch one book
//! - `PUT    /books/{id}` – partial update
//! - `DELETE /books/{id}` – delete a book

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
};
use bookstore_core::store::{BookFilter, BookPatch, NewBook, Page, StoreError};
use serde::Deserialize;
use time::{Date, OffsetDateTime};

use super::{cache_key, error_response, msg_response, raw_json};
use crate::state::AppState;

/// Build the books router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/books", get(list_books).post(create_book))
        .route(
            "/books/{id}",
            get(get_book).put(update_book).delete(delete_book),
        )
}

/// Accepted query parameters for `GET /books`. Anything else is a 400.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BookListParams {
    title: Option<String>,
    author: Option<String>,
    genre: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl BookListParams {
    /// Empty-valued parameters (`?title=`) do not filter.
    fn into_filter(self) -> BookFilter {
        BookFilter {
            title: self.title.filter(|s| !s.is_empty()),
            author: self.author.filter(|s| !s.is_empty()),
            genre: self.genre.filter(|s| !s.is_empty()),
            page: Page::new(self.limit, self.offset),
        }
    }
}

/// `GET /books` — list the catalog.
///
/// Filters are case-insensitive substrings over title, author name and
/// genre. Successful listings are cached under the full request URI;
/// every catalog mutation clears the cache.
async fn list_books(State(state): State<AppState>, uri: Uri) -> Result<Response, BookApiError> {
    let Query(params) =
        Query::<BookListParams>::try_from_uri(&uri).map_err(|_| BookApiError::InvalidQuery)?;

    let key = cache_key(&uri);
    if let Some(body) = state.listings.get(&key).await {
        return Ok(raw_json(&body));
    }

    let filter = params.into_filter();
    let filtered = !filter.is_empty();
    let books = state.store.list_books(&filter).await?;

    if books.is_empty() {
        if filtered {
            return Ok(msg_response(
                StatusCode::NOT_FOUND,
                "no books found by filters",
            ));
        }
        return Ok(msg_response(StatusCode::OK, "no books yet"));
    }

    let body = serde_json::to_string(&books).map_err(BookApiError::Serialize)?;
    state.listings.put(key, body.as_str().into()).await;
    Ok(raw_json(&body))
}

/// Request body for `POST /books`.
#[derive(Debug, Deserialize)]
struct CreateBookBody {
    title: String,
    author: String,
    genre: String,
    price: i64,
    #[serde(default)]
    quantity: i64,
    publication_date: Option<Date>,
}

/// `POST /books` — add a book, upserting its author by name.
///
/// `publication_date` defaults to today, `quantity` to zero.
async fn create_book(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, BookApiError> {
    let body: CreateBookBody =
        serde_json::from_slice(&body).map_err(|_| BookApiError::InvalidBody)?;
    if body.title.is_empty() || body.author.is_empty() || body.genre.is_empty() {
        return Err(BookApiError::InvalidBody);
    }
    if body.price < 0 || body.quantity < 0 {
        return Err(BookApiError::InvalidBody);
    }

    let new = NewBook {
        title: body.title,
        author: body.author,
        genre: body.genre,
        publication_date: body
            .publication_date
            .unwrap_or_else(|| OffsetDateTime::now_utc().date()),
        price: body.price,
        quantity: body.quantity,
    };
    let book = state.store.create_book(&new).await?;
    state.listings.clear().await;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": book.id,
            "msg": "book added successfully",
        })),
    ))
}

/// `GET /books/{id}` — fetch one book.
async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, BookApiError> {
    let id = parse_id(&id)?;
    let book = state
        .store
        .book_by_id(id)
        .await?
        .ok_or(BookApiError::NotFound)?;
    Ok(Json(book))
}

/// Request body for `PUT /books/{id}`; absent fields keep their value.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateBookBody {
    title: Option<String>,
    author: Option<String>,
    genre: Option<String>,
    publication_date: Option<Date>,
    price: Option<i64>,
    quantity: Option<i64>,
}

/// `PUT /books/{id}` — partial update.
///
/// Unknown body fields are rejected. A new author name is upserted the
/// same way as on create.
async fn update_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, BookApiError> {
    let id = parse_id(&id)?;
    let value: serde_json::Value =
        serde_json::from_slice(&body).map_err(|_| BookApiError::InvalidBody)?;
    let body: UpdateBookBody =
        serde_json::from_value(value).map_err(|_| BookApiError::InvalidQuery)?;

    if body.title.as_deref() == Some("")
        || body.author.as_deref() == Some("")
        || body.genre.as_deref() == Some("")
    {
        return Err(BookApiError::InvalidBody);
    }
    if body.price.is_some_and(|p| p < 0) || body.quantity.is_some_and(|q| q < 0) {
        return Err(BookApiError::InvalidBody);
    }

    let patch = BookPatch {
        title: body.title,
        author: body.author,
        genre: body.genre,
        publication_date: body.publication_date,
        price: body.price,
        quantity: body.quantity,
    };
    state
        .store
        .update_book(id, &patch)
        .await?
        .ok_or(BookApiError::NotFound)?;
    state.listings.clear().await;

    Ok(msg_response(StatusCode::OK, "book updated successfully"))
}

/// `DELETE /books/{id}` — delete a book and its order lines.
async fn delete_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, BookApiError> {
    let id = parse_id(&id)?;
    if !state.store.delete_book(id).await? {
        return Err(BookApiError::NotFound);
    }
    state.listings.clear().await;
    Ok(msg_response(StatusCode::OK, "book deleted successfully"))
}

/// Non-numeric ids map to the not-found response.
fn parse_id(raw: &str) -> Result<i64, BookApiError> {
    raw.parse().map_err(|_| BookApiError::NotFound)
}

// ---------------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------------

/// Errors that can occur in book handlers.
#[derive(Debug)]
enum BookApiError {
    /// A database query failed.
    Database(StoreError),
    /// Listing serialization failed.
    Serialize(serde_json::Error),
    /// Unknown or unparseable query parameters, or unknown PUT fields.
    InvalidQuery,
    /// Body failed to parse or carried invalid values.
    InvalidBody,
    /// The requested book does not exist.
    NotFound,
}

impl From<StoreError> for BookApiError {
    fn from(e: StoreError) -> Self {
        Self::Database(e)
    }
}

impl IntoResponse for BookApiError {
    fn into_response(self) -> Response {
        match self {
            BookApiError::Database(e) => {
                tracing::error!(error = %e, "book API database error");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
            BookApiError::Serialize(e) => {
                tracing::error!(error = %e, "book API serialization error");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
            BookApiError::InvalidQuery => {
                error_response(StatusCode::BAD_REQUEST, "invalid query params")
            }
            BookApiError::InvalidBody => {
                error_response(StatusCode::BAD_REQUEST, "invalid request body")
            }
            BookApiError::NotFound => error_response(StatusCode::NOT_FOUND, "book not found"),
        }
    }
}
