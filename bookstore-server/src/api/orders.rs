//! Order endpoints.
//!
//! # Endpoints
//!
//! - `POST /order`        – place an order and create its checkout invoice
//! - `GET  /orders`       – list orders, newest first
//! - `GET  /orders/{id}`  – one order with its line items

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bookstore_core::entities::{Order, OrderItem};
use bookstore_core::orders::{OrderLine, PlaceOrderError};
use bookstore_core::store::{Page, StoreError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error_response;
use crate::state::AppState;

/// Build the orders router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/order", post(place_order))
        .route("/orders", get(list_orders))
        .route("/orders/{id}", get(get_order))
}

/// Request body for `POST /order`.
#[derive(Debug, Deserialize)]
struct PlaceOrderBody {
    items: Vec<OrderLine>,
}

/// `POST /order` — place an order.
///
/// Validation, persistence and the provider call live in
/// [`bookstore_core::orders::OrderService`]; this handler only maps the
/// outcome onto the HTTP surface.
async fn place_order(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, OrderApiError> {
    let body: PlaceOrderBody =
        serde_json::from_slice(&body).map_err(|_| OrderApiError::InvalidBody)?;

    let placed = state.orders.place_order(&body.items).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "url": placed.checkout_url,
            "id": placed.order_id,
        })),
    ))
}

#[derive(Debug, Deserialize)]
struct OrderListParams {
    limit: Option<i64>,
    offset: Option<i64>,
}

/// `GET /orders` — list orders, newest first.
async fn list_orders(
    State(state): State<AppState>,
    uri: Uri,
) -> Result<impl IntoResponse, OrderApiError> {
    let Query(params) =
        Query::<OrderListParams>::try_from_uri(&uri).map_err(|_| OrderApiError::InvalidQuery)?;
    let orders = state
        .store
        .list_orders(Page::new(params.limit, params.offset))
        .await?;
    Ok(Json(orders))
}

/// Order detail: the order row plus its line items.
#[derive(Debug, Serialize)]
struct OrderDetail {
    #[serde(flatten)]
    order: Order,
    items: Vec<OrderItem>,
}

/// `GET /orders/{id}` — one order with its line items.
async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, OrderApiError> {
    let id = Uuid::parse_str(&id).map_err(|_| OrderApiError::NotFound)?;
    let order = state
        .store
        .order_by_id(id)
        .await?
        .ok_or(OrderApiError::NotFound)?;
    let items = state.store.items_for_order(id).await?;
    Ok(Json(OrderDetail { order, items }))
}

// ---------------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------------

/// Errors that can occur in order handlers.
#[derive(Debug)]
enum OrderApiError {
    /// Body failed to parse.
    InvalidBody,
    /// Unparseable query parameters.
    InvalidQuery,
    /// The requested order does not exist.
    NotFound,
    /// Placement failed.
    Place(PlaceOrderError),
    /// A database query failed.
    Database(StoreError),
}

impl From<PlaceOrderError> for OrderApiError {
    fn from(e: PlaceOrderError) -> Self {
        Self::Place(e)
    }
}

impl From<StoreError> for OrderApiError {
    fn from(e: StoreError) -> Self {
        Self::Database(e)
    }
}

impl IntoResponse for OrderApiError {
    fn into_response(self) -> Response {
        match self {
            OrderApiError::InvalidBody => {
                error_response(StatusCode::BAD_REQUEST, "invalid request body")
            }
            OrderApiError::InvalidQuery => {
                error_response(StatusCode::BAD_REQUEST, "invalid query params")
            }
            OrderApiError::NotFound => error_response(StatusCode::NOT_FOUND, "order not found"),
            OrderApiError::Place(e) => place_error_response(e),
            OrderApiError::Database(e) => {
                tracing::error!(error = %e, "order API database error");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        }
    }
}

/// Status mapping for placement failures; the body carries the error's
/// display form.
fn place_error_response(e: PlaceOrderError) -> Response {
    let status = match &e {
        PlaceOrderError::EmptyOrder
        | PlaceOrderError::InvalidQuantity { .. }
        | PlaceOrderError::InsufficientStock { .. } => StatusCode::BAD_REQUEST,
        PlaceOrderError::BookNotFound { .. } => StatusCode::NOT_FOUND,
        PlaceOrderError::Gateway(_) => StatusCode::BAD_GATEWAY,
        PlaceOrderError::Store(inner) => {
            tracing::error!(error = %inner, "order placement database error");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error");
        }
    };
    error_response(status, e.to_string())
}
