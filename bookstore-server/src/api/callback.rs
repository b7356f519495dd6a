//! Monobank payment callback endpoint.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use bookstore_core::orders::CallbackError;
use bookstore_mono::webhook::X_SIGN_HEADER;

use super::error_response;
use crate::state::AppState;

/// Build the callback router.
pub fn router() -> Router<AppState> {
    Router::new().route("/monobank/callback", post(monobank_callback))
}

/// `POST /monobank/callback` — provider payment notification.
///
/// The `X-Sign` signature is verified over the raw body bytes exactly as
/// received; the payload is parsed only after the signature checks out.
async fn monobank_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, CallbackApiError> {
    let x_sign = headers
        .get(X_SIGN_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(CallbackApiError::MissingSignature)?;

    state.orders.handle_callback(x_sign, &body).await?;

    Ok(Json(serde_json::json!({ "status": "ok" })))
}

// ---------------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------------

/// Errors that can occur handling the payment callback.
#[derive(Debug)]
enum CallbackApiError {
    /// The `X-Sign` header is absent or not valid ASCII.
    MissingSignature,
    Callback(CallbackError),
}

impl From<CallbackError> for CallbackApiError {
    fn from(e: CallbackError) -> Self {
        Self::Callback(e)
    }
}

impl IntoResponse for CallbackApiError {
    fn into_response(self) -> Response {
        match self {
            CallbackApiError::MissingSignature => {
                error_response(StatusCode::BAD_REQUEST, "missing X-Sign header")
            }
            CallbackApiError::Callback(e) => callback_error_response(e),
        }
    }
}

/// Status mapping for callback rejections; the body carries the error's
/// display form.
fn callback_error_response(e: CallbackError) -> Response {
    let status = match &e {
        CallbackError::SignatureMismatch
        | CallbackError::MalformedPayload
        | CallbackError::InvoiceMismatch => StatusCode::BAD_REQUEST,
        CallbackError::OrderNotFound => StatusCode::NOT_FOUND,
        CallbackError::Pubkey(_) => StatusCode::BAD_GATEWAY,
        CallbackError::Store(inner) => {
            tracing::error!(error = %inner, "callback database error");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error");
        }
    };
    error_response(status, e.to_string())
}
