//! Typed HTTP client for the Monobank merchant acquiring API.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use url::Url;

use crate::invoice::{CreatedInvoice, InvoiceRequest, PubkeyResponse};

/// Merchant token header expected by every acquiring endpoint.
pub const X_TOKEN_HEADER: &str = "X-Token";

/// Request timeout applied by [`MonoClient::new`].
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors produced by [`MonoClient`].
#[derive(Debug, thiserror::Error)]
pub enum MonoError {
    /// Transport-level failure (DNS, TLS, connection reset, timeout, …).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider returned a non-2xx status code.
    #[error("monobank error: status {status}, body: {body}")]
    Api { status: StatusCode, body: String },

    /// Response body could not be deserialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The base URL could not be joined with the endpoint path.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

/// Typed HTTP client for Monobank merchant acquiring.
///
/// Authenticates every call with the merchant `X-Token` key. Each request
/// is attempted exactly once; a failed invoice creation is surfaced to the
/// caller, never retried here.
#[derive(Debug, Clone)]
pub struct MonoClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl MonoClient {
    /// Create a new `MonoClient` with a [`REQUEST_TIMEOUT`]-bounded
    /// `reqwest` client.
    ///
    /// * `base_url` – acquiring API root (e.g. `https://api.monobank.ua`).
    /// * `token` – the merchant `X-Token` key.
    pub fn new(base_url: Url, token: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            base_url,
            token: token.into(),
        }
    }

    /// Replace the default `reqwest::Client` with a custom one (e.g. to
    /// configure timeouts or a proxy).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `POST /api/merchant/invoice/create` – create a hosted checkout
    /// invoice for an order.
    pub async fn create_invoice(
        &self,
        payload: &InvoiceRequest,
    ) -> Result<CreatedInvoice, MonoError> {
        let url = self.base_url.join("/api/merchant/invoice/create")?;

        let resp = self
            .http
            .post(url)
            .header(X_TOKEN_HEADER, &self.token)
            .json(payload)
            .send()
            .await?;

        parse_response(resp).await
    }

    /// `GET /api/merchant/pubkey` – fetch the base64 key Monobank signs
    /// callbacks with.
    pub async fn merchant_pubkey(&self) -> Result<String, MonoError> {
        let url = self.base_url.join("/api/merchant/pubkey")?;

        let resp = self
            .http
            .get(url)
            .header(X_TOKEN_HEADER, &self.token)
            .send()
            .await?;

        let body: PubkeyResponse = parse_response(resp).await?;
        Ok(body.key)
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, MonoError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(MonoError::Api { status, body });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(MonoError::Json)
}
