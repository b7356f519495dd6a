//! Payment-status callbacks posted by Monobank to the merchant webhook.

use serde::{Deserialize, Serialize};

/// Header carrying the base64 DER-encoded ECDSA signature of the raw
/// callback body.
pub const X_SIGN_HEADER: &str = "X-Sign";

/// Callback body for an invoice state change.
///
/// Only the fields the shop acts on are modeled; the provider sends more
/// and serde ignores them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackPayload {
    pub invoice_id: String,
    /// Provider-reported payment status (`created`, `processing`,
    /// `success`, `failure`, `expired`, …). Stored verbatim.
    pub status: String,
    /// Invoice amount in minor units.
    #[serde(default)]
    pub amount: Option<i64>,
    /// ISO 4217 numeric currency code.
    #[serde(default)]
    pub ccy: Option<i32>,
    /// Merchant reference passed at invoice creation (the order id).
    pub reference: String,
}
