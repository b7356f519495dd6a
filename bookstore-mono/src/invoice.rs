//! Invoice objects for the Monobank merchant acquiring API.
//!
//! Field names follow the provider's wire format exactly
//! (`merchantPaymInfo`, `basketOrder`, `webHookUrl`, …).

use serde::{Deserialize, Serialize};

/// Unit label the checkout page renders next to each basket quantity.
pub const PIECE_UNIT: &str = "шт.";

/// Request payload for `POST /api/merchant/invoice/create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRequest {
    /// Invoice total in minor currency units (kopiykas).
    pub amount: i64,
    pub merchant_paym_info: MerchantPaymInfo,
    /// Where the provider posts signed payment-status callbacks.
    pub web_hook_url: String,
}

/// Merchant block of the invoice request: the order reference plus the
/// itemized basket shown on the hosted checkout page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantPaymInfo {
    /// Merchant-side order identifier, echoed back in callbacks.
    pub reference: String,
    pub basket_order: Vec<BasketLine>,
}

/// One basket row on the hosted checkout page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketLine {
    pub name: String,
    pub qty: i64,
    /// Line total in minor units (unit price × qty).
    pub sum: i64,
    pub unit: String,
}

impl BasketLine {
    /// Basket row counted in pieces, the only unit this shop sells in.
    pub fn piece(name: impl Into<String>, qty: i64, sum: i64) -> Self {
        Self {
            name: name.into(),
            qty,
            sum,
            unit: PIECE_UNIT.to_owned(),
        }
    }
}

/// Response of `POST /api/merchant/invoice/create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedInvoice {
    pub invoice_id: String,
    /// Hosted checkout URL the customer is redirected to.
    pub page_url: String,
}

/// Response of `GET /api/merchant/pubkey`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubkeyResponse {
    /// Base64 of a PEM-encoded SPKI public key.
    pub key: String,
}
