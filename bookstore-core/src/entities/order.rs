use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A placed order.
///
/// Mutated exactly twice after creation: once to attach the provider
/// invoice id (same transaction as the stock decrements) and once per
/// payment callback to overwrite `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Order total in minor units, computed from the line snapshots.
    pub total_price: i64,
    /// Provider invoice id; `None` until invoice creation succeeded.
    /// An old order still `None` is an orphan.
    pub invoice_id: Option<String>,
    /// Provider-reported payment status, stored verbatim.
    pub status: String,
}

/// One line of an order.
///
/// `unit_price` is the catalog price captured at placement, so historical
/// orders are immune to later price edits. Lines are never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: Uuid,
    pub book_id: i64,
    pub quantity: i64,
    pub unit_price: i64,
}
