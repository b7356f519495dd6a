use serde::{Deserialize, Serialize};
use time::Date;

/// Catalog read model: a book row joined with its author's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author_id: i64,
    /// Author display name, denormalized into every read.
    pub author: String,
    pub genre: String,
    pub publication_date: Date,
    /// Unit price in minor currency units (kopiykas).
    pub price: i64,
    /// Copies on hand. Only the conditional decrement at invoice commit
    /// time may lower this below a requested amount.
    pub quantity: i64,
}
