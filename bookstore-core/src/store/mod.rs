//! Data access boundary.
//!
//! [`Store`] is the seam between the HTTP layer / order pipeline and the
//! database. It ships with two implementations: [`PgStore`] over a `sqlx`
//! Postgres pool, and [`MemoryStore`] for tests and local development.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use std::time::Duration;

use async_trait::async_trait;
use time::Date;
use uuid::Uuid;

use crate::entities::{Author, Book, Order, OrderItem};

/// Errors surfaced by [`Store`] implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A conditional stock decrement matched no row: the book is gone or
    /// its quantity dropped below the requested amount since validation.
    #[error("insufficient stock for book {book_id}: {available} available")]
    StockConflict { book_id: i64, available: i64 },
}

/// Input for creating a book. The author is referenced by name and
/// upserted together with the insert.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub genre: String,
    pub publication_date: Date,
    pub price: i64,
    pub quantity: i64,
}

/// Partial update of a book; `None` fields keep their current value.
/// A new author name is upserted the same way as on create.
#[derive(Debug, Clone, Default)]
pub struct BookPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub genre: Option<String>,
    pub publication_date: Option<Date>,
    pub price: Option<i64>,
    pub quantity: Option<i64>,
}

/// Case-insensitive substring filters over the catalog.
#[derive(Debug, Clone, Default)]
pub struct BookFilter {
    pub title: Option<String>,
    pub author: Option<String>,
    pub genre: Option<String>,
    pub page: Page,
}

impl BookFilter {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.author.is_none() && self.genre.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuthorFilter {
    pub name: Option<String>,
    pub page: Page,
}

/// Limit/offset pagination window with a hard cap.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 200;

    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
            offset: offset.unwrap_or(0).max(0),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One validated order line ready for insertion, unit price already
/// snapshotted from the catalog.
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub book_id: i64,
    pub quantity: i64,
    pub unit_price: i64,
}

/// A stock decrement to apply when an invoice is committed.
#[derive(Debug, Clone, Copy)]
pub struct StockDecrement {
    pub book_id: i64,
    pub quantity: i64,
}

/// Data access shared by the catalog API and the order pipeline.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert the author or return the existing row with that name.
    async fn upsert_author(&self, name: &str) -> Result<Author, StoreError>;

    async fn author_by_id(&self, id: i64) -> Result<Option<Author>, StoreError>;

    /// Authors matching the filter, ordered by id.
    async fn list_authors(&self, filter: &AuthorFilter) -> Result<Vec<Author>, StoreError>;

    async fn create_book(&self, new: &NewBook) -> Result<Book, StoreError>;

    async fn book_by_id(&self, id: i64) -> Result<Option<Book>, StoreError>;

    /// Apply a partial update; `None` when the book does not exist.
    async fn update_book(&self, id: i64, patch: &BookPatch) -> Result<Option<Book>, StoreError>;

    /// `true` when a row was deleted. Order items referencing the book go
    /// with it (cascade).
    async fn delete_book(&self, id: i64) -> Result<bool, StoreError>;

    /// Books matching the filter, ordered by id.
    async fn list_books(&self, filter: &BookFilter) -> Result<Vec<Book>, StoreError>;

    /// Create the order and all its lines in one transaction. The total
    /// is computed here from the line snapshots, never accepted from
    /// outside. `lines` must be non-empty.
    async fn insert_order(&self, lines: &[NewOrderLine]) -> Result<Order, StoreError>;

    async fn order_by_id(&self, id: Uuid) -> Result<Option<Order>, StoreError>;

    /// Orders newest first.
    async fn list_orders(&self, page: Page) -> Result<Vec<Order>, StoreError>;

    async fn items_for_order(&self, id: Uuid) -> Result<Vec<OrderItem>, StoreError>;

    /// Attach the invoice id and apply every stock decrement in one
    /// transaction. Each decrement runs as a conditional update
    /// (`quantity >= n`); the first one that matches no row rolls the
    /// whole transaction back and reports [`StoreError::StockConflict`]
    /// with the current availability.
    async fn commit_invoice(
        &self,
        order_id: Uuid,
        invoice_id: &str,
        decrements: &[StockDecrement],
    ) -> Result<(), StoreError>;

    /// Overwrite the order status verbatim; `false` when the order does
    /// not exist.
    async fn update_order_status(&self, order_id: Uuid, status: &str) -> Result<bool, StoreError>;

    /// Orders at least `min_age` old that never received an invoice id,
    /// oldest first.
    async fn orphaned_orders(&self, min_age: Duration) -> Result<Vec<Order>, StoreError>;
}
