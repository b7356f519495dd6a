//! Application state shared across all request handlers.

use bookstore_core::cache::ListingCache;
use bookstore_core::orders::OrderService;
use bookstore_core::store::Store;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Data access backend.
    pub store: Arc<dyn Store>,
    /// Order placement and payment-callback pipeline.
    pub orders: Arc<OrderService>,
    /// Cached catalog listing responses.
    pub listings: Arc<ListingCache>,
}

impl AppState {
    /// Create a new AppState from its shared parts.
    pub fn new(
        store: Arc<dyn Store>,
        orders: Arc<OrderService>,
        listings: Arc<ListingCache>,
    ) -> Self {
        Self {
            store,
            orders,
            listings,
        }
    }
}
