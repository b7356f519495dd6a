//! Response cache for catalog listings.
//!
//! Bodies are cached per request path+query. Invalidation is explicit:
//! every mutating catalog handler and every successful order placement
//! calls [`clear`](ListingCache::clear). The TTL is a backstop for
//! out-of-band writes (another instance, manual SQL).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

pub struct ListingCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedBody>>,
}

struct CachedBody {
    body: Arc<str>,
    stored_at: Instant,
}

impl ListingCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fresh cached body for `key`, if any.
    pub async fn get(&self, key: &str) -> Option<Arc<str>> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.stored_at.elapsed() > self.ttl {
            return None;
        }
        Some(Arc::clone(&entry.body))
    }

    pub async fn put(&self, key: String, body: Arc<str>) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key,
            CachedBody {
                body,
                stored_at: Instant::now(),
            },
        );
    }

    /// The invalidation hook: wipes every cached listing.
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        if !entries.is_empty() {
            debug!(entries = entries.len(), "listing cache cleared");
        }
        entries.clear();
    }
}
