//! Payment-provider boundary.
//!
//! The order pipeline only ever talks to [`PaymentGateway`]; production
//! wires in [`MonoClient`], tests substitute a mock. [`PubkeyCache`] keeps
//! the provider's callback-signing key in memory between callbacks.

use std::sync::Arc;

use async_trait::async_trait;
use bookstore_mono::invoice::{CreatedInvoice, InvoiceRequest};
use bookstore_mono::{MonoClient, MonoError};
use tokio::sync::RwLock;
use tracing::info;

/// The two provider calls the shop depends on.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted checkout invoice. At most one attempt; a failure
    /// leaves the outcome to the caller.
    async fn create_invoice(&self, req: &InvoiceRequest) -> Result<CreatedInvoice, MonoError>;

    /// Fetch the current callback-signing key (base64 over a PEM SPKI).
    async fn fetch_pubkey(&self) -> Result<String, MonoError>;
}

#[async_trait]
impl PaymentGateway for MonoClient {
    async fn create_invoice(&self, req: &InvoiceRequest) -> Result<CreatedInvoice, MonoError> {
        MonoClient::create_invoice(self, req).await
    }

    async fn fetch_pubkey(&self) -> Result<String, MonoError> {
        self.merchant_pubkey().await
    }
}

/// Cached callback-signing key.
///
/// Fetched on the first callback and then served from memory indefinitely;
/// there is no proactive refresh. Key rotation goes through
/// [`invalidate`](Self::invalidate), which the server wires to SIGHUP.
/// Concurrent first fetches may race; the fetch is idempotent, so
/// last-write-wins is fine.
#[derive(Default)]
pub struct PubkeyCache {
    key: RwLock<Option<Arc<str>>>,
}

impl PubkeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached key, fetched from the gateway on a miss.
    pub async fn get_or_fetch(
        &self,
        gateway: &dyn PaymentGateway,
    ) -> Result<Arc<str>, MonoError> {
        {
            let slot = self.key.read().await;
            if let Some(key) = slot.as_ref() {
                return Ok(Arc::clone(key));
            }
        }

        let fetched: Arc<str> = gateway.fetch_pubkey().await?.into();
        info!("fetched callback-signing key from provider");
        let mut slot = self.key.write().await;
        *slot = Some(Arc::clone(&fetched));
        Ok(fetched)
    }

    /// Drop the cached key so the next callback re-fetches it.
    pub async fn invalidate(&self) {
        self.key.write().await.take();
    }
}
