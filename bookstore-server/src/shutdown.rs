//! Signal handling for graceful shutdown and cache invalidation.

use bookstore_core::cache::ListingCache;
use bookstore_core::gateway::PubkeyCache;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::Notify;

/// Creates a future that completes when a shutdown signal is received.
///
/// Listens for SIGTERM and SIGINT (Ctrl+C).
pub async fn shutdown_signal() {
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT, initiating graceful shutdown");
        }
    }
}

/// Spawns a task that listens for SIGHUP and flushes the in-process
/// caches: the listing responses and the cached provider signing key.
/// The next callback re-fetches the key from the provider.
///
/// Returns a Notify that can be used to signal when shutdown is complete.
pub fn spawn_cache_flush_handler(
    listings: Arc<ListingCache>,
    pubkey: Arc<PubkeyCache>,
) -> Arc<Notify> {
    let shutdown_notify = Arc::new(Notify::new());
    let shutdown_notify_clone = shutdown_notify.clone();

    tokio::spawn(async move {
        let mut sighup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");

        loop {
            tokio::select! {
                _ = sighup.recv() => {
                    tracing::info!("Received SIGHUP, flushing caches");
                    listings.clear().await;
                    pubkey.invalidate().await;
                }
                _ = shutdown_notify_clone.notified() => {
                    tracing::debug!("Cache flush handler shutting down");
                    break;
                }
            }
        }
    });

    shutdown_notify
}
