//! Orphaned-order sweeper.
//!
//! An order without an invoice id means the provider call after placement
//! failed, or the process died in between. Stock was never decremented
//! for such orders; they need eyes, not automation. The sweeper
//! periodically lists them and logs each one for manual reconciliation.
//! It never mutates state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::store::{Store, StoreError};

pub struct OrphanSweeper {
    store: Arc<dyn Store>,
    interval: Duration,
    /// How old an invoice-less order must be before it counts as
    /// orphaned. Keeps in-flight placements out of the report.
    min_age: Duration,
    shutdown_rx: watch::Receiver<bool>,
}

impl OrphanSweeper {
    pub fn new(
        store: Arc<dyn Store>,
        interval: Duration,
        min_age: Duration,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            interval,
            min_age,
            shutdown_rx,
        }
    }

    /// Run until the shutdown signal flips.
    pub async fn run(mut self) {
        info!(
            interval_secs = self.interval.as_secs(),
            min_age_secs = self.min_age.as_secs(),
            "OrphanSweeper started"
        );

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("OrphanSweeper received shutdown signal");
                        break;
                    }
                }

                _ = tokio::time::sleep(self.interval) => {
                    if let Err(e) = self.sweep_once().await {
                        error!(error = %e, "orphan sweep failed");
                    }
                }
            }
        }

        info!("OrphanSweeper shutdown complete");
    }

    /// One sweep pass; returns how many orphans were reported.
    pub async fn sweep_once(&self) -> Result<usize, StoreError> {
        let orphans = self.store.orphaned_orders(self.min_age).await?;
        for order in &orphans {
            warn!(
                order_id = %order.id,
                created_at = %order.created_at,
                total = order.total_price,
                "order has no invoice; needs manual reconciliation"
            );
        }
        Ok(orphans.len())
    }
}
