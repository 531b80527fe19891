//! # TTL Sweeper
//!
//! Background housekeeping for strictly-elapsed holds.
//!
//! ## What It Sweeps
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  reservations   held, expires_at <= now      → released                │
//! │  bookings       pending, expires_at <= now   → cancelled               │
//! │  orders         pending, expires_at <= now   → cancelled + holds freed │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Correctness never depends on the sweep cadence: every availability query
//! and every commit path re-checks expiry itself. The sweep only keeps the
//! tables from accumulating dead holds, and is safe to run concurrently with
//! live traffic because it touches nothing whose ttl has not strictly
//! elapsed.

use chrono::Utc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

use crate::error::EngineResult;
use bazaar_db::Database;

/// What a single sweep pass cleaned up.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub reservations_released: u64,
    pub bookings_cancelled: u64,
    pub orders_cancelled: u64,
}

impl SweepReport {
    /// Total rows touched.
    pub fn total(&self) -> u64 {
        self.reservations_released + self.bookings_cancelled + self.orders_cancelled
    }
}

/// The background ttl sweeper.
#[derive(Debug, Clone)]
pub struct Sweeper {
    db: Database,
}

impl Sweeper {
    /// Creates a sweeper over a database handle.
    pub fn new(db: Database) -> Self {
        Sweeper { db }
    }

    /// Runs one sweep pass. Exposed for tests and manual housekeeping.
    ///
    /// Orders sweep first so their holds are released under the order
    /// transaction; the reservation sweep then catches strays (e.g. holds
    /// whose checkout crashed before persisting an order).
    pub async fn run_once(&self) -> EngineResult<SweepReport> {
        let now = Utc::now();

        let orders_cancelled = self.db.orders().sweep_expired(now).await?;
        let bookings_cancelled = self.db.bookings().sweep_expired(now).await?;
        let reservations_released = self.db.reservations().sweep_expired(now).await?;

        let report = SweepReport {
            reservations_released,
            bookings_cancelled,
            orders_cancelled,
        };

        if report.total() > 0 {
            info!(
                reservations = report.reservations_released,
                bookings = report.bookings_cancelled,
                orders = report.orders_cancelled,
                "Sweep pass complete"
            );
        }

        Ok(report)
    }

    /// Runs sweep passes on an interval until the shutdown signal flips.
    ///
    /// A failed pass is logged and retried on the next tick; transient
    /// storage errors must not kill the loop.
    pub async fn run_loop(self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so startup isn't a sweep
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!(error = %e, "Sweep pass failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Sweeper shutting down");
                        return;
                    }
                }
            }
        }
    }

    /// Spawns the sweep loop, returning the shutdown handle.
    pub fn spawn(self, interval: Duration) -> (tokio::task::JoinHandle<()>, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(self.run_loop(interval, rx));
        (handle, tx)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::{Customer, DiscountKind, Product, Resource};
    use bazaar_db::DbConfig;
    use chrono::Duration as ChronoDuration;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed(db: &Database) {
        let now = Utc::now();
        db.products()
            .insert(&Product {
                id: "p1".to_string(),
                sku: "SKU-p1".to_string(),
                title: "Product p1".to_string(),
                description: None,
                price_cents: 1000,
                discount_kind: DiscountKind::None,
                discount_value: 0,
                stock_count: 10,
                is_active: true,
                version: 0,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        db.resources()
            .insert(&Resource {
                id: "r1".to_string(),
                name: "Chair".to_string(),
                capacity: 1,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_sweep_releases_only_elapsed_holds() {
        let db = test_db().await;
        seed(&db).await;

        let past = Utc::now() - ChronoDuration::seconds(5);
        let future = Utc::now() + ChronoDuration::minutes(15);

        db.reservations()
            .try_reserve("p1", "req-old", 2, past)
            .await
            .unwrap();
        db.reservations()
            .try_reserve("p1", "req-live", 2, future)
            .await
            .unwrap();

        let customer = Customer {
            id: "c1".to_string(),
            email: "c1@example.com".to_string(),
        };
        db.bookings()
            .try_hold("r1", &customer, past - ChronoDuration::hours(1), past, 5000, past)
            .await
            .unwrap();

        let report = Sweeper::new(db.clone()).run_once().await.unwrap();
        assert_eq!(report.reservations_released, 1);
        assert_eq!(report.bookings_cancelled, 1);
        assert_eq!(report.orders_cancelled, 0);

        // The live hold is untouched
        assert_eq!(
            db.reservations()
                .active_held_quantity("p1", Utc::now())
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_sweep_on_empty_database() {
        let db = test_db().await;

        let report = Sweeper::new(db).run_once().await.unwrap();
        assert_eq!(report, SweepReport::default());
    }
}
