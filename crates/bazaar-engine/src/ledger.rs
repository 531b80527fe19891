//! # Inventory Ledger
//!
//! The only component allowed to move stock. Holds are ttl-bounded; the
//! commit re-validates the ttl, so a crashed or abandoned checkout can never
//! pin inventory past its window.
//!
//! ## Hold Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   reserve ──► held ──────── commit ───────► committed (stock -= qty)   │
//! │                │                                                        │
//! │                ├─── release ───► released  (availability restored)     │
//! │                │                                                        │
//! │                └─── ttl elapses ───► ignored by every availability      │
//! │                      query immediately; swept to released later         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{Duration, Utc};
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use bazaar_core::{validation, Reservation};
use bazaar_db::{CommitOutcome, Database, ReserveOutcome};

/// Ttl-bounded inventory holds over the catalog store.
#[derive(Debug, Clone)]
pub struct InventoryLedger {
    db: Database,
    ttl: Duration,
}

impl InventoryLedger {
    /// Creates a ledger with the given hold ttl.
    pub fn new(db: Database, ttl: Duration) -> Self {
        InventoryLedger { db, ttl }
    }

    /// Places a hold on `quantity` units of a product for a request.
    ///
    /// ## Errors
    /// * `Validation` - non-positive or oversized quantity
    /// * `ProductNotFound` - missing or discontinued product
    /// * `InsufficientStock` - availability below the ask; names the sku
    pub async fn reserve(
        &self,
        product_id: &str,
        request_id: &str,
        quantity: i64,
    ) -> EngineResult<Reservation> {
        validation::validate_quantity(quantity)?;

        let expires_at = Utc::now() + self.ttl;
        let outcome = self
            .db
            .reservations()
            .try_reserve(product_id, request_id, quantity, expires_at)
            .await?;

        match outcome {
            ReserveOutcome::Reserved(reservation) => {
                debug!(
                    product_id = %product_id,
                    request_id = %request_id,
                    quantity = quantity,
                    "Inventory hold placed"
                );
                Ok(reservation)
            }
            ReserveOutcome::ProductNotFound => Err(EngineError::ProductNotFound {
                id: product_id.to_string(),
            }),
            ReserveOutcome::InsufficientStock { available } => {
                // Name the sku in the business outcome
                let sku = self
                    .db
                    .products()
                    .get_by_id(product_id)
                    .await?
                    .map(|p| p.sku)
                    .unwrap_or_else(|| product_id.to_string());

                Err(EngineError::InsufficientStock {
                    sku,
                    available,
                    requested: quantity,
                })
            }
        }
    }

    /// Commits every hold of a request, converting them to permanent stock
    /// decrements. Re-validates each hold's ttl at commit time. Idempotent:
    /// a retry after success reports the committed count again without
    /// touching stock.
    ///
    /// ## Errors
    /// * `ReservationExpired` - a hold's window elapsed; nothing was changed
    /// * `RequestNotFound` - the request has no reservations at all
    pub async fn commit(&self, request_id: &str) -> EngineResult<u64> {
        let outcome = self
            .db
            .reservations()
            .commit_for_request(request_id, Utc::now())
            .await?;

        match outcome {
            CommitOutcome::Committed { reservations } => {
                info!(request_id = %request_id, reservations = reservations, "Inventory committed");
                Ok(reservations)
            }
            CommitOutcome::Expired => Err(EngineError::ReservationExpired {
                request_id: request_id.to_string(),
            }),
            CommitOutcome::NothingHeld => Err(EngineError::RequestNotFound {
                id: request_id.to_string(),
            }),
        }
    }

    /// Releases every hold of a request. Idempotent; never fails on
    /// already-released or committed holds.
    ///
    /// ## Returns
    /// Number of holds released.
    pub async fn release(&self, request_id: &str) -> EngineResult<u64> {
        let released = self
            .db
            .reservations()
            .release_for_request(request_id)
            .await?;

        if released > 0 {
            debug!(request_id = %request_id, released = released, "Inventory holds released");
        }
        Ok(released)
    }

    /// Adds stock (goods received, manual adjustment).
    ///
    /// ## Errors
    /// * `Validation` - non-positive quantity
    /// * `ProductNotFound`
    pub async fn restock(&self, product_id: &str, quantity: i64) -> EngineResult<()> {
        validation::validate_quantity(quantity)?;

        self.db
            .products()
            .restock(product_id, quantity)
            .await
            .map_err(|e| match e {
                bazaar_db::DbError::NotFound { .. } => EngineError::ProductNotFound {
                    id: product_id.to_string(),
                },
                other => other.into(),
            })?;

        info!(product_id = %product_id, quantity = quantity, "Stock received");
        Ok(())
    }

    /// Current availability: committed stock minus live holds.
    pub async fn availability(&self, product_id: &str) -> EngineResult<i64> {
        self.db
            .products()
            .availability(product_id, Utc::now())
            .await?
            .ok_or_else(|| EngineError::ProductNotFound {
                id: product_id.to_string(),
            })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::{DiscountKind, Product};
    use bazaar_db::DbConfig;

    async fn ledger_with_stock(stock: i64) -> InventoryLedger {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();
        db.products()
            .insert(&Product {
                id: "p1".to_string(),
                sku: "WIDGET-330".to_string(),
                title: "Widget".to_string(),
                description: None,
                price_cents: 1099,
                discount_kind: DiscountKind::None,
                discount_value: 0,
                stock_count: stock,
                is_active: true,
                version: 0,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        InventoryLedger::new(db, Duration::minutes(15))
    }

    #[tokio::test]
    async fn test_reserve_commit_cycle() {
        let ledger = ledger_with_stock(5).await;

        ledger.reserve("p1", "req-1", 3).await.unwrap();
        assert_eq!(ledger.availability("p1").await.unwrap(), 2);

        let committed = ledger.commit("req-1").await.unwrap();
        assert_eq!(committed, 1);
        assert_eq!(ledger.availability("p1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_commit_retry_reports_same_count() {
        let ledger = ledger_with_stock(5).await;

        ledger.reserve("p1", "req-1", 3).await.unwrap();
        assert_eq!(ledger.commit("req-1").await.unwrap(), 1);
        assert_eq!(ledger.commit("req-1").await.unwrap(), 1);
        assert_eq!(ledger.availability("p1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_insufficient_stock_names_sku() {
        let ledger = ledger_with_stock(2).await;

        let err = ledger.reserve("p1", "req-1", 3).await.unwrap_err();
        match err {
            EngineError::InsufficientStock {
                sku,
                available,
                requested,
            } => {
                assert_eq!(sku, "WIDGET-330");
                assert_eq!(available, 2);
                assert_eq!(requested, 3);
            }
            other => panic!("expected InsufficientStock, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_quantity_rejected_before_side_effects() {
        let ledger = ledger_with_stock(5).await;

        assert!(matches!(
            ledger.reserve("p1", "req-1", 0).await.unwrap_err(),
            EngineError::Validation(_)
        ));
        assert_eq!(ledger.availability("p1").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_double_release_is_noop() {
        let ledger = ledger_with_stock(5).await;

        ledger.reserve("p1", "req-1", 2).await.unwrap();
        assert_eq!(ledger.release("req-1").await.unwrap(), 1);
        assert_eq!(ledger.release("req-1").await.unwrap(), 0);
        assert_eq!(ledger.availability("p1").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_commit_unknown_request() {
        let ledger = ledger_with_stock(5).await;

        assert!(matches!(
            ledger.commit("nope").await.unwrap_err(),
            EngineError::RequestNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_restock() {
        let ledger = ledger_with_stock(5).await;

        ledger.restock("p1", 10).await.unwrap();
        assert_eq!(ledger.availability("p1").await.unwrap(), 15);

        assert!(matches!(
            ledger.restock("missing", 1).await.unwrap_err(),
            EngineError::ProductNotFound { .. }
        ));
    }
}
