//! # Reservation Repository
//!
//! Database operations for the inventory ledger's ttl-bounded holds.
//!
//! ## The Reserve Race
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Two checkouts race for the last unit of WIDGET-330 (stock = 1):       │
//! │                                                                         │
//! │  Request A ──► INSERT ... SELECT ... WHERE availability >= 1  ──► 1 row │
//! │  Request B ──► INSERT ... SELECT ... WHERE availability >= 1  ──► 0 rows│
//! │                                                                         │
//! │  The availability check and the insert are ONE statement, so SQLite's  │
//! │  write serialization decides the winner. No read-check-write from Rust, │
//! │  no oversell.                                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Expired holds are handled lazily: every availability expression filters on
//! `expires_at > now`, so an expired hold stops counting the moment its ttl
//! elapses, whether or not the sweeper has flipped its row yet.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use bazaar_core::{Reservation, ReservationState};

/// Outcome of a reserve attempt.
///
/// Losing the race for stock is a domain outcome, not an error.
#[derive(Debug)]
pub enum ReserveOutcome {
    /// Hold taken; counts against availability until ttl or resolution.
    Reserved(Reservation),
    /// Not enough available stock. `available` is the quantity a retry with
    /// a smaller ask could still get (may be stale by the time it is read).
    InsufficientStock { available: i64 },
    /// Product missing or inactive.
    ProductNotFound,
}

/// Outcome of committing the holds of a request.
#[derive(Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// All holds flipped to committed and stock decremented. A retry after
    /// success also lands here, reporting the already-committed rows.
    Committed { reservations: u64 },
    /// At least one hold expired before commit; nothing was changed.
    Expired,
    /// The request has no held and no committed reservations.
    NothingHeld,
}

/// Repository for inventory reservation operations.
#[derive(Debug, Clone)]
pub struct ReservationRepository {
    pool: SqlitePool,
}

impl ReservationRepository {
    /// Creates a new ReservationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReservationRepository { pool }
    }

    /// Attempts to place a hold on `quantity` units of a product.
    ///
    /// Single guarded statement: the insert only happens if
    /// `stock_count - SUM(live holds) >= quantity` at execution time.
    ///
    /// ## Arguments
    /// * `product_id` - Product to hold stock of
    /// * `request_id` - Owning checkout request (order id)
    /// * `quantity` - Units to hold (> 0, validated upstream)
    /// * `expires_at` - Hold deadline (now + reservation ttl)
    pub async fn try_reserve(
        &self,
        product_id: &str,
        request_id: &str,
        quantity: i64,
        expires_at: DateTime<Utc>,
    ) -> DbResult<ReserveOutcome> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        debug!(
            product_id = %product_id,
            request_id = %request_id,
            quantity = quantity,
            "Attempting inventory reserve"
        );

        let result = sqlx::query(
            r#"
            INSERT INTO reservations (
                id, product_id, request_id, quantity,
                state, expires_at, created_at, updated_at
            )
            SELECT ?1, ?2, ?3, ?4, 'held', ?5, ?6, ?6
            WHERE EXISTS (
                SELECT 1 FROM products WHERE id = ?2 AND is_active = 1
            )
            AND (SELECT stock_count FROM products WHERE id = ?2)
                - (
                    SELECT COALESCE(SUM(quantity), 0)
                    FROM reservations
                    WHERE product_id = ?2
                      AND state = 'held'
                      AND expires_at > ?6
                  )
                >= ?4
            "#,
        )
        .bind(&id)
        .bind(product_id)
        .bind(request_id)
        .bind(quantity)
        .bind(expires_at.timestamp())
        .bind(now.timestamp())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            debug!(reservation_id = %id, "Reserve succeeded");
            return Ok(ReserveOutcome::Reserved(Reservation {
                id,
                product_id: product_id.to_string(),
                request_id: request_id.to_string(),
                quantity,
                state: ReservationState::Held,
                expires_at,
                created_at: now,
                updated_at: now,
            }));
        }

        // The guard failed. Distinguish "no such product" from "not enough
        // stock" with a follow-up read (advisory only, for the error report).
        let available: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT p.stock_count - COALESCE((
                SELECT SUM(r.quantity)
                FROM reservations r
                WHERE r.product_id = p.id
                  AND r.state = 'held'
                  AND r.expires_at > ?2
            ), 0)
            FROM products p
            WHERE p.id = ?1 AND p.is_active = 1
            "#,
        )
        .bind(product_id)
        .bind(now.timestamp())
        .fetch_optional(&self.pool)
        .await?;

        match available {
            Some(available) => {
                debug!(
                    product_id = %product_id,
                    available = available,
                    requested = quantity,
                    "Reserve lost to availability"
                );
                Ok(ReserveOutcome::InsufficientStock { available })
            }
            None => Ok(ReserveOutcome::ProductNotFound),
        }
    }

    /// Releases all held reservations of a request (rollback / cancel).
    ///
    /// Committed and already-released rows are untouched. Idempotent:
    /// releasing a request with no held rows affects zero rows and is fine.
    ///
    /// ## Returns
    /// Number of reservations released.
    pub async fn release_for_request(&self, request_id: &str) -> DbResult<u64> {
        debug!(request_id = %request_id, "Releasing held reservations");

        let result = sqlx::query(
            r#"
            UPDATE reservations
            SET state = 'released', updated_at = ?2
            WHERE request_id = ?1 AND state = 'held'
            "#,
        )
        .bind(request_id)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Commits all held reservations of a request in one transaction.
    ///
    /// On any expired hold the transaction rolls back untouched; the caller
    /// decides whether to release or retry.
    pub async fn commit_for_request(
        &self,
        request_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<CommitOutcome> {
        let mut tx = self.pool.begin().await?;

        let outcome = commit_held_on(&mut tx, request_id, now).await?;

        match outcome {
            CommitOutcome::Committed { .. } => tx.commit().await?,
            _ => tx.rollback().await?,
        }

        Ok(outcome)
    }

    /// Lists the reservations belonging to a request (any state).
    pub async fn get_for_request(&self, request_id: &str) -> DbResult<Vec<Reservation>> {
        let reservations = sqlx::query_as::<_, Reservation>(
            "SELECT * FROM reservations WHERE request_id = ?1 ORDER BY product_id",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reservations)
    }

    /// Total quantity in live (held, unexpired) reservations for a product.
    pub async fn active_held_quantity(
        &self,
        product_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<i64> {
        let quantity: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(quantity), 0)
            FROM reservations
            WHERE product_id = ?1 AND state = 'held' AND expires_at > ?2
            "#,
        )
        .bind(product_id)
        .bind(now.timestamp())
        .fetch_one(&self.pool)
        .await?;

        Ok(quantity)
    }

    /// Flips expired held reservations to released.
    ///
    /// Housekeeping only: availability queries already ignore expired holds,
    /// this just keeps the table from accumulating dead rows.
    ///
    /// ## Returns
    /// Number of reservations released.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE reservations
            SET state = 'released', updated_at = ?1
            WHERE state = 'held' AND expires_at <= ?1
            "#,
        )
        .bind(now.timestamp())
        .execute(&self.pool)
        .await?;

        let swept = result.rows_affected();
        if swept > 0 {
            debug!(count = swept, "Swept expired reservations");
        }

        Ok(swept)
    }
}

/// Commits the held reservations of a request on an open connection.
///
/// Shared by [`ReservationRepository::commit_for_request`] and the order
/// confirm transaction, which folds the reservation commit into the same
/// transaction that flips the order status and writes the outbox entry.
///
/// For each held row: flip to `committed` guarded by `expires_at > now`,
/// then decrement product stock guarded by `stock_count >= quantity`. A
/// failed stock guard means the availability accounting was violated; that
/// is surfaced as [`DbError::Inconsistent`] and never papered over.
pub(crate) async fn commit_held_on(
    conn: &mut SqliteConnection,
    request_id: &str,
    now: DateTime<Utc>,
) -> DbResult<CommitOutcome> {
    let held = sqlx::query_as::<_, Reservation>(
        "SELECT * FROM reservations WHERE request_id = ?1 AND state = 'held' ORDER BY product_id",
    )
    .bind(request_id)
    .fetch_all(&mut *conn)
    .await?;

    if held.is_empty() {
        // Idempotent retry: the holds may already be committed
        let committed: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM reservations WHERE request_id = ?1 AND state = 'committed'",
        )
        .bind(request_id)
        .fetch_one(&mut *conn)
        .await?;

        if committed > 0 {
            return Ok(CommitOutcome::Committed {
                reservations: committed as u64,
            });
        }
        return Ok(CommitOutcome::NothingHeld);
    }

    for reservation in &held {
        let flipped = sqlx::query(
            r#"
            UPDATE reservations
            SET state = 'committed', updated_at = ?2
            WHERE id = ?1 AND state = 'held' AND expires_at > ?2
            "#,
        )
        .bind(&reservation.id)
        .bind(now.timestamp())
        .execute(&mut *conn)
        .await?;

        if flipped.rows_affected() == 0 {
            debug!(
                reservation_id = %reservation.id,
                request_id = %request_id,
                "Hold expired before commit"
            );
            return Ok(CommitOutcome::Expired);
        }

        let decremented = sqlx::query(
            r#"
            UPDATE products
            SET stock_count = stock_count - ?2,
                version = version + 1,
                updated_at = ?3
            WHERE id = ?1 AND stock_count >= ?2
            "#,
        )
        .bind(&reservation.product_id)
        .bind(reservation.quantity)
        .bind(now.timestamp())
        .execute(&mut *conn)
        .await?;

        if decremented.rows_affected() == 0 {
            // A live hold always fits inside stock_count; if it doesn't, the
            // ledger accounting is broken and a human needs to look.
            error!(
                product_id = %reservation.product_id,
                reservation_id = %reservation.id,
                quantity = reservation.quantity,
                "Stock decrement guard failed for a held reservation"
            );
            return Err(DbError::Inconsistent(format!(
                "held reservation {} exceeds stock of product {}",
                reservation.id, reservation.product_id
            )));
        }
    }

    Ok(CommitOutcome::Committed {
        reservations: held.len() as u64,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use bazaar_core::{DiscountKind, Product};
    use chrono::Duration;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_product(db: &Database, id: &str, stock: i64) {
        let now = Utc::now();
        db.products()
            .insert(&Product {
                id: id.to_string(),
                sku: format!("SKU-{id}"),
                title: format!("Product {id}"),
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
    }

    fn ttl() -> DateTime<Utc> {
        Utc::now() + Duration::minutes(15)
    }

    #[tokio::test]
    async fn test_reserve_reduces_availability() {
        let db = test_db().await;
        seed_product(&db, "p1", 5).await;

        let outcome = db
            .reservations()
            .try_reserve("p1", "req-1", 3, ttl())
            .await
            .unwrap();
        assert!(matches!(outcome, ReserveOutcome::Reserved(_)));

        let available = db.products().availability("p1", Utc::now()).await.unwrap();
        assert_eq!(available, Some(2));
        // Committed stock untouched by a hold
        let product = db.products().get_by_id("p1").await.unwrap().unwrap();
        assert_eq!(product.stock_count, 5);
    }

    #[tokio::test]
    async fn test_reserve_insufficient_reports_available() {
        let db = test_db().await;
        seed_product(&db, "p1", 5).await;

        let repo = db.reservations();
        repo.try_reserve("p1", "req-1", 4, ttl()).await.unwrap();

        let outcome = repo.try_reserve("p1", "req-2", 2, ttl()).await.unwrap();
        match outcome {
            ReserveOutcome::InsufficientStock { available } => assert_eq!(available, 1),
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reserve_last_unit_single_winner() {
        let db = test_db().await;
        seed_product(&db, "p1", 1).await;

        let repo = db.reservations();
        let first = repo.try_reserve("p1", "req-1", 1, ttl()).await.unwrap();
        let second = repo.try_reserve("p1", "req-2", 1, ttl()).await.unwrap();

        assert!(matches!(first, ReserveOutcome::Reserved(_)));
        assert!(matches!(
            second,
            ReserveOutcome::InsufficientStock { available: 0 }
        ));
    }

    #[tokio::test]
    async fn test_reserve_unknown_product() {
        let db = test_db().await;

        let outcome = db
            .reservations()
            .try_reserve("missing", "req-1", 1, ttl())
            .await
            .unwrap();
        assert!(matches!(outcome, ReserveOutcome::ProductNotFound));
    }

    #[tokio::test]
    async fn test_expired_hold_ignored_by_availability() {
        let db = test_db().await;
        seed_product(&db, "p1", 1).await;

        let repo = db.reservations();
        // Hold that is already past its ttl
        let expired_at = Utc::now() - Duration::seconds(5);
        repo.try_reserve("p1", "req-1", 1, expired_at).await.unwrap();

        // The expired hold no longer counts, so a new reserve wins even
        // before any sweep has run
        let outcome = repo.try_reserve("p1", "req-2", 1, ttl()).await.unwrap();
        assert!(matches!(outcome, ReserveOutcome::Reserved(_)));
    }

    #[tokio::test]
    async fn test_release_restores_availability() {
        let db = test_db().await;
        seed_product(&db, "p1", 2).await;

        let repo = db.reservations();
        repo.try_reserve("p1", "req-1", 2, ttl()).await.unwrap();
        assert_eq!(
            db.products().availability("p1", Utc::now()).await.unwrap(),
            Some(0)
        );

        let released = repo.release_for_request("req-1").await.unwrap();
        assert_eq!(released, 1);
        assert_eq!(
            db.products().availability("p1", Utc::now()).await.unwrap(),
            Some(2)
        );

        // Idempotent
        assert_eq!(repo.release_for_request("req-1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_commit_decrements_stock() {
        let db = test_db().await;
        seed_product(&db, "p1", 5).await;

        let repo = db.reservations();
        repo.try_reserve("p1", "req-1", 3, ttl()).await.unwrap();

        let outcome = repo.commit_for_request("req-1", Utc::now()).await.unwrap();
        assert_eq!(outcome, CommitOutcome::Committed { reservations: 1 });

        let product = db.products().get_by_id("p1").await.unwrap().unwrap();
        assert_eq!(product.stock_count, 2);

        // Committed rows no longer count as holds
        assert_eq!(
            db.products().availability("p1", Utc::now()).await.unwrap(),
            Some(2)
        );
    }

    #[tokio::test]
    async fn test_commit_retry_is_idempotent() {
        let db = test_db().await;
        seed_product(&db, "p1", 5).await;

        let repo = db.reservations();
        repo.try_reserve("p1", "req-1", 3, ttl()).await.unwrap();
        repo.commit_for_request("req-1", Utc::now()).await.unwrap();

        // Retry after success reports the committed rows and does not
        // decrement stock a second time
        let outcome = repo.commit_for_request("req-1", Utc::now()).await.unwrap();
        assert_eq!(outcome, CommitOutcome::Committed { reservations: 1 });

        let product = db.products().get_by_id("p1").await.unwrap().unwrap();
        assert_eq!(product.stock_count, 2);
    }

    #[tokio::test]
    async fn test_commit_after_expiry_changes_nothing() {
        let db = test_db().await;
        seed_product(&db, "p1", 5).await;

        let repo = db.reservations();
        let expired_at = Utc::now() - Duration::seconds(5);
        repo.try_reserve("p1", "req-1", 3, expired_at).await.unwrap();

        let outcome = repo.commit_for_request("req-1", Utc::now()).await.unwrap();
        assert_eq!(outcome, CommitOutcome::Expired);

        let product = db.products().get_by_id("p1").await.unwrap().unwrap();
        assert_eq!(product.stock_count, 5);
    }

    #[tokio::test]
    async fn test_commit_nothing_held() {
        let db = test_db().await;

        let outcome = db
            .reservations()
            .commit_for_request("req-x", Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::NothingHeld);
    }

    #[tokio::test]
    async fn test_sweep_flips_expired_holds() {
        let db = test_db().await;
        seed_product(&db, "p1", 5).await;

        let repo = db.reservations();
        repo.try_reserve("p1", "req-1", 1, Utc::now() - Duration::seconds(5))
            .await
            .unwrap();
        repo.try_reserve("p1", "req-2", 1, ttl()).await.unwrap();

        let swept = repo.sweep_expired(Utc::now()).await.unwrap();
        assert_eq!(swept, 1);

        // The live hold survives
        assert_eq!(
            repo.active_held_quantity("p1", Utc::now()).await.unwrap(),
            1
        );
    }
}
