//! # Order Repository
//!
//! Database operations for orders and their line items.
//!
//! ## The Payment Commit
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  confirm_paid runs ONE transaction:                                     │
//! │                                                                         │
//! │  orders         pending → confirmed      (guarded: expires_at > now)   │
//! │  reservations   held → committed         (guarded: expires_at > now)   │
//! │  products       stock_count -= quantity  (guarded: stock >= quantity)  │
//! │  promo_codes    usage_count += 1         (if the order used a code)    │
//! │  outbox         INSERT order_confirmed   (UNIQUE entity_id)            │
//! │                                                                         │
//! │  Any guard failure rolls the whole thing back, so a confirmed order    │
//! │  without committed stock, or without its notification event, cannot    │
//! │  exist.                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reservations are keyed by `request_id = order id`, which is what lets the
//! commit and rollback paths find their holds without a join table.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::outbox;
use crate::repository::promo;
use crate::repository::reservation::{commit_held_on, CommitOutcome};
use bazaar_core::{NotificationKind, Order, OrderItem, OrderStatus};

/// Input line item for order creation.
///
/// Snapshots come from the pricing engine's output, not from the cart, so
/// the frozen numbers are the authoritative recomputed ones.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: String,
    pub title_snapshot: String,
    pub sku_snapshot: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

/// Outcome of confirming payment on an order.
#[derive(Debug)]
pub enum OrderConfirmOutcome {
    /// Flipped to confirmed, stock committed, notification enqueued.
    Confirmed(Order),
    /// Was already confirmed (idempotent re-confirm).
    AlreadyConfirmed(Order),
    /// The payment window (and reservation ttl) elapsed.
    Expired,
    /// Order is cancelled or refunded; confirming is invalid.
    InvalidState(OrderStatus),
    /// No such order.
    NotFound,
}

/// Outcome of cancelling an order.
#[derive(Debug)]
pub enum OrderCancelOutcome {
    /// Flipped to cancelled; held reservations released.
    Cancelled,
    /// Was already cancelled (idempotent).
    AlreadyCancelled,
    /// Order is confirmed or refunded; cancellation goes through refund.
    InvalidState(OrderStatus),
    /// No such order.
    NotFound,
}

/// Outcome of refunding a confirmed order.
#[derive(Debug)]
pub enum OrderRefundOutcome {
    /// Flipped to refunded; item quantities restocked.
    Refunded(Order),
    /// Only confirmed orders can be refunded.
    InvalidState(OrderStatus),
    /// No such order.
    NotFound,
}

/// Repository for order operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Generates an order number for the given day.
    ///
    /// Format: `ORD-YYYYMMDD-XXXXX` with a random suffix, so the numbers do
    /// not leak daily order volume. The UNIQUE constraint on order_number
    /// backstops a suffix collision; the caller regenerates and retries.
    pub fn next_order_number(&self, now: DateTime<Utc>) -> String {
        let day = now.format("%Y%m%d");
        let suffix: String = Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(5)
            .collect::<String>()
            .to_uppercase();

        format!("ORD-{day}-{suffix}")
    }

    /// Inserts an order together with its line items, atomically.
    ///
    /// ## Errors
    /// * `DbError::UniqueViolation` - order_number collision (caller retries)
    pub async fn insert_with_items(&self, order: &Order, items: &[NewOrderItem]) -> DbResult<()> {
        debug!(
            order_id = %order.id,
            order_number = %order.order_number,
            items = items.len(),
            "Inserting order"
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, customer_id, customer_email, delivery_zone,
                subtotal_cents, discount_cents, promo_code_id,
                promo_discount_cents, delivery_fee_cents, total_cents,
                status, expires_at, created_at, updated_at, confirmed_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, NULL)
            "#,
        )
        .bind(&order.id)
        .bind(&order.order_number)
        .bind(&order.customer_id)
        .bind(&order.customer_email)
        .bind(&order.delivery_zone)
        .bind(order.subtotal_cents)
        .bind(order.discount_cents)
        .bind(&order.promo_code_id)
        .bind(order.promo_discount_cents)
        .bind(order.delivery_fee_cents)
        .bind(order.total_cents)
        .bind(order.status)
        .bind(order.expires_at.timestamp())
        .bind(order.created_at.timestamp())
        .bind(order.updated_at.timestamp())
        .execute(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_id, product_id, title_snapshot, sku_snapshot,
                    quantity, unit_price_cents, line_total_cents, created_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&order.id)
            .bind(&item.product_id)
            .bind(&item.title_snapshot)
            .bind(&item.sku_snapshot)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.line_total_cents)
            .bind(order.created_at.timestamp())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Gets an order by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    /// Gets an order by its business identifier (`ORD-...`).
    pub async fn get_by_number(&self, order_number: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE order_number = ?1")
            .bind(order_number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    /// Lists a customer's orders, newest first.
    pub async fn list_for_customer(&self, customer_id: &str, limit: u32) -> DbResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT * FROM orders
            WHERE customer_id = ?1
            ORDER BY created_at DESC
            LIMIT ?2
            "#,
        )
        .bind(customer_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// Gets the line items of an order.
    pub async fn items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT * FROM order_items WHERE order_id = ?1 ORDER BY sku_snapshot",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Confirms payment on a pending order: one transaction flips the order
    /// status, commits the inventory holds, decrements stock, and enqueues
    /// the confirmation notification.
    ///
    /// Idempotent: re-confirming a confirmed order returns
    /// [`OrderConfirmOutcome::AlreadyConfirmed`] without side effects.
    pub async fn confirm_paid(
        &self,
        order_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<OrderConfirmOutcome> {
        let mut tx = self.pool.begin().await?;

        let flipped = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'confirmed', confirmed_at = ?2, updated_at = ?2
            WHERE id = ?1 AND status = 'pending' AND expires_at > ?2
            "#,
        )
        .bind(order_id)
        .bind(now.timestamp())
        .execute(&mut *tx)
        .await?;

        if flipped.rows_affected() == 0 {
            tx.rollback().await?;

            let order = self.get_by_id(order_id).await?;
            return Ok(match order {
                None => OrderConfirmOutcome::NotFound,
                Some(o) => match o.status {
                    OrderStatus::Confirmed => OrderConfirmOutcome::AlreadyConfirmed(o),
                    OrderStatus::Pending => OrderConfirmOutcome::Expired,
                    status => OrderConfirmOutcome::InvalidState(status),
                },
            });
        }

        // Reservations are keyed by request_id = order id
        match commit_held_on(&mut tx, order_id, now).await? {
            CommitOutcome::Committed { .. } => {}
            CommitOutcome::Expired => {
                tx.rollback().await?;
                return Ok(OrderConfirmOutcome::Expired);
            }
            CommitOutcome::NothingHeld => {
                // A pending order inside its payment window always has its
                // holds; their absence means the ledger diverged.
                tx.rollback().await?;
                return Err(DbError::Inconsistent(format!(
                    "pending order {order_id} has no held reservations"
                )));
            }
        }

        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?1")
            .bind(order_id)
            .fetch_one(&mut *tx)
            .await?;

        // The promo use is counted only when the payment actually commits
        if let Some(promo_code_id) = &order.promo_code_id {
            promo::increment_usage_on(&mut tx, promo_code_id, now).await?;
        }

        let payload = serde_json::to_string(&order)
            .map_err(|e| DbError::Internal(format!("order payload serialization: {e}")))?;

        outbox::enqueue_on(
            &mut tx,
            NotificationKind::OrderConfirmed,
            &order.id,
            &order.customer_email,
            &payload,
            now,
        )
        .await?;

        tx.commit().await?;

        debug!(order_id = %order_id, "Order confirmed");
        Ok(OrderConfirmOutcome::Confirmed(order))
    }

    /// Cancels a pending order and releases its held reservations, atomically.
    pub async fn cancel(&self, order_id: &str) -> DbResult<OrderCancelOutcome> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let flipped = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'cancelled', updated_at = ?2
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(order_id)
        .bind(now.timestamp())
        .execute(&mut *tx)
        .await?;

        if flipped.rows_affected() == 0 {
            tx.rollback().await?;

            let order = self.get_by_id(order_id).await?;
            return Ok(match order {
                None => OrderCancelOutcome::NotFound,
                Some(o) => match o.status {
                    OrderStatus::Cancelled => OrderCancelOutcome::AlreadyCancelled,
                    status => OrderCancelOutcome::InvalidState(status),
                },
            });
        }

        sqlx::query(
            r#"
            UPDATE reservations
            SET state = 'released', updated_at = ?2
            WHERE request_id = ?1 AND state = 'held'
            "#,
        )
        .bind(order_id)
        .bind(now.timestamp())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(order_id = %order_id, "Order cancelled");
        Ok(OrderCancelOutcome::Cancelled)
    }

    /// Cancels pending orders whose payment window elapsed, releasing any
    /// held reservations they still own.
    ///
    /// Housekeeping only: confirm_paid re-checks the window itself.
    ///
    /// ## Returns
    /// Number of orders cancelled.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> DbResult<u64> {
        let mut tx = self.pool.begin().await?;

        let expired: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM orders WHERE status = 'pending' AND expires_at <= ?1",
        )
        .bind(now.timestamp())
        .fetch_all(&mut *tx)
        .await?;

        if expired.is_empty() {
            tx.rollback().await?;
            return Ok(0);
        }

        for order_id in &expired {
            sqlx::query(
                "UPDATE orders SET status = 'cancelled', updated_at = ?2 WHERE id = ?1",
            )
            .bind(order_id)
            .bind(now.timestamp())
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                UPDATE reservations
                SET state = 'released', updated_at = ?2
                WHERE request_id = ?1 AND state = 'held'
                "#,
            )
            .bind(order_id)
            .bind(now.timestamp())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(count = expired.len(), "Swept expired pending orders");
        Ok(expired.len() as u64)
    }

    /// Refunds a confirmed order and restocks its item quantities, atomically.
    pub async fn refund(&self, order_id: &str) -> DbResult<OrderRefundOutcome> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let flipped = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'refunded', updated_at = ?2
            WHERE id = ?1 AND status = 'confirmed'
            "#,
        )
        .bind(order_id)
        .bind(now.timestamp())
        .execute(&mut *tx)
        .await?;

        if flipped.rows_affected() == 0 {
            tx.rollback().await?;

            let order = self.get_by_id(order_id).await?;
            return Ok(match order {
                None => OrderRefundOutcome::NotFound,
                Some(o) => OrderRefundOutcome::InvalidState(o.status),
            });
        }

        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT * FROM order_items WHERE order_id = ?1",
        )
        .bind(order_id)
        .fetch_all(&mut *tx)
        .await?;

        for item in &items {
            sqlx::query(
                r#"
                UPDATE products
                SET stock_count = stock_count + ?2,
                    version = version + 1,
                    updated_at = ?3
                WHERE id = ?1
                "#,
            )
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(now.timestamp())
            .execute(&mut *tx)
            .await?;
        }

        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?1")
            .bind(order_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(order_id = %order_id, items = items.len(), "Order refunded");
        Ok(OrderRefundOutcome::Refunded(order))
    }
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

    fn sample_order(id: &str, number: &str, expires_at: DateTime<Utc>) -> Order {
        let now = Utc::now();
        Order {
            id: id.to_string(),
            order_number: number.to_string(),
            customer_id: "c1".to_string(),
            customer_email: "c1@example.com".to_string(),
            delivery_zone: "default".to_string(),
            subtotal_cents: 2198,
            discount_cents: 0,
            promo_code_id: None,
            promo_discount_cents: 0,
            delivery_fee_cents: 20000,
            total_cents: 22198,
            status: OrderStatus::Pending,
            expires_at,
            created_at: now,
            updated_at: now,
            confirmed_at: None,
        }
    }

    fn sample_item(product_id: &str, quantity: i64) -> NewOrderItem {
        NewOrderItem {
            product_id: product_id.to_string(),
            title_snapshot: format!("Product {product_id}"),
            sku_snapshot: format!("SKU-{product_id}"),
            quantity,
            unit_price_cents: 1099,
            line_total_cents: 1099 * quantity,
        }
    }

    /// Sets up the state start_checkout leaves behind: a pending order with
    /// its holds keyed by the order id.
    async fn checkout(db: &Database, order_id: &str, number: &str, quantity: i64) {
        let expires = Utc::now() + Duration::minutes(15);
        db.reservations()
            .try_reserve("p1", order_id, quantity, expires)
            .await
            .unwrap();
        db.orders()
            .insert_with_items(
                &sample_order(order_id, number, expires),
                &[sample_item("p1", quantity)],
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_insert_and_lookups() {
        let db = test_db().await;
        seed_product(&db, "p1", 10).await;
        checkout(&db, "o1", "ORD-20270314-00001", 2).await;

        let repo = db.orders();
        let by_id = repo.get_by_id("o1").await.unwrap().unwrap();
        assert_eq!(by_id.status, OrderStatus::Pending);

        let by_number = repo.get_by_number("ORD-20270314-00001").await.unwrap().unwrap();
        assert_eq!(by_number.id, "o1");

        let items = repo.items("o1").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].line_total_cents, 2198);

        let for_customer = repo.list_for_customer("c1", 10).await.unwrap();
        assert_eq!(for_customer.len(), 1);
    }

    #[tokio::test]
    async fn test_order_number_format() {
        let db = test_db().await;
        let repo = db.orders();
        let now = Utc::now();
        let day = now.format("%Y%m%d").to_string();

        let number = repo.next_order_number(now);
        let suffix = number.strip_prefix(&format!("ORD-{day}-")).unwrap();
        assert_eq!(suffix.len(), 5);
        assert!(suffix.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));

        // Random suffix: consecutive numbers do not form a sequence
        assert_ne!(number, repo.next_order_number(now));
    }

    #[tokio::test]
    async fn test_confirm_commits_stock_and_enqueues() {
        let db = test_db().await;
        seed_product(&db, "p1", 10).await;
        checkout(&db, "o1", "ORD-1", 2).await;

        let outcome = db.orders().confirm_paid("o1", Utc::now()).await.unwrap();
        let OrderConfirmOutcome::Confirmed(order) = outcome else {
            panic!("expected Confirmed");
        };
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert!(order.confirmed_at.is_some());

        let product = db.products().get_by_id("p1").await.unwrap().unwrap();
        assert_eq!(product.stock_count, 8);

        let pending = db.outbox().get_pending(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].entity_id, "o1");
        assert_eq!(pending[0].kind, NotificationKind::OrderConfirmed);
    }

    #[tokio::test]
    async fn test_confirm_counts_promo_use() {
        let db = test_db().await;
        seed_product(&db, "p1", 10).await;

        let now = Utc::now();
        db.promo_codes()
            .insert(&bazaar_core::PromoCode {
                id: "pc1".to_string(),
                code: "SAVE20".to_string(),
                description: None,
                discount_kind: DiscountKind::Percentage,
                discount_value: 2000,
                min_order_cents: 0,
                max_discount_cents: None,
                usage_limit: Some(10),
                usage_count: 0,
                valid_from: now - Duration::days(1),
                valid_until: now + Duration::days(30),
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        let expires = now + Duration::minutes(15);
        db.reservations()
            .try_reserve("p1", "o1", 1, expires)
            .await
            .unwrap();
        let mut order = sample_order("o1", "ORD-1", expires);
        order.promo_code_id = Some("pc1".to_string());
        order.promo_discount_cents = 4440;
        db.orders()
            .insert_with_items(&order, &[sample_item("p1", 1)])
            .await
            .unwrap();

        db.orders().confirm_paid("o1", Utc::now()).await.unwrap();
        let promo = db.promo_codes().get_by_id("pc1").await.unwrap().unwrap();
        assert_eq!(promo.usage_count, 1);

        // Idempotent re-confirm does not count a second use
        db.orders().confirm_paid("o1", Utc::now()).await.unwrap();
        let promo = db.promo_codes().get_by_id("pc1").await.unwrap().unwrap();
        assert_eq!(promo.usage_count, 1);
    }

    #[tokio::test]
    async fn test_confirm_is_idempotent() {
        let db = test_db().await;
        seed_product(&db, "p1", 10).await;
        checkout(&db, "o1", "ORD-1", 2).await;

        let repo = db.orders();
        repo.confirm_paid("o1", Utc::now()).await.unwrap();
        let second = repo.confirm_paid("o1", Utc::now()).await.unwrap();

        assert!(matches!(second, OrderConfirmOutcome::AlreadyConfirmed(_)));
        // No double decrement, no second event
        let product = db.products().get_by_id("p1").await.unwrap().unwrap();
        assert_eq!(product.stock_count, 8);
        assert_eq!(db.outbox().pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_confirm_expired_window() {
        let db = test_db().await;
        seed_product(&db, "p1", 10).await;

        let expired = Utc::now() - Duration::seconds(5);
        db.reservations()
            .try_reserve("p1", "o1", 2, expired)
            .await
            .unwrap();
        db.orders()
            .insert_with_items(&sample_order("o1", "ORD-1", expired), &[sample_item("p1", 2)])
            .await
            .unwrap();

        let outcome = db.orders().confirm_paid("o1", Utc::now()).await.unwrap();
        assert!(matches!(outcome, OrderConfirmOutcome::Expired));

        // Nothing changed
        let product = db.products().get_by_id("p1").await.unwrap().unwrap();
        assert_eq!(product.stock_count, 10);
        assert_eq!(db.outbox().pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_confirm_missing_order() {
        let db = test_db().await;

        let outcome = db.orders().confirm_paid("nope", Utc::now()).await.unwrap();
        assert!(matches!(outcome, OrderConfirmOutcome::NotFound));
    }

    #[tokio::test]
    async fn test_cancel_releases_holds() {
        let db = test_db().await;
        seed_product(&db, "p1", 10).await;
        checkout(&db, "o1", "ORD-1", 4).await;

        assert_eq!(
            db.products().availability("p1", Utc::now()).await.unwrap(),
            Some(6)
        );

        let outcome = db.orders().cancel("o1").await.unwrap();
        assert!(matches!(outcome, OrderCancelOutcome::Cancelled));
        assert_eq!(
            db.products().availability("p1", Utc::now()).await.unwrap(),
            Some(10)
        );

        // Idempotent
        let again = db.orders().cancel("o1").await.unwrap();
        assert!(matches!(again, OrderCancelOutcome::AlreadyCancelled));
    }

    #[tokio::test]
    async fn test_cancel_confirmed_is_invalid() {
        let db = test_db().await;
        seed_product(&db, "p1", 10).await;
        checkout(&db, "o1", "ORD-1", 1).await;

        db.orders().confirm_paid("o1", Utc::now()).await.unwrap();
        let outcome = db.orders().cancel("o1").await.unwrap();
        assert!(matches!(
            outcome,
            OrderCancelOutcome::InvalidState(OrderStatus::Confirmed)
        ));
    }

    #[tokio::test]
    async fn test_refund_restocks() {
        let db = test_db().await;
        seed_product(&db, "p1", 10).await;
        checkout(&db, "o1", "ORD-1", 3).await;

        db.orders().confirm_paid("o1", Utc::now()).await.unwrap();
        let product = db.products().get_by_id("p1").await.unwrap().unwrap();
        assert_eq!(product.stock_count, 7);

        let outcome = db.orders().refund("o1").await.unwrap();
        let OrderRefundOutcome::Refunded(order) = outcome else {
            panic!("expected Refunded");
        };
        assert_eq!(order.status, OrderStatus::Refunded);

        let product = db.products().get_by_id("p1").await.unwrap().unwrap();
        assert_eq!(product.stock_count, 10);

        // Refunding twice is invalid
        let again = db.orders().refund("o1").await.unwrap();
        assert!(matches!(
            again,
            OrderRefundOutcome::InvalidState(OrderStatus::Refunded)
        ));
    }

    #[tokio::test]
    async fn test_refund_pending_is_invalid() {
        let db = test_db().await;
        seed_product(&db, "p1", 10).await;
        checkout(&db, "o1", "ORD-1", 1).await;

        let outcome = db.orders().refund("o1").await.unwrap();
        assert!(matches!(
            outcome,
            OrderRefundOutcome::InvalidState(OrderStatus::Pending)
        ));
    }
}
