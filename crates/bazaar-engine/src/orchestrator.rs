//! # Checkout Orchestrator
//!
//! Coordinates validation, reservation, pricing, and commit for checkout and
//! booking requests.
//!
//! ## Checkout Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  start_checkout                                                        │
//! │    validate ──► reserve each line (product-id order) ──► price ──►     │
//! │    apply promo code ──► persist pending order ──►                      │
//! │    CheckoutTicket(payment_deadline)                                    │
//! │         │                                                               │
//! │         └─ any reserve failure: release everything taken so far,       │
//! │            report the offending line (all-or-nothing, never retried)   │
//! │                                                                         │
//! │  confirm_payment(request_id, decision)                                 │
//! │    Approved ──► one transaction: order confirmed + holds committed +   │
//! │                 stock decremented + notification enqueued              │
//! │    Declined ──► full rollback, PaymentDeclined                         │
//! │                                                                         │
//! │  No lock is held while awaiting payment; the reservation ttl           │
//! │  substitutes for a lock.                                               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reserving in ascending product-id order gives every cart the same
//! acquisition order, so two carts sharing two products cannot deadlock by
//! each holding one and waiting on the other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::allocator::BookingAllocator;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::ledger::InventoryLedger;
use bazaar_core::{
    pricing, validation, Booking, Customer, Money, Order, OrderItem, OrderStatus, PricedLine,
    SlotRequest,
};
use bazaar_db::{
    Database, DbError, NewOrderItem, OrderCancelOutcome, OrderConfirmOutcome, OrderRefundOutcome,
};

// =============================================================================
// Request / Response Types
// =============================================================================

/// One line of a checkout request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutLine {
    pub product_id: String,
    pub quantity: i64,
}

/// A checkout request: who is buying what, delivered where.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub customer: Customer,
    pub lines: Vec<CheckoutLine>,
    pub delivery_zone: String,
    /// Optional promo code, matched case-insensitively.
    pub promo_code: Option<String>,
}

/// The result of a successful checkout start: a pending order whose stock is
/// held until the payment deadline.
#[derive(Debug, Clone)]
pub struct CheckoutTicket {
    pub order: Order,
    pub lines: Vec<PricedLine>,
    pub payment_deadline: DateTime<Utc>,
}

/// A booking request. `price_cents` is the quoted service price; service
/// price lookup belongs to the caller's catalog, not the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub customer: Customer,
    pub slot: SlotRequest,
    pub price_cents: i64,
}

/// The external payment collaborator's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentDecision {
    Approved,
    Declined,
}

/// What a confirmed payment committed.
#[derive(Debug, Clone)]
pub enum PaymentOutcome {
    OrderConfirmed(Order),
    BookingConfirmed(Booking),
}

// =============================================================================
// Orchestrator
// =============================================================================

/// The transaction engine's front door.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    db: Database,
    config: EngineConfig,
    ledger: InventoryLedger,
    allocator: BookingAllocator,
}

impl Orchestrator {
    /// Creates an orchestrator over a database handle.
    pub fn new(db: Database, config: EngineConfig) -> Self {
        let ttl = config.ttl_chrono();
        Orchestrator {
            ledger: InventoryLedger::new(db.clone(), ttl),
            allocator: BookingAllocator::new(db.clone(), ttl),
            db,
            config,
        }
    }

    /// The inventory ledger (for admin restock and availability queries).
    pub fn ledger(&self) -> &InventoryLedger {
        &self.ledger
    }

    /// The booking allocator (for slot availability queries).
    pub fn allocator(&self) -> &BookingAllocator {
        &self.allocator
    }

    // -------------------------------------------------------------------------
    // Checkout
    // -------------------------------------------------------------------------

    /// Starts a checkout: validates, reserves every line, prices the cart,
    /// and persists a pending order awaiting payment.
    ///
    /// All-or-nothing: any line failure releases every hold already taken
    /// for this request and reports the offending line. Validation runs
    /// first, so a rejected request never has side effects.
    pub async fn start_checkout(&self, request: &CheckoutRequest) -> EngineResult<CheckoutTicket> {
        validation::validate_email(&request.customer.email)?;

        // Merge duplicate product lines, then fix the acquisition order
        let mut lines: Vec<CheckoutLine> = Vec::new();
        for line in &request.lines {
            match lines.iter_mut().find(|l| l.product_id == line.product_id) {
                Some(existing) => existing.quantity += line.quantity,
                None => lines.push(line.clone()),
            }
        }
        lines.sort_by(|a, b| a.product_id.cmp(&b.product_id));

        validation::validate_cart_size(lines.len())?;
        for line in &lines {
            validation::validate_quantity(line.quantity)?;
        }

        let order_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let deadline = now + self.config.ttl_chrono();

        // Reserve line by line; unwind on the first failure
        let mut priced: Vec<PricedLine> = Vec::new();
        for line in &lines {
            let result = self.reserve_line(line, &order_id).await;
            match result {
                Ok(priced_line) => priced.push(priced_line),
                Err(err) => {
                    let released = self.ledger.release(&order_id).await?;
                    warn!(
                        order_id = %order_id,
                        released = released,
                        error = %err,
                        "Checkout failed, holds released"
                    );
                    return Err(err);
                }
            }
        }

        let delivery_fee = self.config.fee_schedule.resolve(&request.delivery_zone);
        let totals = pricing::price_cart(&priced, delivery_fee);

        // The promo is frozen into the order now; its use is counted only if
        // the payment commits.
        let promo = match self.resolve_promo(request.promo_code.as_deref(), &totals, now).await {
            Ok(promo) => promo,
            Err(err) => {
                let released = self.ledger.release(&order_id).await?;
                warn!(
                    order_id = %order_id,
                    released = released,
                    error = %err,
                    "Promo code rejected, holds released"
                );
                return Err(err);
            }
        };

        let items: Vec<NewOrderItem> = priced
            .iter()
            .map(|line| NewOrderItem {
                product_id: line.product_id.clone(),
                title_snapshot: line.title.clone(),
                sku_snapshot: line.sku.clone(),
                quantity: line.quantity,
                unit_price_cents: line.unit_price_cents,
                line_total_cents: line.line_total_cents,
            })
            .collect();

        let order = match self
            .persist_order(&order_id, request, &totals, promo, &items, now, deadline)
            .await
        {
            Ok(order) => order,
            Err(err) => {
                self.ledger.release(&order_id).await?;
                return Err(err);
            }
        };

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total_cents = order.total_cents,
            "Checkout started"
        );

        Ok(CheckoutTicket {
            order,
            lines: priced,
            payment_deadline: deadline,
        })
    }

    /// Loads, prices, and reserves a single cart line.
    async fn reserve_line(&self, line: &CheckoutLine, order_id: &str) -> EngineResult<PricedLine> {
        let product = self
            .db
            .products()
            .get_by_id(&line.product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| EngineError::ProductNotFound {
                id: line.product_id.clone(),
            })?;

        // Authoritative price, recomputed from the catalog row
        let priced_line = pricing::price_line(&product, line.quantity);

        self.ledger
            .reserve(&line.product_id, order_id, line.quantity)
            .await?;

        Ok(priced_line)
    }

    /// Resolves the request's promo code against the priced cart. Returns the
    /// promo id and the discount it grants, or `None` when no code was given.
    async fn resolve_promo(
        &self,
        code: Option<&str>,
        totals: &bazaar_core::CartTotals,
        now: DateTime<Utc>,
    ) -> EngineResult<Option<(String, Money)>> {
        let Some(code) = code else {
            return Ok(None);
        };

        let promo = self
            .db
            .promo_codes()
            .get_by_code(code)
            .await?
            .ok_or_else(|| EngineError::PromoCodeNotFound {
                code: code.to_string(),
            })?;

        let discount = pricing::apply_promo(&promo, totals.grand_total(), now).map_err(
            |reason| EngineError::PromoCodeRejected {
                code: promo.code.clone(),
                reason,
            },
        )?;

        Ok(Some((promo.id, discount)))
    }

    /// Inserts the pending order, retrying on order-number collisions.
    async fn persist_order(
        &self,
        order_id: &str,
        request: &CheckoutRequest,
        totals: &bazaar_core::CartTotals,
        promo: Option<(String, Money)>,
        items: &[NewOrderItem],
        now: DateTime<Utc>,
        deadline: DateTime<Utc>,
    ) -> EngineResult<Order> {
        const NUMBER_ATTEMPTS: u32 = 3;

        let promo_discount_cents = promo.as_ref().map_or(0, |(_, discount)| discount.cents());
        for attempt in 0..NUMBER_ATTEMPTS {
            let order_number = self.db.orders().next_order_number(now);
            let order = Order {
                id: order_id.to_string(),
                order_number,
                customer_id: request.customer.id.clone(),
                customer_email: request.customer.email.clone(),
                delivery_zone: request.delivery_zone.clone(),
                subtotal_cents: totals.subtotal_cents,
                discount_cents: totals.discount_total_cents,
                promo_code_id: promo.as_ref().map(|(id, _)| id.clone()),
                promo_discount_cents,
                delivery_fee_cents: totals.delivery_fee_cents,
                total_cents: totals.grand_total_cents - promo_discount_cents,
                status: OrderStatus::Pending,
                expires_at: deadline,
                created_at: now,
                updated_at: now,
                confirmed_at: None,
            };

            match self.db.orders().insert_with_items(&order, items).await {
                Ok(()) => return Ok(order),
                // Two checkouts drew the same random daily suffix
                Err(DbError::UniqueViolation { field, .. })
                    if field.contains("order_number") && attempt + 1 < NUMBER_ATTEMPTS =>
                {
                    continue;
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(EngineError::Inconsistency(format!(
            "order number generation exhausted retries for {order_id}"
        )))
    }

    // -------------------------------------------------------------------------
    // Booking
    // -------------------------------------------------------------------------

    /// Starts a booking: validates and holds the slot as a pending booking
    /// whose interval is held until the payment deadline.
    pub async fn start_booking(&self, request: &BookingRequest) -> EngineResult<Booking> {
        let booking = self
            .allocator
            .hold(&request.slot, &request.customer, request.price_cents)
            .await?;

        info!(
            booking_id = %booking.id,
            resource_id = %booking.resource_id,
            "Booking started"
        );
        Ok(booking)
    }

    // -------------------------------------------------------------------------
    // Payment Resolution
    // -------------------------------------------------------------------------

    /// Resolves a payment decision for a checkout or booking request.
    ///
    /// The request id is the order id or booking id returned at start.
    /// Idempotent on approval: re-confirming a committed request returns the
    /// committed entity without further side effects.
    pub async fn confirm_payment(
        &self,
        request_id: &str,
        decision: PaymentDecision,
    ) -> EngineResult<PaymentOutcome> {
        if self.db.orders().get_by_id(request_id).await?.is_some() {
            return self.resolve_order_payment(request_id, decision).await;
        }

        if self.db.bookings().get_by_id(request_id).await?.is_some() {
            return self.resolve_booking_payment(request_id, decision).await;
        }

        Err(EngineError::RequestNotFound {
            id: request_id.to_string(),
        })
    }

    async fn resolve_order_payment(
        &self,
        order_id: &str,
        decision: PaymentDecision,
    ) -> EngineResult<PaymentOutcome> {
        if decision == PaymentDecision::Declined {
            self.rollback_order(order_id).await?;
            return Err(EngineError::PaymentDeclined {
                request_id: order_id.to_string(),
            });
        }

        match self.db.orders().confirm_paid(order_id, Utc::now()).await? {
            OrderConfirmOutcome::Confirmed(order) => {
                info!(order_id = %order_id, "Payment committed");
                Ok(PaymentOutcome::OrderConfirmed(order))
            }
            OrderConfirmOutcome::AlreadyConfirmed(order) => {
                Ok(PaymentOutcome::OrderConfirmed(order))
            }
            OrderConfirmOutcome::Expired => {
                // Payment window elapsed; roll the draft back fully
                warn!(order_id = %order_id, "Payment window expired before commit");
                self.rollback_order(order_id).await?;
                Err(EngineError::ReservationExpired {
                    request_id: order_id.to_string(),
                })
            }
            OrderConfirmOutcome::InvalidState(status) => Err(EngineError::InvalidState {
                entity: "order",
                id: order_id.to_string(),
                status: format!("{status:?}").to_lowercase(),
                operation: "confirm payment",
            }),
            OrderConfirmOutcome::NotFound => Err(EngineError::RequestNotFound {
                id: order_id.to_string(),
            }),
        }
    }

    async fn resolve_booking_payment(
        &self,
        booking_id: &str,
        decision: PaymentDecision,
    ) -> EngineResult<PaymentOutcome> {
        if decision == PaymentDecision::Declined {
            self.allocator.release(booking_id).await?;
            return Err(EngineError::PaymentDeclined {
                request_id: booking_id.to_string(),
            });
        }

        let booking = self.allocator.confirm(booking_id).await?;
        Ok(PaymentOutcome::BookingConfirmed(booking))
    }

    /// Cancels a pending order and releases its holds. Idempotent.
    async fn rollback_order(&self, order_id: &str) -> EngineResult<()> {
        match self.db.orders().cancel(order_id).await? {
            OrderCancelOutcome::Cancelled | OrderCancelOutcome::AlreadyCancelled => Ok(()),
            OrderCancelOutcome::InvalidState(status) => Err(EngineError::InvalidState {
                entity: "order",
                id: order_id.to_string(),
                status: format!("{status:?}").to_lowercase(),
                operation: "cancel",
            }),
            OrderCancelOutcome::NotFound => Err(EngineError::RequestNotFound {
                id: order_id.to_string(),
            }),
        }
    }

    // -------------------------------------------------------------------------
    // Cancellation & Refund
    // -------------------------------------------------------------------------

    /// Cancels a pending checkout or booking request, releasing everything
    /// it holds. Idempotent; after it returns, no stock or slot side effects
    /// remain.
    pub async fn cancel(&self, request_id: &str) -> EngineResult<()> {
        if self.db.orders().get_by_id(request_id).await?.is_some() {
            return self.rollback_order(request_id).await;
        }

        if self.db.bookings().get_by_id(request_id).await?.is_some() {
            return self.allocator.release(request_id).await;
        }

        Err(EngineError::RequestNotFound {
            id: request_id.to_string(),
        })
    }

    /// Refunds a confirmed order, restoring the ordered quantities to stock.
    pub async fn refund(&self, order_id: &str) -> EngineResult<Order> {
        match self.db.orders().refund(order_id).await? {
            OrderRefundOutcome::Refunded(order) => {
                info!(order_id = %order_id, "Order refunded");
                Ok(order)
            }
            OrderRefundOutcome::InvalidState(status) => Err(EngineError::InvalidState {
                entity: "order",
                id: order_id.to_string(),
                status: format!("{status:?}").to_lowercase(),
                operation: "refund",
            }),
            OrderRefundOutcome::NotFound => Err(EngineError::RequestNotFound {
                id: order_id.to_string(),
            }),
        }
    }

    // -------------------------------------------------------------------------
    // Lookups
    // -------------------------------------------------------------------------

    /// Gets an order by id.
    pub async fn order(&self, order_id: &str) -> EngineResult<Order> {
        self.db
            .orders()
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| EngineError::RequestNotFound {
                id: order_id.to_string(),
            })
    }

    /// Gets an order by its business number (`ORD-...`).
    pub async fn order_by_number(&self, order_number: &str) -> EngineResult<Order> {
        self.db
            .orders()
            .get_by_number(order_number)
            .await?
            .ok_or_else(|| EngineError::RequestNotFound {
                id: order_number.to_string(),
            })
    }

    /// Gets an order's line items.
    pub async fn order_items(&self, order_id: &str) -> EngineResult<Vec<OrderItem>> {
        Ok(self.db.orders().items(order_id).await?)
    }

    /// Lists a customer's orders, newest first.
    pub async fn orders_for_customer(
        &self,
        customer_id: &str,
        limit: u32,
    ) -> EngineResult<Vec<Order>> {
        Ok(self.db.orders().list_for_customer(customer_id, limit).await?)
    }

    /// Gets a booking by id.
    pub async fn booking(&self, booking_id: &str) -> EngineResult<Booking> {
        self.db
            .bookings()
            .get_by_id(booking_id)
            .await?
            .ok_or_else(|| EngineError::RequestNotFound {
                id: booking_id.to_string(),
            })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::{DiscountKind, Product, PromoCode, Resource};
    use bazaar_db::DbConfig;
    use chrono::TimeZone;
    use std::time::Duration as StdDuration;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_product(db: &Database, id: &str, price_cents: i64, stock: i64) {
        let now = Utc::now();
        db.products()
            .insert(&Product {
                id: id.to_string(),
                sku: format!("SKU-{id}"),
                title: format!("Product {id}"),
                description: None,
                price_cents,
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

    async fn seed_resource(db: &Database, id: &str) {
        let now = Utc::now();
        db.resources()
            .insert(&Resource {
                id: id.to_string(),
                name: format!("Chair {id}"),
                capacity: 1,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
    }

    fn customer() -> Customer {
        Customer {
            id: "c1".to_string(),
            email: "jane@example.com".to_string(),
        }
    }

    fn checkout(lines: Vec<(&str, i64)>) -> CheckoutRequest {
        CheckoutRequest {
            customer: customer(),
            lines: lines
                .into_iter()
                .map(|(product_id, quantity)| CheckoutLine {
                    product_id: product_id.to_string(),
                    quantity,
                })
                .collect(),
            delivery_zone: "default".to_string(),
            promo_code: None,
        }
    }

    async fn seed_promo(db: &Database, id: &str, code: &str, kind: DiscountKind, value: i64) {
        let now = Utc::now();
        db.promo_codes()
            .insert(&PromoCode {
                id: id.to_string(),
                code: code.to_string(),
                description: None,
                discount_kind: kind,
                discount_value: value,
                min_order_cents: 0,
                max_discount_cents: None,
                usage_limit: None,
                usage_count: 0,
                valid_from: now - chrono::Duration::days(1),
                valid_until: now + chrono::Duration::days(1),
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
    }

    fn engine(db: Database) -> Orchestrator {
        Orchestrator::new(db, EngineConfig::new())
    }

    #[tokio::test]
    async fn test_checkout_to_committed_order() {
        let db = test_db().await;
        seed_product(&db, "p1", 10000, 5).await;
        let engine = engine(db.clone());

        let ticket = engine.start_checkout(&checkout(vec![("p1", 2)])).await.unwrap();
        assert_eq!(ticket.order.subtotal_cents, 20000);
        assert_eq!(ticket.order.delivery_fee_cents, 20000);
        assert_eq!(ticket.order.total_cents, 40000);
        assert!(ticket.order.order_number.starts_with("ORD-"));

        let outcome = engine
            .confirm_payment(&ticket.order.id, PaymentDecision::Approved)
            .await
            .unwrap();
        let PaymentOutcome::OrderConfirmed(order) = outcome else {
            panic!("expected order confirmation");
        };
        assert_eq!(order.status, OrderStatus::Confirmed);

        // Stock committed, notification enqueued
        let product = db.products().get_by_id("p1").await.unwrap().unwrap();
        assert_eq!(product.stock_count, 3);
        assert_eq!(db.outbox().pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_confirm_payment_is_idempotent() {
        let db = test_db().await;
        seed_product(&db, "p1", 10000, 5).await;
        let engine = engine(db.clone());

        let ticket = engine.start_checkout(&checkout(vec![("p1", 2)])).await.unwrap();
        engine
            .confirm_payment(&ticket.order.id, PaymentDecision::Approved)
            .await
            .unwrap();
        engine
            .confirm_payment(&ticket.order.id, PaymentDecision::Approved)
            .await
            .unwrap();

        let product = db.products().get_by_id("p1").await.unwrap().unwrap();
        assert_eq!(product.stock_count, 3);
        assert_eq!(db.outbox().pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_two_carts_race_for_stock_of_two() {
        let db = test_db().await;
        seed_product(&db, "p1", 10000, 2).await;
        let engine = engine(db.clone());

        let first = engine.start_checkout(&checkout(vec![("p1", 2)])).await.unwrap();

        let err = engine
            .start_checkout(&checkout(vec![("p1", 2)]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientStock {
                available: 0,
                requested: 2,
                ..
            }
        ));

        // Loser's cancel frees nothing extra; winner cancelling frees stock
        engine.cancel(&first.order.id).await.unwrap();
        engine.start_checkout(&checkout(vec![("p1", 2)])).await.unwrap();
    }

    #[tokio::test]
    async fn test_partial_failure_releases_everything() {
        let db = test_db().await;
        seed_product(&db, "a1", 10000, 5).await;
        seed_product(&db, "z9", 10000, 1).await;
        let engine = engine(db.clone());

        let err = engine
            .start_checkout(&checkout(vec![("a1", 2), ("z9", 3)]))
            .await
            .unwrap_err();
        match err {
            EngineError::InsufficientStock { sku, .. } => assert_eq!(sku, "SKU-z9"),
            other => panic!("expected InsufficientStock, got {other}"),
        }

        // The hold on a1 was unwound
        assert_eq!(
            db.products().availability("a1", Utc::now()).await.unwrap(),
            Some(5)
        );
    }

    #[tokio::test]
    async fn test_declined_payment_rolls_back() {
        let db = test_db().await;
        seed_product(&db, "p1", 10000, 5).await;
        let engine = engine(db.clone());

        let ticket = engine.start_checkout(&checkout(vec![("p1", 3)])).await.unwrap();
        let err = engine
            .confirm_payment(&ticket.order.id, PaymentDecision::Declined)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::PaymentDeclined { .. }));

        let order = engine.order(&ticket.order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(
            db.products().availability("p1", Utc::now()).await.unwrap(),
            Some(5)
        );
        assert_eq!(db.outbox().pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expired_window_frees_stock_for_next_request() {
        let db = test_db().await;
        seed_product(&db, "p1", 10000, 1).await;
        let engine = Orchestrator::new(
            db.clone(),
            EngineConfig::new().reservation_ttl(StdDuration::from_millis(10)),
        );

        let ticket = engine.start_checkout(&checkout(vec![("p1", 1)])).await.unwrap();
        tokio::time::sleep(StdDuration::from_millis(1100)).await;

        let err = engine
            .confirm_payment(&ticket.order.id, PaymentDecision::Approved)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ReservationExpired { .. }));

        // The expired draft is gone and the unit is sellable again
        let order = engine.order(&ticket.order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);

        let fresh = Orchestrator::new(db, EngineConfig::new());
        fresh.start_checkout(&checkout(vec![("p1", 1)])).await.unwrap();
    }

    #[tokio::test]
    async fn test_discounted_pricing_flows_to_order() {
        let db = test_db().await;
        let now = Utc::now();
        db.products()
            .insert(&Product {
                id: "p1".to_string(),
                sku: "SCRF-1".to_string(),
                title: "Wool Scarf".to_string(),
                description: None,
                price_cents: 10000,
                discount_kind: DiscountKind::Percentage,
                discount_value: 1000,
                stock_count: 5,
                is_active: true,
                version: 0,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        let engine = engine(db.clone());

        // $100.00 at 10% off is exactly $90.00
        let ticket = engine.start_checkout(&checkout(vec![("p1", 1)])).await.unwrap();
        assert_eq!(ticket.lines[0].unit_price_cents, 9000);
        assert_eq!(ticket.order.subtotal_cents, 10000);
        assert_eq!(ticket.order.discount_cents, 1000);
        assert_eq!(ticket.order.total_cents, 9000 + 20000);

        // The frozen item snapshot carries the discounted unit price
        let items = engine.order_items(&ticket.order.id).await.unwrap();
        assert_eq!(items[0].unit_price_cents, 9000);
    }

    #[tokio::test]
    async fn test_promo_code_freezes_discount_and_counts_use_on_commit() {
        let db = test_db().await;
        seed_product(&db, "p1", 10000, 5).await;
        seed_promo(&db, "pc1", "SAVE20", DiscountKind::Percentage, 2000).await;
        let engine = engine(db.clone());

        // Codes match case-insensitively; 20% off the $400.00 order total
        let mut request = checkout(vec![("p1", 2)]);
        request.promo_code = Some("save20".to_string());
        let ticket = engine.start_checkout(&request).await.unwrap();
        assert_eq!(ticket.order.promo_code_id.as_deref(), Some("pc1"));
        assert_eq!(ticket.order.promo_discount_cents, 8000);
        assert_eq!(ticket.order.total_cents, 32000);

        // A pending order has not consumed a use yet
        let promo = db.promo_codes().get_by_id("pc1").await.unwrap().unwrap();
        assert_eq!(promo.usage_count, 0);

        engine
            .confirm_payment(&ticket.order.id, PaymentDecision::Approved)
            .await
            .unwrap();
        let promo = db.promo_codes().get_by_id("pc1").await.unwrap().unwrap();
        assert_eq!(promo.usage_count, 1);
    }

    #[tokio::test]
    async fn test_unknown_promo_code_releases_holds() {
        let db = test_db().await;
        seed_product(&db, "p1", 10000, 5).await;
        let engine = engine(db.clone());

        let mut request = checkout(vec![("p1", 2)]);
        request.promo_code = Some("NOPE".to_string());
        let err = engine.start_checkout(&request).await.unwrap_err();
        assert!(matches!(err, EngineError::PromoCodeNotFound { .. }));

        assert_eq!(
            db.products().availability("p1", Utc::now()).await.unwrap(),
            Some(5)
        );
    }

    #[tokio::test]
    async fn test_ineligible_promo_code_names_the_reason() {
        let db = test_db().await;
        seed_product(&db, "p1", 10000, 5).await;
        let now = Utc::now();
        db.promo_codes()
            .insert(&PromoCode {
                id: "pc1".to_string(),
                code: "BIGSPEND".to_string(),
                description: None,
                discount_kind: DiscountKind::Fixed,
                discount_value: 500,
                min_order_cents: 1_000_000,
                max_discount_cents: None,
                usage_limit: None,
                usage_count: 0,
                valid_from: now - chrono::Duration::days(1),
                valid_until: now + chrono::Duration::days(1),
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        let engine = engine(db.clone());

        let mut request = checkout(vec![("p1", 1)]);
        request.promo_code = Some("BIGSPEND".to_string());
        let err = engine.start_checkout(&request).await.unwrap_err();
        match err {
            EngineError::PromoCodeRejected { code, reason } => {
                assert_eq!(code, "BIGSPEND");
                assert!(matches!(
                    reason,
                    bazaar_core::PromoRejection::BelowMinimum { .. }
                ));
            }
            other => panic!("expected PromoCodeRejected, got {other}"),
        }

        // The rejection unwound the inventory hold
        assert_eq!(
            db.products().availability("p1", Utc::now()).await.unwrap(),
            Some(5)
        );
    }

    #[tokio::test]
    async fn test_simultaneous_checkouts_for_last_stock_pick_one_winner() {
        let db = test_db().await;
        seed_product(&db, "p1", 10000, 2).await;
        let engine = engine(db.clone());

        let first = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.start_checkout(&checkout(vec![("p1", 2)])).await })
        };
        let second = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.start_checkout(&checkout(vec![("p1", 2)])).await })
        };

        let (first, second) = tokio::join!(first, second);
        let results = [first.unwrap(), second.unwrap()];

        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1, "exactly one checkout may take the last stock");
        let loser = results.iter().find(|r| r.is_err()).unwrap();
        assert!(matches!(
            loser.as_ref().unwrap_err(),
            EngineError::InsufficientStock { .. }
        ));

        // The winner holds everything; the loser left nothing behind
        assert_eq!(
            db.products().availability("p1", Utc::now()).await.unwrap(),
            Some(0)
        );
    }

    #[tokio::test]
    async fn test_simultaneous_overlapping_bookings_pick_one_winner() {
        let db = test_db().await;
        seed_resource(&db, "r1").await;
        let engine = engine(db.clone());

        let slot_a = SlotRequest {
            resource_id: "r1".to_string(),
            start_at: Utc.with_ymd_and_hms(2027, 3, 14, 10, 0, 0).unwrap(),
            end_at: Utc.with_ymd_and_hms(2027, 3, 14, 10, 30, 0).unwrap(),
        };
        let slot_b = SlotRequest {
            resource_id: "r1".to_string(),
            start_at: Utc.with_ymd_and_hms(2027, 3, 14, 10, 15, 0).unwrap(),
            end_at: Utc.with_ymd_and_hms(2027, 3, 14, 10, 45, 0).unwrap(),
        };

        let first = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .start_booking(&BookingRequest {
                        customer: customer(),
                        slot: slot_a,
                        price_cents: 5000,
                    })
                    .await
            })
        };
        let second = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .start_booking(&BookingRequest {
                        customer: customer(),
                        slot: slot_b,
                        price_cents: 5000,
                    })
                    .await
            })
        };

        let (first, second) = tokio::join!(first, second);
        let results = [first.unwrap(), second.unwrap()];

        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1, "overlapping holds must resolve to one winner");
        let loser = results.iter().find(|r| r.is_err()).unwrap();
        assert!(matches!(
            loser.as_ref().unwrap_err(),
            EngineError::SlotUnavailable { .. }
        ));
    }

    #[tokio::test]
    async fn test_orders_for_customer_scopes_to_customer() {
        let db = test_db().await;
        seed_product(&db, "p1", 1000, 10).await;
        let engine = engine(db.clone());

        let first = engine.start_checkout(&checkout(vec![("p1", 1)])).await.unwrap();
        let second = engine.start_checkout(&checkout(vec![("p1", 1)])).await.unwrap();

        let orders = engine.orders_for_customer("c1", 10).await.unwrap();
        assert_eq!(orders.len(), 2);
        assert!(orders.iter().any(|o| o.id == first.order.id));
        assert!(orders.iter().any(|o| o.id == second.order.id));

        assert!(engine.orders_for_customer("ghost", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_lines_merge() {
        let db = test_db().await;
        seed_product(&db, "p1", 1000, 10).await;
        let engine = engine(db.clone());

        let ticket = engine
            .start_checkout(&checkout(vec![("p1", 2), ("p1", 3)]))
            .await
            .unwrap();
        assert_eq!(ticket.lines.len(), 1);
        assert_eq!(ticket.lines[0].quantity, 5);
    }

    #[tokio::test]
    async fn test_validation_runs_before_reservation() {
        let db = test_db().await;
        seed_product(&db, "p1", 1000, 5).await;
        let engine = engine(db.clone());

        let mut request = checkout(vec![("p1", 0)]);
        assert!(matches!(
            engine.start_checkout(&request).await.unwrap_err(),
            EngineError::Validation(_)
        ));

        request = checkout(vec![]);
        assert!(matches!(
            engine.start_checkout(&request).await.unwrap_err(),
            EngineError::Validation(_)
        ));

        // No holds were placed by the rejected requests
        assert_eq!(
            db.products().availability("p1", Utc::now()).await.unwrap(),
            Some(5)
        );
    }

    #[tokio::test]
    async fn test_booking_payment_flow() {
        let db = test_db().await;
        seed_resource(&db, "r1").await;
        let engine = engine(db.clone());

        let slot = SlotRequest {
            resource_id: "r1".to_string(),
            start_at: Utc.with_ymd_and_hms(2027, 3, 14, 10, 0, 0).unwrap(),
            end_at: Utc.with_ymd_and_hms(2027, 3, 14, 10, 30, 0).unwrap(),
        };
        let booking = engine
            .start_booking(&BookingRequest {
                customer: customer(),
                slot: slot.clone(),
                price_cents: 5000,
            })
            .await
            .unwrap();

        // The race in spec form: [10:15, 10:45) against the held slot
        let racing = SlotRequest {
            resource_id: "r1".to_string(),
            start_at: Utc.with_ymd_and_hms(2027, 3, 14, 10, 15, 0).unwrap(),
            end_at: Utc.with_ymd_and_hms(2027, 3, 14, 10, 45, 0).unwrap(),
        };
        let err = engine
            .start_booking(&BookingRequest {
                customer: customer(),
                slot: racing,
                price_cents: 5000,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::SlotUnavailable { .. }));

        let outcome = engine
            .confirm_payment(&booking.id, PaymentDecision::Approved)
            .await
            .unwrap();
        assert!(matches!(outcome, PaymentOutcome::BookingConfirmed(_)));
        assert_eq!(db.outbox().pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_refund_restocks() {
        let db = test_db().await;
        seed_product(&db, "p1", 10000, 5).await;
        let engine = engine(db.clone());

        let ticket = engine.start_checkout(&checkout(vec![("p1", 2)])).await.unwrap();
        engine
            .confirm_payment(&ticket.order.id, PaymentDecision::Approved)
            .await
            .unwrap();

        let refunded = engine.refund(&ticket.order.id).await.unwrap();
        assert_eq!(refunded.status, OrderStatus::Refunded);

        let product = db.products().get_by_id("p1").await.unwrap().unwrap();
        assert_eq!(product.stock_count, 5);
    }

    #[tokio::test]
    async fn test_unknown_request() {
        let db = test_db().await;
        let engine = engine(db);

        assert!(matches!(
            engine
                .confirm_payment("nope", PaymentDecision::Approved)
                .await
                .unwrap_err(),
            EngineError::RequestNotFound { .. }
        ));
        assert!(matches!(
            engine.cancel("nope").await.unwrap_err(),
            EngineError::RequestNotFound { .. }
        ));
    }
}
