//! # Domain Types
//!
//! Core domain types for the Bazaar commerce engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │   Reservation   │   │     Order       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  sku (business) │   │  product_id     │   │  order_number   │       │
//! │  │  price_cents    │   │  state + ttl    │   │  status, totals │       │
//! │  │  stock_count    │   └─────────────────┘   └─────────────────┘       │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Resource     │   │    Booking      │   │ OutboxEntry     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  capacity       │   │  [start, end)   │   │  kind, payload  │       │
//! │  └─────────────────┘   │  status + ttl   │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Entities have an immutable UUID v4 `id` used for relations, and orders
//! additionally carry a human-readable `order_number` business id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Discounts
// =============================================================================

/// The stored discount kind on a product row.
///
/// The matching `discount_value` column is interpreted per kind:
/// basis points for `Percentage`, cents for `Fixed`, ignored for `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    None,
    Percentage,
    Fixed,
}

impl Default for DiscountKind {
    fn default() -> Self {
        DiscountKind::None
    }
}

/// A fully-interpreted discount, ready for the pricing engine.
///
/// Tagged variant with an exhaustive match in pricing — adding a discount
/// kind without teaching the pricing engine about it is a compile error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discount {
    /// No discount; unit price is the base price.
    None,
    /// Percentage off the base price, in basis points (1000 = 10%).
    Percentage(u32),
    /// Fixed amount off the base price, clamped at zero.
    Fixed(Money),
}

// =============================================================================
// Product
// =============================================================================

/// A product in the catalog store.
///
/// `stock_count` is the committed stock level and is only ever mutated by the
/// inventory ledger; held reservations reduce *availability* without touching
/// it. `version` is bumped on every mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display title.
    pub title: String,

    /// Optional long description.
    pub description: Option<String>,

    /// Base price in cents.
    pub price_cents: i64,

    /// Discount kind (`none`, `percentage`, `fixed`).
    pub discount_kind: DiscountKind,

    /// Discount value: basis points for percentage, cents for fixed.
    pub discount_value: i64,

    /// Committed stock level. Invariant: never negative at a committed state.
    pub stock_count: i64,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    /// Revision counter, bumped on every mutation.
    pub version: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the base price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Interprets the stored discount columns as a typed discount.
    pub fn discount(&self) -> Discount {
        match self.discount_kind {
            DiscountKind::None => Discount::None,
            DiscountKind::Percentage => Discount::Percentage(self.discount_value as u32),
            DiscountKind::Fixed => Discount::Fixed(Money::from_cents(self.discount_value)),
        }
    }
}

// =============================================================================
// Promo Codes
// =============================================================================

/// An order-level discount code.
///
/// Matched case-insensitively by `code`. Product discounts apply per line;
/// a promo code discounts the order total once, after line discounts and the
/// delivery fee. `usage_count` is incremented only when the order's payment
/// commits, so an abandoned pending order never consumes a use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PromoCode {
    pub id: String,
    /// The customer-entered code (stored uppercase by convention).
    pub code: String,
    pub description: Option<String>,
    /// `percentage` or `fixed`; a promo row never stores `none`.
    pub discount_kind: DiscountKind,
    /// Basis points for percentage, cents for fixed.
    pub discount_value: i64,
    /// Minimum order total the code requires; 0 means no minimum.
    pub min_order_cents: i64,
    /// Cap on the computed discount; `None` means uncapped.
    pub max_discount_cents: Option<i64>,
    /// `None` means unlimited uses.
    pub usage_limit: Option<i64>,
    pub usage_count: i64,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PromoCode {
    /// Interprets the stored discount columns as a typed discount.
    pub fn discount(&self) -> Discount {
        match self.discount_kind {
            DiscountKind::None => Discount::None,
            DiscountKind::Percentage => Discount::Percentage(self.discount_value as u32),
            DiscountKind::Fixed => Discount::Fixed(Money::from_cents(self.discount_value)),
        }
    }

    /// Whether the code is outside its validity window at the given instant.
    #[inline]
    pub fn is_outside_window(&self, now: DateTime<Utc>) -> bool {
        now < self.valid_from || now >= self.valid_until
    }

    /// Whether the usage limit has been reached.
    #[inline]
    pub fn is_usage_exhausted(&self) -> bool {
        matches!(self.usage_limit, Some(limit) if self.usage_count >= limit)
    }
}

// =============================================================================
// Reservation
// =============================================================================

/// Lifecycle state of an inventory reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum ReservationState {
    /// Active hold, counted against availability until `expires_at`.
    Held,
    /// Converted into a permanent stock decrement.
    Committed,
    /// Discarded; availability restored.
    Released,
}

/// A temporary, ttl-bounded hold on inventory quantity.
///
/// Exists only between `reserve` and `commit`/`release`. Not visible to other
/// readers as stock: availability = `stock_count - SUM(held, unexpired)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Reservation {
    pub id: String,
    pub product_id: String,
    /// The checkout request (order id) that owns this hold.
    pub request_id: String,
    pub quantity: i64,
    pub state: ReservationState,
    /// Hard deadline: a hold past this instant is invalid even if the
    /// sweeper has not released it yet.
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// Whether the hold is past its ttl at the given instant.
    #[inline]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

// =============================================================================
// Slot Calendar
// =============================================================================

/// A bookable resource (a stylist chair, a service bay, a fitting room).
///
/// Slots are not pre-materialized: a slot is the half-open `[start, end)`
/// interval of a booking row, and availability is the count of overlapping
/// active bookings versus `capacity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Resource {
    pub id: String,
    pub name: String,
    /// Concurrent bookings allowed for overlapping intervals. Capacity 1 is
    /// strict mutual exclusion.
    pub capacity: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A requested slot: resource plus half-open interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRequest {
    pub resource_id: String,
    /// Inclusive start.
    pub start_at: DateTime<Utc>,
    /// Exclusive end.
    pub end_at: DateTime<Utc>,
}

// =============================================================================
// Booking
// =============================================================================

/// The status of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Hold taken during allocation, valid until `expires_at`.
    Pending,
    /// Payment confirmed; the interval is held permanently.
    Confirmed,
    /// Released/expired/explicitly cancelled; the interval is free again.
    Cancelled,
}

impl Default for BookingStatus {
    fn default() -> Self {
        BookingStatus::Pending
    }
}

/// A booking of a resource for a half-open time interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Booking {
    pub id: String,
    pub resource_id: String,
    pub customer_id: String,
    pub customer_email: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: BookingStatus,
    pub price_cents: i64,
    /// Pending holds are invalid past this instant; ignored once confirmed.
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Returns the booking price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Half-open interval overlap check:
    /// `self.start < other_end && other_start < self.end`.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_at < end && start < self.end_at
    }

    /// Whether this booking currently holds its interval.
    ///
    /// Confirmed bookings always hold; pending holds only until expiry;
    /// cancelled bookings never.
    pub fn holds_interval(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            BookingStatus::Confirmed => true,
            BookingStatus::Pending => self.expires_at > now,
            BookingStatus::Cancelled => false,
        }
    }
}

// =============================================================================
// Order
// =============================================================================

/// The status of an order.
///
/// Transitions: `pending → confirmed → refunded`, and
/// `pending | confirmed → cancelled`. Once confirmed, content is immutable;
/// only the status may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Reservations held, awaiting payment confirmation.
    Pending,
    /// Payment confirmed, stock committed.
    Confirmed,
    /// Rolled back before commit; reservations released.
    Cancelled,
    /// Confirmed order refunded; stock restored.
    Refunded,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

/// A customer-facing order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,
    /// Business identifier, format `ORD-YYYYMMDD-XXXXX`.
    pub order_number: String,
    pub customer_id: String,
    pub customer_email: String,
    /// Delivery zone key, resolved against the fee schedule at checkout.
    pub delivery_zone: String,
    pub subtotal_cents: i64,
    /// Sum of per-line product discounts.
    pub discount_cents: i64,
    /// The promo code applied at checkout, if any.
    pub promo_code_id: Option<String>,
    /// Order-level discount from the promo code; 0 when none applied.
    pub promo_discount_cents: i64,
    pub delivery_fee_cents: i64,
    pub total_cents: i64,
    pub status: OrderStatus,
    /// Payment window deadline while pending; ignored afterwards.
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Returns the grand total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A line item in an order.
///
/// Snapshot pattern: product title/sku/price are frozen at checkout so the
/// order history survives later catalog edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    /// Title at time of checkout (frozen).
    pub title_snapshot: String,
    /// SKU at time of checkout (frozen).
    pub sku_snapshot: String,
    pub quantity: i64,
    /// Discounted unit price in cents at time of checkout (frozen).
    pub unit_price_cents: i64,
    /// unit_price × quantity.
    pub line_total_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Customer
// =============================================================================

/// Reference to the customer placing an order/booking.
///
/// Identity issuance is an external collaborator; the engine only needs a
/// stable id plus the email the confirmation event goes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub email: String,
}

// =============================================================================
// Notification Outbox
// =============================================================================

/// Kind of outbound notification event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderConfirmed,
    BookingConfirmed,
}

/// An entry in the notification outbox queue.
///
/// Written in the same transaction that confirms an order/booking (outbox
/// pattern), so exactly one event row exists per successful commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct NotificationOutboxEntry {
    pub id: String,
    pub kind: NotificationKind,
    /// Order or booking id; UNIQUE in storage, the dedupe key downstream.
    pub entity_id: String,
    pub recipient_email: String,
    /// The full entity as JSON.
    pub payload: String,
    /// Number of delivery attempts.
    pub attempts: i64,
    /// Last error message if delivery failed.
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    /// When successfully handed to the email collaborator.
    pub dispatched_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Unit Tests
// =============================================================================
