//! # Pricing Engine
//!
//! Pure price computation: line totals, discount application, delivery fee,
//! grand total. No persisted state, no I/O — safe to call concurrently
//! without coordination, and deterministic: identical inputs always yield
//! identical totals.
//!
//! ## Computation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Cart Pricing Pipeline                               │
//! │                                                                         │
//! │  (Product, quantity) pairs                                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  unit_price(product)       ← exhaustive match over the discount kind    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  price_line(product, qty)  ← unit price, discount share, line total     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  price_cart(lines, fee)    ← subtotal, discount total, grand total      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CartTotals { subtotal - discount + delivery fee = grand total }        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All arithmetic is integer cents / basis points via [`Money`] — no floating
//! point is permitted anywhere in this path.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::Money;
use crate::types::{Discount, Product, PromoCode};

// =============================================================================
// Line Pricing
// =============================================================================

/// A priced cart line: the authoritative numbers frozen into an order item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub product_id: String,
    pub sku: String,
    pub title: String,
    pub quantity: i64,
    /// Undiscounted base price per unit.
    pub base_price_cents: i64,
    /// Discounted price per unit.
    pub unit_price_cents: i64,
    /// (base - unit) × quantity.
    pub discount_cents: i64,
    /// unit × quantity.
    pub line_total_cents: i64,
}

impl PricedLine {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

/// Computes the effective unit price for a product.
///
/// Exhaustive match over the discount variant:
/// - `None`: base price unchanged
/// - `Percentage(bps)`: base − round(base × bps / 10000)
/// - `Fixed(amount)`: max(0, base − amount)
pub fn unit_price(product: &Product) -> Money {
    let base = product.price();
    match product.discount() {
        Discount::None => base,
        Discount::Percentage(bps) => base.apply_percentage_discount(bps),
        Discount::Fixed(amount) => base.saturating_sub(amount),
    }
}

/// Prices one cart line.
///
/// The quantity must already be validated positive; pricing itself performs
/// no validation.
pub fn price_line(product: &Product, quantity: i64) -> PricedLine {
    let base = product.price();
    let unit = unit_price(product);
    let discount_per_unit = base - unit;

    PricedLine {
        product_id: product.id.clone(),
        sku: product.sku.clone(),
        title: product.title.clone(),
        quantity,
        base_price_cents: base.cents(),
        unit_price_cents: unit.cents(),
        discount_cents: discount_per_unit.multiply_quantity(quantity).cents(),
        line_total_cents: unit.multiply_quantity(quantity).cents(),
    }
}

// =============================================================================
// Cart Pricing
// =============================================================================

/// Aggregated cart totals.
///
/// Identity: `grand_total = subtotal - discount_total + delivery_fee`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartTotals {
    /// Sum of undiscounted base prices × quantities.
    pub subtotal_cents: i64,
    /// Simple sum of per-line discounts.
    pub discount_total_cents: i64,
    pub delivery_fee_cents: i64,
    pub grand_total_cents: i64,
}

impl CartTotals {
    #[inline]
    pub fn grand_total(&self) -> Money {
        Money::from_cents(self.grand_total_cents)
    }
}

/// Prices a whole cart given already-priced lines and a resolved delivery fee.
pub fn price_cart(lines: &[PricedLine], delivery_fee: Money) -> CartTotals {
    let subtotal: Money = lines
        .iter()
        .map(|l| Money::from_cents(l.base_price_cents).multiply_quantity(l.quantity))
        .sum();
    let discount_total: Money = lines.iter().map(|l| Money::from_cents(l.discount_cents)).sum();
    let grand_total = subtotal - discount_total + delivery_fee;

    CartTotals {
        subtotal_cents: subtotal.cents(),
        discount_total_cents: discount_total.cents(),
        delivery_fee_cents: delivery_fee.cents(),
        grand_total_cents: grand_total.cents(),
    }
}

// =============================================================================
// Delivery Fee Schedule
// =============================================================================

/// Delivery fee table keyed by delivery zone.
///
/// The fee table is collaborator-owned configuration; the engine treats it as
/// pure data. Unknown zones fall back to the default fee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    zones: HashMap<String, i64>,
    default_fee_cents: i64,
}

impl FeeSchedule {
    /// A flat schedule: every zone pays the same fee.
    pub fn flat(fee: Money) -> Self {
        FeeSchedule {
            zones: HashMap::new(),
            default_fee_cents: fee.cents(),
        }
    }

    /// Adds a zone-specific fee.
    pub fn with_zone(mut self, zone: impl Into<String>, fee: Money) -> Self {
        self.zones.insert(zone.into(), fee.cents());
        self
    }

    /// Resolves the delivery fee for a zone.
    pub fn resolve(&self, zone: &str) -> Money {
        Money::from_cents(
            self.zones
                .get(zone)
                .copied()
                .unwrap_or(self.default_fee_cents),
        )
    }
}

impl Default for FeeSchedule {
    /// Flat KSh 200.00 delivery fee.
    fn default() -> Self {
        FeeSchedule::flat(Money::from_cents(20000))
    }
}

// =============================================================================
// Promo Codes
// =============================================================================

/// Why a promo code was rejected.
///
/// Carried to the caller verbatim; unlike infrastructure errors, the customer
/// is told exactly why their code did not apply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromoRejection {
    #[error("code is not active")]
    Inactive,
    #[error("code is outside its validity window")]
    OutsideWindow,
    #[error("code has reached its usage limit")]
    UsageExhausted,
    #[error("order total is below the required minimum of {min_cents} cents")]
    BelowMinimum { min_cents: i64 },
}

/// Evaluates a promo code against an order total.
///
/// Pure: reads the code's stored state, never mutates usage. On success the
/// returned discount is already capped at `max_discount_cents` and clamped to
/// the order total, so the discounted total can never go negative.
pub fn apply_promo(
    promo: &PromoCode,
    order_total: Money,
    now: DateTime<Utc>,
) -> Result<Money, PromoRejection> {
    if !promo.is_active {
        return Err(PromoRejection::Inactive);
    }
    if promo.is_outside_window(now) {
        return Err(PromoRejection::OutsideWindow);
    }
    if promo.is_usage_exhausted() {
        return Err(PromoRejection::UsageExhausted);
    }
    if order_total.cents() < promo.min_order_cents {
        return Err(PromoRejection::BelowMinimum {
            min_cents: promo.min_order_cents,
        });
    }

    let discount = match promo.discount() {
        Discount::None => Money::zero(),
        Discount::Percentage(bps) => order_total.percentage_of(bps),
        Discount::Fixed(amount) => amount,
    };

    let capped = match promo.max_discount_cents {
        Some(cap) if discount.cents() > cap => Money::from_cents(cap),
        _ => discount,
    };

    // A discount larger than the order makes it free, never negative
    if capped.cents() > order_total.cents() {
        Ok(order_total)
    } else {
        Ok(capped)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
