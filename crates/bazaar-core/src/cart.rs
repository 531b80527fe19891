//! # Shopping Cart
//!
//! The client-side cart a checkout request is built from.
//!
//! ## Price Snapshots Are Display-Only
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Cart lines freeze the unit price at add time so the cart UI stays      │
//! │  stable while the customer browses. That snapshot is NOT authoritative: │
//! │  the pricing engine recomputes every price from the catalog when the    │
//! │  checkout starts, and those recomputed numbers are what gets frozen     │
//! │  into the order items.                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pricing;
use crate::types::Product;
use crate::MAX_CART_LINES;
use crate::MAX_LINE_QUANTITY;

/// Errors from cart mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("line quantity cannot exceed {max}")]
    QuantityExceeded { max: i64 },

    #[error("cart cannot have more than {max} lines")]
    TooManyLines { max: usize },

    #[error("product {product_id} is not in the cart")]
    LineNotFound { product_id: String },
}

/// A line in the shopping cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    /// Product ID (UUID), used for the authoritative lookup at checkout.
    pub product_id: String,

    /// SKU at time of adding (frozen).
    pub sku: String,

    /// Title at time of adding (frozen).
    pub title: String,

    /// Discounted unit price in cents at time of adding (display only).
    pub unit_price_cents: i64,

    /// Quantity in cart. Always positive.
    pub quantity: i64,

    /// When this line was added.
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    /// Creates a cart line from a product and quantity, freezing the
    /// currently effective (discounted) unit price for display.
    pub fn from_product(product: &Product, quantity: i64) -> Self {
        CartLine {
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            title: product.title.clone(),
            unit_price_cents: pricing::unit_price(product).cents(),
            quantity,
            added_at: Utc::now(),
        }
    }

    /// Display line total (snapshot price × quantity).
    pub fn line_total_cents(&self) -> i64 {
        self.unit_price_cents * self.quantity
    }
}

/// The shopping cart.
///
/// ## Invariants
/// - Lines are unique by `product_id` (adding the same product increases
///   quantity)
/// - Quantity is always > 0 (setting it to 0 removes the line)
/// - At most [`MAX_CART_LINES`] lines, [`MAX_LINE_QUANTITY`] per line
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Cart {
    pub lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Cart { lines: Vec::new() }
    }

    /// Adds a product or increases quantity if already present.
    pub fn add_line(&mut self, product: &Product, quantity: i64) -> Result<(), CartError> {
        if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product.id) {
            let new_qty = line.quantity + quantity;
            if new_qty > MAX_LINE_QUANTITY {
                return Err(CartError::QuantityExceeded {
                    max: MAX_LINE_QUANTITY,
                });
            }
            line.quantity = new_qty;
            return Ok(());
        }

        if self.lines.len() >= MAX_CART_LINES {
            return Err(CartError::TooManyLines {
                max: MAX_CART_LINES,
            });
        }

        self.lines.push(CartLine::from_product(product, quantity));
        Ok(())
    }

    /// Sets the quantity of a line; 0 removes it.
    pub fn update_quantity(&mut self, product_id: &str, quantity: i64) -> Result<(), CartError> {
        if quantity == 0 {
            return self.remove_line(product_id);
        }

        if quantity > MAX_LINE_QUANTITY {
            return Err(CartError::QuantityExceeded {
                max: MAX_LINE_QUANTITY,
            });
        }

        if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product_id) {
            line.quantity = quantity;
            Ok(())
        } else {
            Err(CartError::LineNotFound {
                product_id: product_id.to_string(),
            })
        }
    }

    /// Removes a line by product ID.
    pub fn remove_line(&mut self, product_id: &str) -> Result<(), CartError> {
        let initial_len = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);

        if self.lines.len() == initial_len {
            Err(CartError::LineNotFound {
                product_id: product_id.to_string(),
            })
        } else {
            Ok(())
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Number of unique lines.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Total quantity across all lines.
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Display subtotal from the frozen snapshots.
    pub fn display_subtotal_cents(&self) -> i64 {
        self.lines.iter().map(|l| l.line_total_cents()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
