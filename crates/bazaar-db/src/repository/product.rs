//! # Product Repository
//!
//! Database operations for the catalog store.
//!
//! ## Stock vs. Availability
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  stock_count     committed stock; only a reservation commit or a       │
//! │                  restock/refund touches it                              │
//! │                                                                         │
//! │  availability    stock_count - SUM(quantity of held, unexpired          │
//! │                  reservations) - what a new reserve attempt sees        │
//! │                                                                         │
//! │  Example: stock_count = 5, two live holds of 2 each                    │
//! │           → availability = 1, a reserve of 2 loses, a reserve of 1 wins │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use bazaar_core::Product;

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
///
/// let product = repo.get_by_sku("WIDGET-330").await?;
/// let available = repo.availability(&product.id, Utc::now()).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a new product.
    ///
    /// ## Errors
    /// * `DbError::UniqueViolation` - SKU already exists
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, title, description, price_cents,
                discount_kind, discount_value, stock_count,
                is_active, version, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.title)
        .bind(&product.description)
        .bind(product.price_cents)
        .bind(product.discount_kind)
        .bind(product.discount_value)
        .bind(product.stock_count)
        .bind(product.is_active)
        .bind(product.version)
        .bind(product.created_at.timestamp())
        .bind(product.updated_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Gets a product by its SKU (business identifier).
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE sku = ?1")
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Lists active products, sorted by title.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE is_active = 1
            ORDER BY title
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Updates a product's catalog fields (not stock).
    ///
    /// Bumps the revision counter. Stock mutations go through [`restock`]
    /// or the reservation commit path, never through here.
    ///
    /// [`restock`]: ProductRepository::restock
    ///
    /// ## Errors
    /// * `DbError::NotFound` - Product ID doesn't exist
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, "Updating product");

        let result = sqlx::query(
            r#"
            UPDATE products
            SET sku = ?2,
                title = ?3,
                description = ?4,
                price_cents = ?5,
                discount_kind = ?6,
                discount_value = ?7,
                is_active = ?8,
                version = version + 1,
                updated_at = ?9
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.title)
        .bind(&product.description)
        .bind(product.price_cents)
        .bind(product.discount_kind)
        .bind(product.discount_value)
        .bind(product.is_active)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        Ok(())
    }

    /// Adds stock to a product (goods received, refund restock).
    ///
    /// ## Errors
    /// * `DbError::NotFound` - Product ID doesn't exist
    pub async fn restock(&self, id: &str, quantity: i64) -> DbResult<()> {
        debug!(id = %id, quantity = quantity, "Restocking product");

        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock_count = stock_count + ?2,
                version = version + 1,
                updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Soft-deletes a product (sets is_active = 0).
    ///
    /// The row stays so historical order items keep a valid foreign key;
    /// availability queries and new reservations skip inactive products.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting product");

        let result = sqlx::query(
            r#"
            UPDATE products
            SET is_active = 0,
                version = version + 1,
                updated_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts all products (active and inactive).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Computes current availability: committed stock minus the quantity in
    /// live (held, unexpired) reservations.
    ///
    /// Advisory for display; the reserve statement re-checks under SQLite's
    /// write lock, so a stale read here can never oversell.
    ///
    /// ## Returns
    /// * `Ok(Some(n))` - Available quantity (may be 0)
    /// * `Ok(None)` - Product not found
    pub async fn availability(&self, id: &str, now: DateTime<Utc>) -> DbResult<Option<i64>> {
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
            WHERE p.id = ?1
            "#,
        )
        .bind(id)
        .bind(now.timestamp())
        .fetch_optional(&self.pool)
        .await?;

        Ok(available)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
