//! # Promo Code Repository
//!
//! Database operations for order-level discount codes.
//!
//! Codes are matched case-insensitively (the column collates NOCASE), so
//! `save20` finds `SAVE20`. Eligibility itself is evaluated in pure code at
//! checkout; this repository only stores rows and counts uses. The usage
//! increment runs inside the payment commit transaction, so an abandoned
//! pending order never consumes a use.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use bazaar_core::PromoCode;

/// Repository for promo code operations.
#[derive(Debug, Clone)]
pub struct PromoCodeRepository {
    pool: SqlitePool,
}

impl PromoCodeRepository {
    /// Creates a new PromoCodeRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PromoCodeRepository { pool }
    }

    /// Inserts a new promo code.
    pub async fn insert(&self, promo: &PromoCode) -> DbResult<()> {
        debug!(promo_id = %promo.id, code = %promo.code, "Inserting promo code");

        sqlx::query(
            r#"
            INSERT INTO promo_codes (
                id, code, description, discount_kind, discount_value,
                min_order_cents, max_discount_cents, usage_limit, usage_count,
                valid_from, valid_until, is_active, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&promo.id)
        .bind(&promo.code)
        .bind(&promo.description)
        .bind(promo.discount_kind)
        .bind(promo.discount_value)
        .bind(promo.min_order_cents)
        .bind(promo.max_discount_cents)
        .bind(promo.usage_limit)
        .bind(promo.usage_count)
        .bind(promo.valid_from.timestamp())
        .bind(promo.valid_until.timestamp())
        .bind(promo.is_active)
        .bind(promo.created_at.timestamp())
        .bind(promo.updated_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a promo code by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<PromoCode>> {
        let promo = sqlx::query_as::<_, PromoCode>("SELECT * FROM promo_codes WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(promo)
    }

    /// Gets a promo code by its customer-entered code, case-insensitively.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<PromoCode>> {
        let promo = sqlx::query_as::<_, PromoCode>("SELECT * FROM promo_codes WHERE code = ?1")
            .bind(code.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(promo)
    }

    /// Deactivates a promo code.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE promo_codes SET is_active = 0, updated_at = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("promo code", id));
        }

        debug!(promo_id = %id, "Promo code deactivated");
        Ok(())
    }

    /// Counts one use of a promo code.
    pub async fn increment_usage(&self, id: &str) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        increment_usage_on(&mut conn, id, Utc::now()).await
    }
}

/// Counts one use of a promo code on an open connection.
///
/// Shared by [`PromoCodeRepository::increment_usage`] and the order confirm
/// transaction, which folds the increment into the same transaction that
/// flips the order status.
pub(crate) async fn increment_usage_on(
    conn: &mut SqliteConnection,
    id: &str,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let result = sqlx::query(
        "UPDATE promo_codes SET usage_count = usage_count + 1, updated_at = ?2 WHERE id = ?1",
    )
    .bind(id)
    .bind(now.timestamp())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("promo code", id));
    }

    debug!(promo_id = %id, "Promo code use counted");
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
