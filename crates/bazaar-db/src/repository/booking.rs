//! # Booking Repository
//!
//! Database operations for slot bookings.
//!
//! ## The Hold Race
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Two customers race for the last seat of chair r1, 10:00-10:30:         │
//! │                                                                         │
//! │  Request A ──► INSERT ... SELECT ... WHERE overlapping < capacity ──► 1 │
//! │  Request B ──► INSERT ... SELECT ... WHERE overlapping < capacity ──► 0 │
//! │                                                                         │
//! │  Overlap test is half-open: existing.start < new.end AND                │
//! │  new.start < existing.end, so back-to-back bookings never collide.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A pending booking holds its interval only while `expires_at > now`;
//! confirming it makes the hold permanent and enqueues the notification in
//! the same transaction (outbox pattern).

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::outbox;
use bazaar_core::{Booking, BookingStatus, Customer, NotificationKind};

/// Outcome of a slot hold attempt.
#[derive(Debug)]
pub enum HoldOutcome {
    /// Interval held; valid until ttl or resolution.
    Held(Booking),
    /// Capacity exhausted for an overlapping interval.
    SlotUnavailable,
    /// Resource missing or inactive.
    ResourceNotFound,
}

/// Outcome of confirming a pending booking.
#[derive(Debug)]
pub enum BookingConfirmOutcome {
    /// Flipped to confirmed; notification enqueued.
    Confirmed(Booking),
    /// Was already confirmed (idempotent re-confirm).
    AlreadyConfirmed(Booking),
    /// The pending hold expired before confirmation.
    Expired,
    /// The booking was cancelled.
    Cancelled,
    /// No such booking.
    NotFound,
}

/// Repository for booking operations.
#[derive(Debug, Clone)]
pub struct BookingRepository {
    pool: SqlitePool,
}

impl BookingRepository {
    /// Creates a new BookingRepository.
    pub fn new(pool: SqlitePool) -> Self {
        BookingRepository { pool }
    }

    /// Attempts to hold `[start_at, end_at)` on a resource.
    ///
    /// Single guarded statement: the insert only happens if the count of
    /// bookings holding an overlapping interval is below the resource
    /// capacity at execution time.
    pub async fn try_hold(
        &self,
        resource_id: &str,
        customer: &Customer,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        price_cents: i64,
        expires_at: DateTime<Utc>,
    ) -> DbResult<HoldOutcome> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        debug!(
            resource_id = %resource_id,
            customer_id = %customer.id,
            start_at = %start_at,
            end_at = %end_at,
            "Attempting slot hold"
        );

        let result = sqlx::query(
            r#"
            INSERT INTO bookings (
                id, resource_id, customer_id, customer_email,
                start_at, end_at, status, price_cents,
                expires_at, created_at, updated_at
            )
            SELECT ?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7, ?8, ?9, ?9
            WHERE EXISTS (
                SELECT 1 FROM resources WHERE id = ?2 AND is_active = 1
            )
            AND (
                SELECT COUNT(*)
                FROM bookings
                WHERE resource_id = ?2
                  AND start_at < ?6
                  AND ?5 < end_at
                  AND (
                      status = 'confirmed'
                      OR (status = 'pending' AND expires_at > ?9)
                  )
            ) < (SELECT capacity FROM resources WHERE id = ?2)
            "#,
        )
        .bind(&id)
        .bind(resource_id)
        .bind(&customer.id)
        .bind(&customer.email)
        .bind(start_at.timestamp())
        .bind(end_at.timestamp())
        .bind(price_cents)
        .bind(expires_at.timestamp())
        .bind(now.timestamp())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            debug!(booking_id = %id, "Slot hold succeeded");
            return Ok(HoldOutcome::Held(Booking {
                id,
                resource_id: resource_id.to_string(),
                customer_id: customer.id.clone(),
                customer_email: customer.email.clone(),
                start_at,
                end_at,
                status: BookingStatus::Pending,
                price_cents,
                expires_at,
                created_at: now,
                updated_at: now,
            }));
        }

        // Guard failed: missing resource vs. full slot
        let active: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM resources WHERE id = ?1 AND is_active = 1",
        )
        .bind(resource_id)
        .fetch_optional(&self.pool)
        .await?;

        match active {
            Some(_) => {
                debug!(resource_id = %resource_id, "Slot hold lost to capacity");
                Ok(HoldOutcome::SlotUnavailable)
            }
            None => Ok(HoldOutcome::ResourceNotFound),
        }
    }

    /// Confirms a pending booking and enqueues its notification, atomically.
    ///
    /// The status flip is guarded by `status = 'pending' AND expires_at >
    /// now`; the outbox row is written in the same transaction, so a
    /// confirmed booking without a notification event cannot exist.
    ///
    /// Idempotent: confirming an already-confirmed booking returns
    /// [`BookingConfirmOutcome::AlreadyConfirmed`] without a second event.
    pub async fn confirm_with_outbox(
        &self,
        booking_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<BookingConfirmOutcome> {
        let mut tx = self.pool.begin().await?;

        let flipped = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'confirmed', updated_at = ?2
            WHERE id = ?1 AND status = 'pending' AND expires_at > ?2
            "#,
        )
        .bind(booking_id)
        .bind(now.timestamp())
        .execute(&mut *tx)
        .await?;

        if flipped.rows_affected() == 0 {
            tx.rollback().await?;

            let booking = self.get_by_id(booking_id).await?;
            return Ok(match booking {
                None => BookingConfirmOutcome::NotFound,
                Some(b) => match b.status {
                    BookingStatus::Confirmed => BookingConfirmOutcome::AlreadyConfirmed(b),
                    BookingStatus::Cancelled => BookingConfirmOutcome::Cancelled,
                    BookingStatus::Pending => BookingConfirmOutcome::Expired,
                },
            });
        }

        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = ?1")
            .bind(booking_id)
            .fetch_one(&mut *tx)
            .await?;

        let payload = serde_json::to_string(&booking)
            .map_err(|e| DbError::Internal(format!("booking payload serialization: {e}")))?;

        outbox::enqueue_on(
            &mut tx,
            NotificationKind::BookingConfirmed,
            &booking.id,
            &booking.customer_email,
            &payload,
            now,
        )
        .await?;

        tx.commit().await?;

        debug!(booking_id = %booking_id, "Booking confirmed");
        Ok(BookingConfirmOutcome::Confirmed(booking))
    }

    /// Cancels a booking, releasing its interval.
    ///
    /// Valid from both pending and confirmed. Idempotent: cancelling an
    /// already-cancelled booking is a no-op.
    pub async fn cancel(&self, booking_id: &str) -> DbResult<()> {
        debug!(booking_id = %booking_id, "Cancelling booking");

        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'cancelled', updated_at = ?2
            WHERE id = ?1 AND status IN ('pending', 'confirmed')
            "#,
        )
        .bind(booking_id)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 && self.get_by_id(booking_id).await?.is_none() {
            return Err(DbError::not_found("Booking", booking_id));
        }

        Ok(())
    }

    /// Gets a booking by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(booking)
    }

    /// Lists a resource's bookings intersecting `[from, to)`, any status.
    pub async fn list_for_resource(
        &self,
        resource_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(
            r#"
            SELECT * FROM bookings
            WHERE resource_id = ?1 AND start_at < ?3 AND ?2 < end_at
            ORDER BY start_at
            "#,
        )
        .bind(resource_id)
        .bind(from.timestamp())
        .bind(to.timestamp())
        .fetch_all(&self.pool)
        .await?;

        Ok(bookings)
    }

    /// Flips expired pending bookings to cancelled.
    ///
    /// Housekeeping only: the hold guard already ignores expired pendings.
    ///
    /// ## Returns
    /// Number of bookings cancelled.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'cancelled', updated_at = ?1
            WHERE status = 'pending' AND expires_at <= ?1
            "#,
        )
        .bind(now.timestamp())
        .execute(&self.pool)
        .await?;

        let swept = result.rows_affected();
        if swept > 0 {
            debug!(count = swept, "Swept expired booking holds");
        }

        Ok(swept)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
