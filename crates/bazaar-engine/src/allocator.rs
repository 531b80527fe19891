//! # Booking Allocator
//!
//! The only component allowed to place or resolve slot holds.
//!
//! ## Allocation Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  A slot is the half-open interval [start, end) against a resource.      │
//! │                                                                         │
//! │  hold succeeds iff                                                      │
//! │     count(bookings holding an overlapping interval) < capacity          │
//! │                                                                         │
//! │  "holding" = confirmed, or pending with an unexpired ttl.               │
//! │  Capacity 1 is strict mutual exclusion; first successful insert wins,   │
//! │  no priority by arrival time.                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{Duration, Utc};
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use bazaar_core::{validation, Booking, Customer, SlotRequest};
use bazaar_db::{BookingConfirmOutcome, Database, HoldOutcome};

/// Interval holds over the slot calendar.
#[derive(Debug, Clone)]
pub struct BookingAllocator {
    db: Database,
    ttl: Duration,
}

impl BookingAllocator {
    /// Creates an allocator with the given hold ttl.
    pub fn new(db: Database, ttl: Duration) -> Self {
        BookingAllocator { db, ttl }
    }

    /// Holds a slot for a customer, creating a pending booking.
    ///
    /// ## Errors
    /// * `Validation` - empty or inverted interval
    /// * `SlotNotFound` - resource missing or inactive
    /// * `SlotUnavailable` - no remaining capacity for an overlapping interval
    pub async fn hold(
        &self,
        slot: &SlotRequest,
        customer: &Customer,
        price_cents: i64,
    ) -> EngineResult<Booking> {
        validation::validate_slot_interval(slot.start_at, slot.end_at)?;
        validation::validate_email(&customer.email)?;
        validation::validate_price_cents(price_cents)?;

        let expires_at = Utc::now() + self.ttl;
        let outcome = self
            .db
            .bookings()
            .try_hold(
                &slot.resource_id,
                customer,
                slot.start_at,
                slot.end_at,
                price_cents,
                expires_at,
            )
            .await?;

        match outcome {
            HoldOutcome::Held(booking) => {
                debug!(
                    booking_id = %booking.id,
                    resource_id = %slot.resource_id,
                    "Slot hold placed"
                );
                Ok(booking)
            }
            HoldOutcome::ResourceNotFound => Err(EngineError::SlotNotFound {
                resource_id: slot.resource_id.clone(),
            }),
            HoldOutcome::SlotUnavailable => Err(EngineError::SlotUnavailable {
                resource_id: slot.resource_id.clone(),
                start_at: slot.start_at,
                end_at: slot.end_at,
            }),
        }
    }

    /// Confirms a pending booking, making the interval hold permanent and
    /// enqueueing the confirmation notification. Idempotent after success.
    ///
    /// ## Errors
    /// * `ReservationExpired` - the pending hold's ttl elapsed
    /// * `RequestNotFound` - no such booking
    /// * `InvalidState` - the booking was cancelled
    pub async fn confirm(&self, booking_id: &str) -> EngineResult<Booking> {
        let outcome = self
            .db
            .bookings()
            .confirm_with_outbox(booking_id, Utc::now())
            .await?;

        match outcome {
            BookingConfirmOutcome::Confirmed(booking) => {
                info!(booking_id = %booking_id, "Booking confirmed");
                Ok(booking)
            }
            BookingConfirmOutcome::AlreadyConfirmed(booking) => Ok(booking),
            BookingConfirmOutcome::Expired => Err(EngineError::ReservationExpired {
                request_id: booking_id.to_string(),
            }),
            BookingConfirmOutcome::Cancelled => Err(EngineError::InvalidState {
                entity: "booking",
                id: booking_id.to_string(),
                status: "cancelled".to_string(),
                operation: "confirm",
            }),
            BookingConfirmOutcome::NotFound => Err(EngineError::RequestNotFound {
                id: booking_id.to_string(),
            }),
        }
    }

    /// Releases a booking's interval (pending or confirmed → cancelled).
    /// Idempotent.
    ///
    /// ## Errors
    /// * `RequestNotFound` - no such booking
    pub async fn release(&self, booking_id: &str) -> EngineResult<()> {
        self.db
            .bookings()
            .cancel(booking_id)
            .await
            .map_err(|e| match e {
                bazaar_db::DbError::NotFound { .. } => EngineError::RequestNotFound {
                    id: booking_id.to_string(),
                },
                other => other.into(),
            })?;

        debug!(booking_id = %booking_id, "Booking released");
        Ok(())
    }

    /// Whether the slot currently has remaining capacity. Advisory for
    /// display; `hold` re-checks atomically.
    pub async fn slot_available(&self, slot: &SlotRequest) -> EngineResult<bool> {
        validation::validate_slot_interval(slot.start_at, slot.end_at)?;

        self.db
            .resources()
            .slot_available(&slot.resource_id, slot.start_at, slot.end_at, Utc::now())
            .await?
            .ok_or_else(|| EngineError::SlotNotFound {
                resource_id: slot.resource_id.clone(),
            })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
