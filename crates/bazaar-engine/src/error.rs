//! # Engine Error Taxonomy
//!
//! The domain errors callers of the engine see.
//!
//! ## Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Rejected before side effects   Validation                              │
//! │                                                                         │
//! │  Business outcomes              ProductNotFound, InsufficientStock,     │
//! │  (carry the offending line,     SlotNotFound, SlotUnavailable,          │
//! │   slot, or code; never          PromoCodeRejected, PromoCodeNotFound,   │
//! │   retried)                      ReservationExpired, PaymentDeclined,    │
//! │                                 RequestNotFound, InvalidState           │
//! │                                                                         │
//! │  Infrastructure                 Inconsistency (fatal for the request,   │
//! │                                 logged, never silently corrected),      │
//! │                                 Db (wrapped storage failure)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! User-visible messages for the infrastructure variants stay generic; the
//! detail goes to the log, not the caller.

use chrono::{DateTime, Utc};
use thiserror::Error;

use bazaar_core::{PromoRejection, ValidationError};
use bazaar_db::DbError;

/// Errors from engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed request, rejected before any reservation attempt.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Product missing or discontinued.
    #[error("product not found: {id}")]
    ProductNotFound { id: String },

    /// Not enough available stock for a cart line.
    #[error("insufficient stock for {sku}: {available} available, {requested} requested")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    /// Bookable resource missing or inactive.
    #[error("slot resource not found: {resource_id}")]
    SlotNotFound { resource_id: String },

    /// The requested interval has no remaining capacity.
    #[error("slot unavailable on {resource_id}: [{start_at}, {end_at})")]
    SlotUnavailable {
        resource_id: String,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    },

    /// The promo code does not apply to this order. The customer is told
    /// exactly why; no holds remain after the rejection.
    #[error("promo code {code} rejected: {reason}")]
    PromoCodeRejected { code: String, reason: PromoRejection },

    /// No promo code with the given code string.
    #[error("promo code not found: {code}")]
    PromoCodeNotFound { code: String },

    /// A hold's ttl elapsed before commit. The caller restarts from draft.
    #[error("reservation expired for request {request_id}")]
    ReservationExpired { request_id: String },

    /// The external payment decision was a decline; everything rolled back.
    #[error("payment declined for request {request_id}")]
    PaymentDeclined { request_id: String },

    /// No order or booking with the given request id.
    #[error("request not found: {id}")]
    RequestNotFound { id: String },

    /// The entity is in a state that does not allow the operation
    /// (e.g., cancelling a confirmed order, refunding a pending one).
    #[error("{entity} {id} is {status}, cannot {operation}")]
    InvalidState {
        entity: &'static str,
        id: String,
        status: String,
        operation: &'static str,
    },

    /// Stored state violates an engine invariant. Fatal for the request.
    #[error("internal inconsistency")]
    Inconsistency(String),

    /// Storage-level failure.
    #[error("storage error")]
    Db(#[source] DbError),
}

impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Inconsistent(detail) => EngineError::Inconsistency(detail),
            other => EngineError::Db(other),
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
