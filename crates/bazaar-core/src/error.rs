//! # Error Types
//!
//! Domain-level validation errors for bazaar-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bazaar-core (this file)                                               │
//! │  └── ValidationError  - malformed input, rejected BEFORE any            │
//! │                         reservation attempt                             │
//! │                                                                         │
//! │  bazaar-db                                                             │
//! │  └── DbError          - database operation failures                     │
//! │                                                                         │
//! │  bazaar-engine                                                         │
//! │  └── EngineError      - the full transaction-engine taxonomy            │
//! │                         (InsufficientStock, SlotUnavailable, ...)       │
//! │                                                                         │
//! │  Flow: ValidationError → EngineError ← DbError                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (SKU, field name, etc.)
//! 3. Errors are enum variants, never String

use thiserror::Error;

/// Input validation errors.
///
/// These occur when a request doesn't meet requirements. Validation runs
/// before any reservation is attempted, so a validation failure never has
/// side effects to roll back.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, malformed email).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A time interval whose end does not come after its start.
    #[error("slot interval end must be after start")]
    EmptyInterval,
}

/// Convenience type alias for validation results.
pub type ValidationResult<T> = Result<T, ValidationError>;
