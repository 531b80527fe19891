//! # bazaar-db: Database Layer for the Bazaar Commerce Engine
//!
//! This crate provides database access for the commerce engine.
//! It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Bazaar Data Flow                                   │
//! │                                                                         │
//! │  Engine operation (start_checkout, confirm_payment, ...)                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    bazaar-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ (product.rs,  │    │  (embedded)  │  │   │
//! │  │   │               │    │  reservation, │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│  booking,     │    │ 001_init.sql │  │   │
//! │  │   │ Connection    │    │  order, ...)  │    │              │  │   │
//! │  │   │ Management    │    │               │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (WAL mode)                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency Model
//!
//! The contended operations (inventory reserve, slot hold, payment commit)
//! never do read-check-write from Rust. Each is a single guarded SQL
//! statement (or one transaction of guarded statements) whose WHERE clause
//! re-checks the invariant, so two racing requests for the last unit resolve
//! inside SQLite: one row is written, the other statement affects zero rows.
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (product, reservation, ...)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bazaar_db::{Database, DbConfig};
//!
//! let config = DbConfig::new("path/to/bazaar.db");
//! let db = Database::new(config).await?;
//!
//! let product = db.products().get_by_sku("WIDGET-330").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::booking::{BookingConfirmOutcome, BookingRepository, HoldOutcome};
pub use repository::order::{
    NewOrderItem, OrderCancelOutcome, OrderConfirmOutcome, OrderRefundOutcome, OrderRepository,
};
pub use repository::outbox::OutboxRepository;
pub use repository::product::ProductRepository;
pub use repository::promo::PromoCodeRepository;
pub use repository::reservation::{CommitOutcome, ReservationRepository, ReserveOutcome};
pub use repository::resource::ResourceRepository;
