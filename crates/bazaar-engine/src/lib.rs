//! # bazaar-engine: The Commerce Transaction Engine
//!
//! Converts shopping carts and booking requests into committed orders while
//! enforcing inventory correctness, slot exclusivity, and pricing
//! consistency under concurrency.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   Bazaar Commerce Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            HTTP/API boundary (external, excluded)               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ bazaar-engine (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │  ┌──────────────┐  ┌──────────────┐  ┌───────────────────────┐ │   │
//! │  │  │ Orchestrator │  │  Inventory   │  │  Booking Allocator    │ │   │
//! │  │  │  checkout /  │─►│   Ledger     │  │  interval holds vs.   │ │   │
//! │  │  │  payment /   │  │  ttl holds,  │  │  resource capacity    │ │   │
//! │  │  │  cancel /    │  │  commit,     │  └───────────────────────┘ │   │
//! │  │  │  refund      │  │  release     │                            │   │
//! │  │  └──────────────┘  └──────────────┘                            │   │
//! │  │                                                                 │   │
//! │  │  ┌──────────────┐  ┌───────────────────────────────────────┐   │   │
//! │  │  │   Sweeper    │  │  NotificationDispatcher → Sink        │   │   │
//! │  │  │  background  │  │  drains the transactional outbox      │   │   │
//! │  │  │  ttl cleanup │  │  to the email collaborator            │   │   │
//! │  │  └──────────────┘  └───────────────────────────────────────┘   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │            bazaar-core (pure logic)  +  bazaar-db (SQLite)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//!
//! 1. Committed stock never goes negative, and
//!    `initial = current + Σ committed − Σ restocked` at every committed
//!    state.
//! 2. No resource ever has more overlapping active bookings than capacity.
//! 3. Concurrent requests for the same stock or slot resolve to exactly one
//!    winner; losers get a typed business error naming the offender.
//! 4. A hold past its ttl pins nothing: it is ignored lazily everywhere and
//!    swept eventually.
//! 5. Exactly one notification event is enqueued per successful commit.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bazaar_db::{Database, DbConfig};
//! use bazaar_engine::{EngineConfig, Orchestrator};
//!
//! let db = Database::new(DbConfig::new("./bazaar.db")).await?;
//! let engine = Orchestrator::new(db.clone(), EngineConfig::new());
//!
//! let ticket = engine.start_checkout(&request).await?;
//! // ... customer pays within ticket.payment_deadline ...
//! engine.confirm_payment(&ticket.order.id, PaymentDecision::Approved).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocator;
pub mod config;
pub mod error;
pub mod events;
pub mod ledger;
pub mod orchestrator;
pub mod sweep;

// =============================================================================
// Re-exports
// =============================================================================

pub use allocator::BookingAllocator;
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use events::{
    DispatchReport, NotificationDispatcher, NotificationEvent, NotificationSink, SinkError,
};
pub use ledger::InventoryLedger;
pub use orchestrator::{
    BookingRequest, CheckoutLine, CheckoutRequest, CheckoutTicket, Orchestrator, PaymentDecision,
    PaymentOutcome,
};
pub use sweep::{SweepReport, Sweeper};
