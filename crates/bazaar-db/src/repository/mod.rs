//! # Repository Implementations
//!
//! One repository per aggregate. Each wraps the shared `SqlitePool` and is
//! cheap to construct from [`crate::Database`] accessors.
//!
//! ## Conventions
//! - Timestamps are bound as unix seconds (INTEGER columns), so ttl and
//!   interval comparisons are exact integer comparisons inside SQL.
//! - Contended operations return outcome enums, not errors: losing a race
//!   for the last unit is a domain outcome, not a failure.
//! - Every mutation logs at `debug!` with the affected ids.

pub mod booking;
pub mod order;
pub mod outbox;
pub mod product;
pub mod promo;
pub mod reservation;
pub mod resource;
