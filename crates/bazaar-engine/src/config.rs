//! # Engine Configuration
//!
//! Tunables for the transaction engine, builder-style with documented
//! defaults.

use std::time::Duration;

use bazaar_core::FeeSchedule;

/// Engine configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = EngineConfig::new()
///     .reservation_ttl(Duration::from_secs(10 * 60))
///     .fee_schedule(FeeSchedule::flat(Money::from_cents(15000)));
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long inventory holds, slot holds, and the payment window last.
    /// Default: 15 minutes.
    pub reservation_ttl: Duration,

    /// Cadence of the background ttl sweep.
    /// Default: 60 seconds. Correctness never depends on this; every commit
    /// path re-checks expiry itself.
    pub sweep_interval: Duration,

    /// Cadence of the notification dispatcher.
    /// Default: 5 seconds.
    pub dispatch_interval: Duration,

    /// Outbox entries drained per dispatcher pass.
    /// Default: 50.
    pub dispatch_batch: u32,

    /// Delivery fee table keyed by zone.
    /// Default: flat fee for every zone.
    pub fee_schedule: FeeSchedule,
}

impl EngineConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        EngineConfig {
            reservation_ttl: Duration::from_secs(15 * 60),
            sweep_interval: Duration::from_secs(60),
            dispatch_interval: Duration::from_secs(5),
            dispatch_batch: 50,
            fee_schedule: FeeSchedule::default(),
        }
    }

    /// Sets the hold/payment-window ttl.
    pub fn reservation_ttl(mut self, ttl: Duration) -> Self {
        self.reservation_ttl = ttl;
        self
    }

    /// Sets the sweep cadence.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Sets the dispatcher cadence.
    pub fn dispatch_interval(mut self, interval: Duration) -> Self {
        self.dispatch_interval = interval;
        self
    }

    /// Sets the dispatcher batch size.
    pub fn dispatch_batch(mut self, batch: u32) -> Self {
        self.dispatch_batch = batch;
        self
    }

    /// Sets the delivery fee schedule.
    pub fn fee_schedule(mut self, schedule: FeeSchedule) -> Self {
        self.fee_schedule = schedule;
        self
    }

    /// The ttl as a chrono duration, for deadline arithmetic.
    pub(crate) fn ttl_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.reservation_ttl)
            .unwrap_or_else(|_| chrono::Duration::minutes(15))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::new();
        assert_eq!(config.reservation_ttl, Duration::from_secs(900));
        assert_eq!(config.dispatch_batch, 50);
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new()
            .reservation_ttl(Duration::from_secs(60))
            .dispatch_batch(10);

        assert_eq!(config.reservation_ttl, Duration::from_secs(60));
        assert_eq!(config.dispatch_batch, 10);
    }
}
