//! # Notification Dispatch
//!
//! Drains the transactional outbox to the external email collaborator.
//!
//! ## Delivery Semantics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Enqueue is exactly-once (same transaction as the commit, UNIQUE        │
//! │  entity id). Delivery is at-least-once: the dispatcher can crash        │
//! │  between handing an event to the sink and marking it dispatched, so     │
//! │  the sink's downstream dedupes on entity_id.                            │
//! │                                                                         │
//! │  outbox row ──► NotificationEvent ──► sink.deliver()                    │
//! │                      │                     │                            │
//! │                      │              Ok ────┼──► mark_dispatched         │
//! │                      │              Err ───┴──► mark_failed (retried    │
//! │                      │                          next pass)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::EngineResult;
use bazaar_core::{NotificationKind, NotificationOutboxEntry};
use bazaar_db::Database;

/// Error type sinks report delivery failures with.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// An outbound confirmation event, ready for the email collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    pub kind: NotificationKind,
    /// Order or booking id; the downstream dedupe key.
    pub entity_id: String,
    pub recipient_email: String,
    /// The confirmed entity as JSON.
    pub payload: String,
}

impl From<&NotificationOutboxEntry> for NotificationEvent {
    fn from(entry: &NotificationOutboxEntry) -> Self {
        NotificationEvent {
            kind: entry.kind,
            entity_id: entry.entity_id.clone(),
            recipient_email: entry.recipient_email.clone(),
            payload: entry.payload.clone(),
        }
    }
}

/// The external delivery collaborator seam (email service, message bus).
///
/// Implementations must tolerate duplicate deliveries of the same
/// `entity_id`.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Delivers one event. An `Err` leaves the event pending for retry.
    async fn deliver(&self, event: &NotificationEvent) -> Result<(), SinkError>;
}

/// What a single dispatch pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: u64,
    pub failed: u64,
}

/// Drains undelivered outbox rows to a [`NotificationSink`].
#[derive(Clone)]
pub struct NotificationDispatcher {
    db: Database,
    sink: Arc<dyn NotificationSink>,
    batch: u32,
}

impl NotificationDispatcher {
    /// Creates a dispatcher draining at most `batch` entries per pass.
    pub fn new(db: Database, sink: Arc<dyn NotificationSink>, batch: u32) -> Self {
        NotificationDispatcher { db, sink, batch }
    }

    /// Runs one dispatch pass. Exposed for tests.
    pub async fn run_once(&self) -> EngineResult<DispatchReport> {
        let pending = self.db.outbox().get_pending(self.batch).await?;
        let mut report = DispatchReport::default();

        for entry in &pending {
            let event = NotificationEvent::from(entry);

            match self.sink.deliver(&event).await {
                Ok(()) => {
                    self.db.outbox().mark_dispatched(&entry.id, Utc::now()).await?;
                    debug!(entity_id = %entry.entity_id, kind = ?entry.kind, "Notification delivered");
                    report.delivered += 1;
                }
                Err(e) => {
                    self.db.outbox().mark_failed(&entry.id, &e.to_string()).await?;
                    warn!(
                        entity_id = %entry.entity_id,
                        attempts = entry.attempts + 1,
                        error = %e,
                        "Notification delivery failed"
                    );
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Runs dispatch passes on an interval until the shutdown signal flips.
    pub async fn run_loop(self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!(error = %e, "Dispatch pass failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Notification dispatcher shutting down");
                        return;
                    }
                }
            }
        }
    }

    /// Spawns the dispatch loop, returning the shutdown handle.
    pub fn spawn(self, interval: Duration) -> (tokio::task::JoinHandle<()>, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(self.run_loop(interval, rx));
        (handle, tx)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::{Customer, Resource};
    use bazaar_db::{DbConfig, HoldOutcome};
    use chrono::Duration as ChronoDuration;
    use std::sync::Mutex;

    /// Records delivered events; optionally fails every delivery.
    #[derive(Default)]
    struct MemorySink {
        delivered: Mutex<Vec<NotificationEvent>>,
        fail: bool,
    }

    #[async_trait]
    impl NotificationSink for MemorySink {
        async fn deliver(&self, event: &NotificationEvent) -> Result<(), SinkError> {
            if self.fail {
                return Err("smtp timeout".into());
            }
            self.delivered.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    async fn db_with_confirmed_booking() -> (Database, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();
        db.resources()
            .insert(&Resource {
                id: "r1".to_string(),
                name: "Chair".to_string(),
                capacity: 1,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        let customer = Customer {
            id: "c1".to_string(),
            email: "c1@example.com".to_string(),
        };
        let HoldOutcome::Held(booking) = db
            .bookings()
            .try_hold(
                "r1",
                &customer,
                now + ChronoDuration::hours(1),
                now + ChronoDuration::hours(2),
                5000,
                now + ChronoDuration::minutes(15),
            )
            .await
            .unwrap()
        else {
            panic!("expected hold");
        };
        db.bookings()
            .confirm_with_outbox(&booking.id, now)
            .await
            .unwrap();

        (db, booking.id)
    }

    #[tokio::test]
    async fn test_dispatch_delivers_and_marks() {
        let (db, booking_id) = db_with_confirmed_booking().await;
        let sink = Arc::new(MemorySink::default());
        let dispatcher = NotificationDispatcher::new(db.clone(), sink.clone(), 10);

        let report = dispatcher.run_once().await.unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 0);

        let delivered = sink.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].entity_id, booking_id);
        assert_eq!(delivered[0].kind, NotificationKind::BookingConfirmed);
        drop(delivered);

        // Nothing left; a second pass is a no-op
        let report = dispatcher.run_once().await.unwrap();
        assert_eq!(report, DispatchReport::default());
    }

    #[tokio::test]
    async fn test_failed_delivery_is_retried() {
        let (db, _) = db_with_confirmed_booking().await;

        let failing = Arc::new(MemorySink {
            fail: true,
            ..Default::default()
        });
        let dispatcher = NotificationDispatcher::new(db.clone(), failing, 10);

        let report = dispatcher.run_once().await.unwrap();
        assert_eq!(report.failed, 1);

        let pending = db.outbox().get_pending(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempts, 1);
        assert_eq!(pending[0].last_error.as_deref(), Some("smtp timeout"));

        // The entry is still there for a working sink
        let working = Arc::new(MemorySink::default());
        let dispatcher = NotificationDispatcher::new(db.clone(), working, 10);
        let report = dispatcher.run_once().await.unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(db.outbox().pending_count().await.unwrap(), 0);
    }
}
