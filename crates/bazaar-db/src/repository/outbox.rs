//! # Notification Outbox Repository
//!
//! Transactional outbox for confirmation events.
//!
//! ## Delivery Semantics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Enqueue: exactly once                                                  │
//! │    The outbox row is written in the SAME transaction that confirms      │
//! │    the order/booking, and entity_id is UNIQUE. Either both the status   │
//! │    flip and the event exist, or neither does.                           │
//! │                                                                         │
//! │  Dispatch: at least once                                                │
//! │    The dispatcher may crash between handing the event to the email      │
//! │    collaborator and marking it dispatched. Downstream dedupes on        │
//! │    entity_id.                                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use bazaar_core::{NotificationKind, NotificationOutboxEntry};

/// Repository for notification outbox operations.
#[derive(Debug, Clone)]
pub struct OutboxRepository {
    pool: SqlitePool,
}

impl OutboxRepository {
    /// Creates a new OutboxRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OutboxRepository { pool }
    }

    /// Gets undispatched entries, oldest first.
    pub async fn get_pending(&self, limit: u32) -> DbResult<Vec<NotificationOutboxEntry>> {
        let entries = sqlx::query_as::<_, NotificationOutboxEntry>(
            r#"
            SELECT * FROM notification_outbox
            WHERE dispatched_at IS NULL
            ORDER BY created_at
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Marks an entry as successfully dispatched.
    pub async fn mark_dispatched(&self, id: &str, now: DateTime<Utc>) -> DbResult<()> {
        debug!(entry_id = %id, "Marking outbox entry dispatched");

        let result = sqlx::query(
            r#"
            UPDATE notification_outbox
            SET dispatched_at = ?2, attempts = attempts + 1, last_error = NULL
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(now.timestamp())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Outbox entry", id));
        }

        Ok(())
    }

    /// Records a failed delivery attempt. The entry stays pending and will
    /// be retried on the next dispatcher pass.
    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        debug!(entry_id = %id, error = %error, "Marking outbox entry failed");

        let result = sqlx::query(
            r#"
            UPDATE notification_outbox
            SET attempts = attempts + 1, last_error = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Outbox entry", id));
        }

        Ok(())
    }

    /// Number of undispatched entries (for diagnostics).
    pub async fn pending_count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notification_outbox WHERE dispatched_at IS NULL",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

/// Enqueues an outbox entry on an open connection.
///
/// Called from inside the order/booking confirm transactions so the event
/// commits or rolls back together with the status flip. `entity_id` is
/// UNIQUE: a double-enqueue for the same entity is a `UniqueViolation`.
pub(crate) async fn enqueue_on(
    conn: &mut SqliteConnection,
    kind: NotificationKind,
    entity_id: &str,
    recipient_email: &str,
    payload: &str,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO notification_outbox (
            id, kind, entity_id, recipient_email, payload,
            attempts, last_error, created_at, dispatched_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, 0, NULL, ?6, NULL)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(kind)
    .bind(entity_id)
    .bind(recipient_email)
    .bind(payload)
    .bind(now.timestamp())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
