//! # Resource Repository
//!
//! Database operations for the slot calendar's bookable resources.
//!
//! Slots are not pre-materialized rows. A slot is just a half-open interval
//! against a resource, and its availability is computed on demand: the count
//! of bookings holding an overlapping interval versus the resource capacity.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use bazaar_core::Resource;

/// Repository for bookable-resource operations.
#[derive(Debug, Clone)]
pub struct ResourceRepository {
    pool: SqlitePool,
}

impl ResourceRepository {
    /// Creates a new ResourceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ResourceRepository { pool }
    }

    /// Inserts a new resource.
    pub async fn insert(&self, resource: &Resource) -> DbResult<()> {
        debug!(id = %resource.id, name = %resource.name, "Inserting resource");

        sqlx::query(
            r#"
            INSERT INTO resources (id, name, capacity, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&resource.id)
        .bind(&resource.name)
        .bind(resource.capacity)
        .bind(resource.is_active)
        .bind(resource.created_at.timestamp())
        .bind(resource.updated_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a resource by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Resource>> {
        let resource = sqlx::query_as::<_, Resource>("SELECT * FROM resources WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(resource)
    }

    /// Lists active resources, sorted by name.
    pub async fn list_active(&self) -> DbResult<Vec<Resource>> {
        let resources = sqlx::query_as::<_, Resource>(
            "SELECT * FROM resources WHERE is_active = 1 ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(resources)
    }

    /// Deactivates a resource. Existing bookings stay; new holds are refused.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deactivating resource");

        let result = sqlx::query(
            "UPDATE resources SET is_active = 0, updated_at = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Resource", id));
        }

        Ok(())
    }

    /// Counts the bookings holding an interval overlapping `[start, end)`.
    ///
    /// A booking holds its interval if it is confirmed, or pending with an
    /// unexpired ttl. Advisory for display; the hold statement re-checks.
    pub async fn holding_count(
        &self,
        resource_id: &str,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM bookings
            WHERE resource_id = ?1
              AND start_at < ?3
              AND ?2 < end_at
              AND (
                  status = 'confirmed'
                  OR (status = 'pending' AND expires_at > ?4)
              )
            "#,
        )
        .bind(resource_id)
        .bind(start_at.timestamp())
        .bind(end_at.timestamp())
        .bind(now.timestamp())
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Whether a slot has remaining capacity for `[start, end)`.
    ///
    /// ## Returns
    /// * `Ok(Some(true/false))` - Resource exists and is active
    /// * `Ok(None)` - Resource missing or inactive
    pub async fn slot_available(
        &self,
        resource_id: &str,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DbResult<Option<bool>> {
        let Some(resource) = self.get_by_id(resource_id).await? else {
            return Ok(None);
        };
        if !resource.is_active {
            return Ok(None);
        }

        let holding = self
            .holding_count(resource_id, start_at, end_at, now)
            .await?;

        Ok(Some(holding < resource.capacity))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
