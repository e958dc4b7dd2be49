//! # Notification Outbox Repository
//!
//! Order notifications are written here after an order commits and delivered
//! by a background drain.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  coordinator commit ──► order is durable                                │
//! │       │                                                                 │
//! │       ▼  (spawned, never awaited by the placement call)                 │
//! │  enqueue("order_confirmation", order_id, payload)                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  drain: pending() ──► send ──► mark_sent | mark_failed(attempts += 1)   │
//! │                                                                         │
//! │  A failed enqueue or send never touches the order.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;

/// An entry in the notification outbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationOutboxEntry {
    pub id: String,
    /// Notification type, e.g. `"order_confirmation"`.
    pub kind: String,
    pub order_id: String,
    /// JSON payload handed to the sender.
    pub payload: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub attempted_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// Repository for `notification_outbox`.
#[derive(Debug, Clone)]
pub struct NotificationOutboxRepository {
    pool: SqlitePool,
}

impl NotificationOutboxRepository {
    pub fn new(pool: SqlitePool) -> Self {
        NotificationOutboxRepository { pool }
    }

    /// Queues a notification.
    pub async fn enqueue(&self, kind: &str, order_id: &str, payload: &str) -> DbResult<NotificationOutboxEntry> {
        let entry = NotificationOutboxEntry {
            id: Uuid::new_v4().to_string(),
            kind: kind.to_string(),
            order_id: order_id.to_string(),
            payload: payload.to_string(),
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
            attempted_at: None,
            sent_at: None,
        };

        debug!(kind, order_id, id = %entry.id, "Queuing notification");

        sqlx::query(
            r#"
            INSERT INTO notification_outbox (
                id, kind, order_id, payload, attempts, last_error,
                created_at, attempted_at, sent_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.kind)
        .bind(&entry.order_id)
        .bind(&entry.payload)
        .bind(entry.attempts)
        .bind(&entry.last_error)
        .bind(entry.created_at)
        .bind(entry.attempted_at)
        .bind(entry.sent_at)
        .execute(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Unsent entries with fewer than `max_attempts` failures, oldest first.
    ///
    /// Exhausted entries stay in the table for inspection but never block
    /// newer ones.
    pub async fn pending(&self, limit: u32, max_attempts: i64) -> DbResult<Vec<NotificationOutboxEntry>> {
        let entries = sqlx::query_as(
            r#"
            SELECT id, kind, order_id, payload, attempts, last_error,
                   created_at, attempted_at, sent_at
            FROM notification_outbox
            WHERE sent_at IS NULL AND attempts < ?2
            ORDER BY created_at ASC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .bind(max_attempts)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Marks an entry as delivered.
    pub async fn mark_sent(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query("UPDATE notification_outbox SET sent_at = ?2, attempted_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Records a failed delivery attempt.
    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE notification_outbox SET
                attempts = attempts + 1,
                last_error = ?2,
                attempted_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts unsent entries.
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notification_outbox WHERE sent_at IS NULL")
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{DbConfig, Database};

    #[tokio::test]
    async fn test_enqueue_send_fail_cycle() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let outbox = db.notification_outbox();

        let first = outbox.enqueue("order_confirmation", "o-1", "{}").await.unwrap();
        let second = outbox.enqueue("order_confirmation", "o-2", "{}").await.unwrap();
        assert_eq!(outbox.count_pending().await.unwrap(), 2);

        outbox.mark_failed(&first.id, "smtp down").await.unwrap();
        outbox.mark_sent(&second.id).await.unwrap();

        let pending = outbox.pending(10, 5).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, first.id);
        assert_eq!(pending[0].attempts, 1);
        assert_eq!(pending[0].last_error.as_deref(), Some("smtp down"));

        // one attempt is the limit here, so the entry is exhausted
        assert!(outbox.pending(10, 1).await.unwrap().is_empty());
    }
}
