/*!
 * SQLite-backed message queue.
 *
 * Visibility is a timestamp column: a message is receivable when
 * `visible_at <= now`. Receiving assigns a fresh receipt handle, so a
 * handle from an earlier receive stops working once the message has been
 * handed to someone else.
 */

use async_trait::async_trait;
use log::{debug, warn};
use rusqlite::{OptionalExtension, params};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::database::DatabaseConnection;
use crate::errors::QueueError;

use super::{MessageQueue, QueueMessage, QueueStats};

/// How often an empty long-poll re-checks the table
const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// Durable local queue
#[derive(Debug, Clone)]
pub struct SqliteQueue {
    db: DatabaseConnection,
}

impl SqliteQueue {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Ok(Self::new(DatabaseConnection::new(path)?))
    }

    pub fn in_memory() -> anyhow::Result<Self> {
        Ok(Self::new(DatabaseConnection::new_in_memory()?))
    }

    async fn try_receive(&self, visibility_timeout: Duration) -> Result<Option<QueueMessage>, QueueError> {
        let visibility = millis(visibility_timeout);

        let message = self
            .db
            .transaction_async(move |tx| {
                let now = now_millis();
                let candidate = tx
                    .query_row(
                        "SELECT id, body, receive_count FROM messages
                         WHERE visible_at <= ?1
                         ORDER BY enqueued_at, rowid
                         LIMIT 1",
                        params![now],
                        |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, u32>(2)?)),
                    )
                    .optional()?;

                let Some((message_id, body, receive_count)) = candidate else {
                    return Ok(None);
                };

                let receipt_handle = uuid::Uuid::new_v4().to_string();
                let receive_count = receive_count + 1;
                tx.execute(
                    "UPDATE messages SET receive_count = ?1, receipt_handle = ?2, visible_at = ?3 WHERE id = ?4",
                    params![receive_count, receipt_handle, now.saturating_add(visibility), message_id],
                )?;

                Ok(Some(QueueMessage {
                    message_id,
                    receipt_handle,
                    body,
                    receive_count,
                }))
            })
            .await?;

        Ok(message)
    }
}

#[async_trait]
impl MessageQueue for SqliteQueue {
    async fn send(&self, body: &str) -> Result<String, QueueError> {
        let message_id = uuid::Uuid::new_v4().to_string();
        let id = message_id.clone();
        let body = body.to_string();

        self.db
            .execute_async(move |conn| {
                let now = now_millis();
                conn.execute(
                    "INSERT INTO messages (id, body, enqueued_at, visible_at) VALUES (?1, ?2, ?3, ?3)",
                    params![id, body, now],
                )?;
                Ok(())
            })
            .await?;

        debug!("Enqueued message {}", message_id);
        Ok(message_id)
    }

    async fn receive(&self, visibility_timeout: Duration, wait: Duration) -> Result<Option<QueueMessage>, QueueError> {
        let deadline = Instant::now() + wait;

        loop {
            if let Some(message) = self.try_receive(visibility_timeout).await? {
                debug!(
                    "Received message {} (receive #{})",
                    message.message_id, message.receive_count
                );
                return Ok(Some(message));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        let handle = receipt_handle.to_string();
        let deleted = self
            .db
            .execute_async(move |conn| Ok(conn.execute("DELETE FROM messages WHERE receipt_handle = ?1", params![handle])?))
            .await?;

        if deleted == 0 {
            return Err(QueueError::StaleReceipt(receipt_handle.to_string()));
        }
        Ok(())
    }

    async fn extend_visibility(&self, receipt_handle: &str, visibility_timeout: Duration) -> Result<(), QueueError> {
        let handle = receipt_handle.to_string();
        let visibility = millis(visibility_timeout);
        let updated = self
            .db
            .execute_async(move |conn| {
                Ok(conn.execute(
                    "UPDATE messages SET visible_at = ?1 WHERE receipt_handle = ?2",
                    params![now_millis().saturating_add(visibility), handle],
                )?)
            })
            .await?;

        if updated == 0 {
            return Err(QueueError::StaleReceipt(receipt_handle.to_string()));
        }
        Ok(())
    }

    async fn dead_letter(&self, receipt_handle: &str, reason: &str) -> Result<(), QueueError> {
        let handle = receipt_handle.to_string();
        let reason = reason.to_string();
        let moved = self
            .db
            .transaction_async(move |tx| {
                let inserted = tx.execute(
                    "INSERT OR REPLACE INTO dead_letters (id, body, receive_count, reason, enqueued_at, dead_lettered_at)
                     SELECT id, body, receive_count, ?2, enqueued_at, ?3 FROM messages WHERE receipt_handle = ?1",
                    params![handle, reason, now_millis()],
                )?;
                tx.execute("DELETE FROM messages WHERE receipt_handle = ?1", params![handle])?;
                Ok(inserted > 0)
            })
            .await?;

        if !moved {
            warn!("Dead-letter request for unknown receipt {}", receipt_handle);
            return Err(QueueError::StaleReceipt(receipt_handle.to_string()));
        }
        Ok(())
    }

    async fn stats(&self) -> Result<QueueStats, QueueError> {
        let stats = self
            .db
            .execute_async(|conn| {
                let now = now_millis();
                let visible: i64 =
                    conn.query_row("SELECT COUNT(*) FROM messages WHERE visible_at <= ?1", params![now], |row| row.get(0))?;
                let in_flight: i64 =
                    conn.query_row("SELECT COUNT(*) FROM messages WHERE visible_at > ?1", params![now], |row| row.get(0))?;
                let dead_lettered: i64 = conn.query_row("SELECT COUNT(*) FROM dead_letters", [], |row| row.get(0))?;

                Ok(QueueStats {
                    visible: visible.max(0) as u64,
                    in_flight: in_flight.max(0) as u64,
                    dead_lettered: dead_lettered.max(0) as u64,
                })
            })
            .await?;

        Ok(stats)
    }
}
