/*!
 * Job queue with at-least-once delivery.
 *
 * A received message stays invisible for the visibility timeout and becomes
 * receivable again unless it is deleted with its receipt handle first. The
 * worker deletes only after a job has been delivered.
 */

use async_trait::async_trait;
use serde::Serialize;
use std::fmt::{self, Debug};
use std::time::Duration;

use crate::errors::QueueError;

pub mod consumer;
pub mod sqlite;

pub use consumer::{Delivery, QueueConsumer};
pub use sqlite::SqliteQueue;

/// A message handed out by `receive`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: String,
    /// Valid until the message is received again by someone else
    pub receipt_handle: String,
    pub body: String,
    /// Includes the current receive
    pub receive_count: u32,
}

/// Snapshot of queue depth
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub visible: u64,
    pub in_flight: u64,
    pub dead_lettered: u64,
}

impl fmt::Display for QueueStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Visible: {}, In flight: {}, Dead-lettered: {}",
            self.visible, self.in_flight, self.dead_lettered
        )
    }
}

/// Message queue operations the worker depends on
#[async_trait]
pub trait MessageQueue: Send + Sync + Debug {
    /// Enqueue a message body; returns the message id
    async fn send(&self, body: &str) -> Result<String, QueueError>;

    /// Receive at most one message, waiting up to `wait` for one to appear
    async fn receive(&self, visibility_timeout: Duration, wait: Duration) -> Result<Option<QueueMessage>, QueueError>;

    /// Delete a received message
    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError>;

    /// Push the message's visibility deadline to `now + visibility_timeout`
    async fn extend_visibility(&self, receipt_handle: &str, visibility_timeout: Duration) -> Result<(), QueueError>;

    /// Move a received message out of the live queue
    async fn dead_letter(&self, receipt_handle: &str, reason: &str) -> Result<(), QueueError>;

    async fn stats(&self) -> Result<QueueStats, QueueError>;
}
