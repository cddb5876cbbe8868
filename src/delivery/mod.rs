/*!
 * Delivery of translated artifacts.
 *
 * - `storage`: artifact stores (local filesystem, in-memory)
 * - `notifier`: notification channels (outbox, webhook, in-memory)
 * - `gateway`: fetches sources, stores results, signs links and notifies
 */

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt::Debug;
use std::time::Duration;

use crate::errors::DeliveryError;

pub mod gateway;
pub mod notifier;
pub mod storage;

pub use gateway::{ArtifactRef, DeliveryGateway, DeliveryReceipt};
pub use notifier::{MemoryNotifier, OutboxNotifier, WebhookNotifier};
pub use storage::{LocalArtifactStore, MemoryArtifactStore};

/// Object storage for source and translated artifacts
#[async_trait]
pub trait ArtifactStore: Send + Sync + Debug {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Bytes, DeliveryError>;

    /// Write an object; readers never observe a partial write
    async fn store(&self, bucket: &str, key: &str, content: Bytes) -> Result<(), DeliveryError>;

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, DeliveryError>;

    /// Time-limited download link for an object
    fn presign(&self, bucket: &str, key: &str, expires_in: Duration) -> Result<String, DeliveryError>;
}

/// A message to a job's recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Channel notifications are sent through
#[async_trait]
pub trait Notifier: Send + Sync + Debug {
    async fn send(&self, notification: &Notification) -> Result<(), DeliveryError>;
}
