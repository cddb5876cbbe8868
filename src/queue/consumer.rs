/*!
 * Turns raw queue messages into jobs.
 */

use log::{debug, error, warn};
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::QueueConfig;
use crate::errors::QueueError;
use crate::job::Job;

use super::{MessageQueue, QueueMessage};

/// A decoded job together with the receipt needed to acknowledge it
#[derive(Debug, Clone)]
pub struct Delivery {
    pub job: Job,
    pub receipt_handle: String,
    pub receive_count: u32,
}

/// Polls the queue and hands out decoded jobs
#[derive(Debug, Clone)]
pub struct QueueConsumer {
    queue: Arc<dyn MessageQueue>,
    visibility_timeout: Duration,
    poll_wait: Duration,
    max_receive_count: u32,
    default_bucket: String,
}

impl QueueConsumer {
    pub fn new(queue: Arc<dyn MessageQueue>, config: &QueueConfig, default_bucket: &str) -> Self {
        Self {
            queue,
            visibility_timeout: config.visibility_timeout(),
            poll_wait: config.poll_wait(),
            max_receive_count: config.max_receive_count.max(1),
            default_bucket: default_bucket.to_string(),
        }
    }

    pub fn queue(&self) -> &Arc<dyn MessageQueue> {
        &self.queue
    }

    pub fn visibility_timeout(&self) -> Duration {
        self.visibility_timeout
    }

    pub fn max_receive_count(&self) -> u32 {
        self.max_receive_count
    }

    /// Next decodable job, or `None` when the queue stayed empty for the poll wait.
    ///
    /// Undecodable messages and messages received too often are moved to the
    /// dead-letter table here and never reach the pipeline.
    pub async fn poll(&self) -> Result<Option<Delivery>, QueueError> {
        loop {
            let Some(message) = self.queue.receive(self.visibility_timeout, self.poll_wait).await? else {
                return Ok(None);
            };

            if message.receive_count > self.max_receive_count {
                warn!(
                    "Message {} was received {} times, moving it to dead letters",
                    message.message_id, message.receive_count
                );
                self.discard(&message, "exceeded maximum receive count").await?;
                continue;
            }

            match Job::from_message_body(&message.body, &self.default_bucket, &message.message_id) {
                Ok(job) => {
                    debug!("Decoded {} from message {}", job, message.message_id);
                    return Ok(Some(Delivery {
                        job,
                        receipt_handle: message.receipt_handle,
                        receive_count: message.receive_count,
                    }));
                }
                Err(e) => {
                    error!("Discarding message {}: {}", message.message_id, e);
                    self.discard(&message, &e.to_string()).await?;
                }
            }
        }
    }

    /// Delete a finished job's message
    pub async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        self.queue.delete(&delivery.receipt_handle).await
    }

    /// Keep a job in flight for another visibility window
    pub async fn extend(&self, delivery: &Delivery) -> Result<(), QueueError> {
        self.queue
            .extend_visibility(&delivery.receipt_handle, self.visibility_timeout)
            .await
    }

    /// Give up on a job for good
    pub async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> Result<(), QueueError> {
        self.queue.dead_letter(&delivery.receipt_handle, reason).await
    }

    /// Whether a failed delivery will come back for another attempt
    pub fn has_attempts_left(&self, delivery: &Delivery) -> bool {
        delivery.receive_count < self.max_receive_count
    }

    async fn discard(&self, message: &QueueMessage, reason: &str) -> Result<(), QueueError> {
        match self.queue.dead_letter(&message.receipt_handle, reason).await {
            Err(QueueError::StaleReceipt(_)) => {
                warn!("Message {} was re-received before it could be discarded", message.message_id);
                Ok(())
            }
            other => other,
        }
    }
}
