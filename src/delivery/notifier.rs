/*!
 * Notification channels.
 */

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info};
use parking_lot::Mutex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::DeliveryError;
use crate::file_utils::FileManager;

use super::{Notification, Notifier};

/// Writes each notification as an RFC 5322 message into an outbox directory
/// for a mail relay to pick up.
#[derive(Debug, Clone)]
pub struct OutboxNotifier {
    dir: PathBuf,
    sender: String,
}

impl OutboxNotifier {
    pub fn new<P: AsRef<Path>>(dir: P, sender: &str) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            sender: sender.to_string(),
        }
    }

    fn render(&self, notification: &Notification) -> String {
        format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\nDate: {}\r\nMIME-Version: 1.0\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{}\r\n",
            self.sender,
            notification.recipient,
            notification.subject,
            Utc::now().to_rfc2822(),
            notification.body.replace('\n', "\r\n")
        )
    }
}

#[async_trait]
impl Notifier for OutboxNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), DeliveryError> {
        let file_name = format!("{}_{}.eml", Utc::now().format("%Y%m%dT%H%M%S%3f"), uuid::Uuid::new_v4());
        let path = self.dir.join(file_name);

        FileManager::write_atomic(&path, self.render(notification).as_bytes())
            .await
            .map_err(|e| DeliveryError::Notification(format!("{:#}", e)))?;

        info!("Queued notification to {} in {:?}", notification.recipient, path);
        Ok(())
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Posts notifications as JSON to an HTTP endpoint
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    sender: String,
}

impl WebhookNotifier {
    pub fn new(url: &str, sender: &str, timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::Notification(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.to_string(),
            sender: sender.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), DeliveryError> {
        let payload = WebhookPayload {
            from: &self.sender,
            to: &notification.recipient,
            subject: &notification.subject,
            body: &notification.body,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Notification(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Notification(format!("Webhook answered {}: {}", status, text)));
        }

        debug!("Webhook accepted notification to {}", notification.recipient);
        Ok(())
    }
}

/// Records notifications instead of sending them
#[derive(Debug, Clone, Default)]
pub struct MemoryNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    failing: bool,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), DeliveryError> {
        if self.failing {
            return Err(DeliveryError::Notification("notifier unavailable".to_string()));
        }
        self.sent.lock().push(notification.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification() -> Notification {
        Notification {
            recipient: "reader@example.com".to_string(),
            subject: "Your book is ready!".to_string(),
            body: "line one\nline two".to_string(),
        }
    }

    #[tokio::test]
    async fn test_outboxNotifier_shouldWriteEmlFile() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = OutboxNotifier::new(dir.path().join("outbox"), "noreply@example.com");

        notifier.send(&notification()).await.unwrap();

        let files: Vec<_> = std::fs::read_dir(dir.path().join("outbox")).unwrap().filter_map(|e| e.ok()).collect();
        assert_eq!(files.len(), 1);
        assert!(files[0].file_name().to_string_lossy().ends_with(".eml"));

        let content = std::fs::read_to_string(files[0].path()).unwrap();
        assert!(content.starts_with("From: noreply@example.com\r\nTo: reader@example.com\r\n"));
        assert!(content.contains("Subject: Your book is ready!\r\n"));
        assert!(content.contains("line one\r\nline two"));
    }

    #[tokio::test]
    async fn test_memoryNotifier_shouldRecordOrFail() {
        let notifier = MemoryNotifier::new();
        notifier.send(&notification()).await.unwrap();
        assert_eq!(notifier.sent().len(), 1);

        assert!(MemoryNotifier::failing().send(&notification()).await.is_err());
    }

    #[tokio::test]
    async fn test_webhookNotifier_withUnreachableEndpoint_shouldFail() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/notify", "noreply@example.com", Duration::from_secs(2)).unwrap();
        assert!(matches!(notifier.send(&notification()).await, Err(DeliveryError::Notification(_))));
    }
}
