/*!
 * Storage and notification side of a job.
 */

use bytes::Bytes;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{DecodeError, DeliveryError, PipelineError};
use crate::file_utils::FileManager;
use crate::job::{Job, SourceLocation};

use super::{ArtifactStore, Notification, Notifier};

const SUCCESS_SUBJECT: &str = "Your book is ready!";
const FAILURE_SUBJECT: &str = "Your translation could not be completed";

/// Location of a stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub bucket: String,
    pub key: String,
}

impl std::fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Outcome of publishing a translated artifact
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub artifact: ArtifactRef,
    pub download_url: String,
    /// Whether the recipient was told
    pub notified: bool,
}

/// Reads sources, writes results and tells recipients about them
#[derive(Debug, Clone)]
pub struct DeliveryGateway {
    store: Arc<dyn ArtifactStore>,
    notifier: Arc<dyn Notifier>,
    default_bucket: String,
    link_expiry: Duration,
}

impl DeliveryGateway {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        notifier: Arc<dyn Notifier>,
        default_bucket: &str,
        link_expiry: Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            default_bucket: default_bucket.to_string(),
            link_expiry,
        }
    }

    /// Where a job's translation is stored.
    ///
    /// Derived from the source key and job id only, so a redelivered job
    /// always maps to the same object.
    pub fn artifact_for(&self, job: &Job) -> ArtifactRef {
        match &job.source {
            SourceLocation::Stored { bucket, key } => {
                let (prefix, file_name) = match key.rsplit_once('/') {
                    Some((prefix, name)) => (Some(prefix), name),
                    None => (None, key.as_str()),
                };
                let name = translated_name(file_name, &job.job_id);
                ArtifactRef {
                    bucket: bucket.clone(),
                    key: match prefix {
                        Some(prefix) if !prefix.is_empty() => format!("{}/{}", prefix, name),
                        _ => name,
                    },
                }
            }
            SourceLocation::Inline { .. } => ArtifactRef {
                bucket: self.default_bucket.clone(),
                key: translated_name("document", &job.job_id),
            },
        }
    }

    /// Source text of a job
    pub async fn fetch_source(&self, job: &Job) -> Result<String, PipelineError> {
        let (bucket, key) = match &job.source {
            SourceLocation::Inline { content } => return Ok(content.clone()),
            SourceLocation::Stored { bucket, key } => (bucket, key),
        };

        let content = match self.store.fetch(bucket, key).await {
            Ok(content) => content,
            Err(DeliveryError::NotFound { bucket, key }) => {
                return Err(DecodeError::UnreadableArtifact {
                    key: format!("{}/{}", bucket, key),
                    reason: "object does not exist".to_string(),
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        };

        debug!("Fetched source {}/{} ({} bytes)", bucket, key, content.len());
        String::from_utf8(content.to_vec()).map_err(|e| {
            DecodeError::UnreadableArtifact {
                key: format!("{}/{}", bucket, key),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Whether a previous attempt already stored this job's translation
    pub async fn artifact_exists(&self, job: &Job) -> Result<bool, DeliveryError> {
        let artifact = self.artifact_for(job);
        self.store.exists(&artifact.bucket, &artifact.key).await
    }

    pub async fn store_artifact(&self, job: &Job, content: String) -> Result<ArtifactRef, DeliveryError> {
        let artifact = self.artifact_for(job);
        self.store
            .store(&artifact.bucket, &artifact.key, Bytes::from(content))
            .await?;
        info!("Stored translation of job {} at {}", job.job_id, artifact);
        Ok(artifact)
    }

    /// Sign a download link and notify the recipient, if the job has one
    pub async fn publish(&self, job: &Job, artifact: ArtifactRef) -> Result<DeliveryReceipt, DeliveryError> {
        let download_url = self.store.presign(&artifact.bucket, &artifact.key, self.link_expiry)?;

        let notified = match &job.recipient {
            Some(recipient) => {
                let notification = Notification {
                    recipient: recipient.clone(),
                    subject: SUCCESS_SUBJECT.to_string(),
                    body: format!(
                        "Your processed book is ready. You can download it from: {} within {}",
                        download_url,
                        describe_expiry(self.link_expiry)
                    ),
                };
                self.notifier.send(&notification).await?;
                info!("Notified {} about job {}", recipient, job.job_id);
                true
            }
            None => {
                warn!("Job {} has no recipient; link is {}", job.job_id, download_url);
                false
            }
        };

        Ok(DeliveryReceipt {
            artifact,
            download_url,
            notified,
        })
    }

    /// Tell the recipient their job will not complete
    pub async fn notify_failure(&self, job: &Job, reason: &str) -> Result<bool, DeliveryError> {
        let Some(recipient) = &job.recipient else {
            return Ok(false);
        };

        let notification = Notification {
            recipient: recipient.clone(),
            subject: FAILURE_SUBJECT.to_string(),
            body: format!(
                "We could not translate your book from {} to {} (request {}).\n\nReason: {}\n\nPlease try uploading it again.",
                job.source_lang, job.target_lang, job.job_id, reason
            ),
        };
        self.notifier.send(&notification).await?;
        info!("Sent failure notice for job {} to {}", job.job_id, recipient);
        Ok(true)
    }
}

fn translated_name(file_name: &str, job_id: &str) -> String {
    format!(
        "{}_{}_translated.txt",
        FileManager::sanitize_stem(file_name),
        FileManager::sanitize_component(job_id)
    )
}

fn describe_expiry(expiry: Duration) -> String {
    const DAY: u64 = 24 * 60 * 60;
    let plural = |n: u64, unit: &str| if n == 1 { format!("1 {}", unit) } else { format!("{} {}s", n, unit) };
    match expiry.as_secs() {
        s if s % DAY == 0 => plural(s / DAY, "day"),
        s if s >= 3600 => plural(s / 3600, "hour"),
        s => plural((s / 60).max(1), "minute"),
    }
}
