/*!
 * Translation jobs and the queue message contract they are decoded from.
 *
 * Two message shapes exist: the storage-reference shape (`s3_bucket`,
 * `s3_key`/`file_key`) and the older inline shape carrying `file_content`.
 * The storage reference wins when both are present; inline content is
 * accepted for compatibility only.
 */

use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::DecodeError;
use crate::language_utils;

/// Where a job's source text lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// Object in artifact storage
    Stored { bucket: String, key: String },
    /// Text carried in the message itself (legacy)
    Inline { content: String },
}

/// One translation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub job_id: String,
    pub source: SourceLocation,
    pub source_lang: String,
    pub target_lang: String,
    pub recipient: Option<String>,
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job {} ({}->{})", self.job_id, self.source_lang, self.target_lang)
    }
}

/// Wire format of a queue message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_bucket: Option<String>,

    #[serde(default, alias = "file_key", skip_serializing_if = "Option::is_none")]
    pub s3_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,

    pub source_lang: String,

    pub target_lang: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_email: Option<String>,
}

impl JobMessage {
    /// Storage-reference message, the shape intake should produce
    pub fn stored(bucket: &str, key: &str, unique_id: &str, source_lang: &str, target_lang: &str) -> Self {
        Self {
            s3_bucket: Some(bucket.to_string()),
            s3_key: Some(key.to_string()),
            unique_id: Some(unique_id.to_string()),
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
            ..Default::default()
        }
    }

    pub fn with_recipient(mut self, recipient: Option<String>) -> Self {
        self.recipient_email = recipient;
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl Job {
    /// Decode and validate a raw queue message body.
    ///
    /// `message_id` becomes the job id when the message carries no `unique_id`,
    /// so every redelivery of the same message maps to the same artifact key.
    pub fn from_message_body(body: &str, default_bucket: &str, message_id: &str) -> Result<Self, DecodeError> {
        let message: JobMessage =
            serde_json::from_str(body).map_err(|e| DecodeError::Malformed(e.to_string()))?;
        Self::from_message(message, default_bucket, message_id)
    }

    /// Validate a decoded message
    pub fn from_message(message: JobMessage, default_bucket: &str, message_id: &str) -> Result<Self, DecodeError> {
        let source_lang = normalize_language(&message.source_lang)?;
        let target_lang = normalize_language(&message.target_lang)?;
        if source_lang == target_lang {
            return Err(DecodeError::SameLanguage(source_lang));
        }

        let job_id = match message.unique_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            Some(_) => return Err(DecodeError::Malformed("unique_id is empty".to_string())),
            None => message_id.to_string(),
        };

        let stored_key = message.s3_key.filter(|key| !key.trim().is_empty());
        let source = match (stored_key, message.file_content) {
            (Some(key), _) => SourceLocation::Stored {
                bucket: message
                    .s3_bucket
                    .filter(|b| !b.trim().is_empty())
                    .unwrap_or_else(|| default_bucket.to_string()),
                key,
            },
            (None, Some(content)) => {
                warn!("Job {} uses the legacy inline message shape", job_id);
                SourceLocation::Inline { content }
            }
            (None, None) => return Err(DecodeError::MissingSource),
        };

        let recipient = message
            .recipient_email
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        Ok(Self {
            job_id,
            source,
            source_lang,
            target_lang,
            recipient,
        })
    }
}

fn normalize_language(code: &str) -> Result<String, DecodeError> {
    language_utils::normalize_to_part1(code).map_err(|_| DecodeError::InvalidLanguage(code.to_string()))
}
