/*!
 * Error types for the book-translator worker.
 *
 * Each collaborator seam gets its own error enum so the orchestrator can tell
 * a malformed message (discard) apart from a failed translation (retry via
 * redelivery) or a failed delivery.
 */

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when calling a translation backend
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the inference server itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The model did not answer within the per-call budget
    #[error("Model call timed out after {0:?}")]
    Timeout(Duration),
}

impl ProviderError {
    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionError(_) | Self::RequestFailed(_) => true,
            Self::ApiError { status_code, .. } => *status_code == 429 || *status_code >= 500,
            Self::ParseError(_) | Self::Timeout(_) => false,
        }
    }
}

/// Errors raised while turning a queue message into a job
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Message body is not valid JSON or misses required fields
    #[error("Malformed job message: {0}")]
    Malformed(String),

    /// Message carries neither a storage reference nor inline content
    #[error("Job message has no source artifact")]
    MissingSource,

    /// Language code is unknown
    #[error("Invalid language code: {0}")]
    InvalidLanguage(String),

    /// Source and target language are the same
    #[error("Source and target language are both '{0}'")]
    SameLanguage(String),

    /// Source artifact could not be decoded as UTF-8 text
    #[error("Unreadable artifact '{key}': {reason}")]
    UnreadableArtifact {
        /// Storage key of the artifact
        key: String,
        /// Why decoding failed
        reason: String,
    },
}

/// Errors raised by the model router
#[derive(Error, Debug)]
pub enum RoutingError {
    /// A plan stage requires a model that is not in the catalog
    #[error("No model registered for {0}")]
    MissingModel(String),

    /// The catalog does not cover every pivot the supported set advertises
    #[error("Model catalog is missing pivot stages: {}", .0.join(", "))]
    IncompleteCatalog(Vec<String>),

    /// Model name file could not be parsed
    #[error("Invalid model mapping at line {line}: {reason}")]
    InvalidMapping {
        /// 1-based line number in the mapping file
        line: usize,
        /// What was wrong with it
        reason: String,
    },
}

/// Errors that can occur during translation of a job's chunks
#[derive(Error, Debug)]
pub enum TranslationError {
    /// A single chunk failed; the whole job fails with it
    #[error("Chunk {position} of line {line_index} failed: {source}")]
    Chunk {
        /// Line the chunk came from
        line_index: usize,
        /// Position of the chunk within its line
        position: usize,
        /// Underlying backend error
        #[source]
        source: ProviderError,
    },

    /// Routing could not produce a usable plan
    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    /// Results could not be put back together
    #[error("Reassembly error: {0}")]
    Reassembly(String),
}

/// Errors that can occur while storing or announcing a translated artifact
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// Artifact storage failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Source artifact does not exist
    #[error("Artifact not found: {bucket}/{key}")]
    NotFound {
        /// Bucket name
        bucket: String,
        /// Object key
        key: String,
    },

    /// Download link could not be generated
    #[error("Link generation failed: {0}")]
    Link(String),

    /// Notification could not be sent
    #[error("Notification failed: {0}")]
    Notification(String),
}

/// Errors raised by the queue backend
#[derive(Error, Debug)]
pub enum QueueError {
    /// Backend storage failed
    #[error("Queue backend error: {0}")]
    Backend(String),

    /// The receipt handle is no longer valid (visibility window expired)
    #[error("Stale receipt handle: {0}")]
    StaleReceipt(String),
}

impl From<rusqlite::Error> for QueueError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Backend(error.to_string())
    }
}

impl From<anyhow::Error> for QueueError {
    fn from(error: anyhow::Error) -> Self {
        Self::Backend(error.to_string())
    }
}

/// Error for any stage of the job pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Message or artifact could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Translation failed
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Delivery failed
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),
}

impl PipelineError {
    /// Whether redelivering the message may succeed.
    ///
    /// Decode, routing and reassembly failures fail the same way on every
    /// attempt. Backend failures are retried when transient or timed out.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Decode(_) => false,
            Self::Translation(TranslationError::Chunk { source, .. }) => {
                source.is_transient() || matches!(source, ProviderError::Timeout(_))
            }
            Self::Translation(TranslationError::Routing(_) | TranslationError::Reassembly(_)) => false,
            Self::Delivery(_) => true,
        }
    }
}
