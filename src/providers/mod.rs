/*!
 * Translation backends.
 *
 * The translation capability is opaque to the pipeline: given a model
 * variant, a text and a language pair it returns translated text.
 * - `inference`: HTTP client for a model server
 * - `mock`: scripted backend for tests and dry runs
 */

use async_trait::async_trait;
use std::fmt::{self, Debug, Display};

use crate::errors::ProviderError;

/// A model variant exposed by the translation capability
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModelSpec {
    /// Any-to-any model; the language pair travels with the request
    Multilingual {
        /// Model identifier
        id: String,
    },
    /// Model trained for exactly one direction
    Bilingual {
        /// Catalog key, e.g. `fr-en`
        pair: String,
        /// Resolved model location
        path: String,
    },
}

impl ModelSpec {
    /// Identifier sent to the inference server
    pub fn model_id(&self) -> &str {
        match self {
            Self::Multilingual { id } => id,
            Self::Bilingual { path, .. } => path,
        }
    }

    pub fn is_multilingual(&self) -> bool {
        matches!(self, Self::Multilingual { .. })
    }
}

impl Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Multilingual { id } => write!(f, "multilingual({})", id),
            Self::Bilingual { pair, .. } => write!(f, "bilingual({})", pair),
        }
    }
}

/// Common trait for all translation backends
///
/// Implementations must be shareable across the dispatcher's workers.
#[async_trait]
pub trait TranslationBackend: Send + Sync + Debug {
    /// Translate one text with one model
    ///
    /// # Arguments
    /// * `model` - The model variant to run
    /// * `text` - Source text, already bounded by the chunker
    /// * `source_language` - ISO 639-1 source code
    /// * `target_language` - ISO 639-1 target code
    async fn translate(
        &self,
        model: &ModelSpec,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, ProviderError>;

    /// Test the connection to the backend
    async fn test_connection(&self) -> Result<(), ProviderError>;
}

pub mod inference;
pub mod mock;
