/*!
 * Translation core: from a document to translated lines.
 *
 * - `document`: documents, chunks and translation results
 * - `chunker`: line-preserving, token-bounded chunking
 * - `router`: model catalog and per-pair translation plans
 * - `dispatcher`: bounded-concurrency chunk translation
 * - `reassembler`: position-keyed reconstruction of the document
 */

// Re-export main types for easier usage
pub use self::chunker::{Chunker, Tokenizer, WhitespaceTokenizer};
pub use self::dispatcher::{Dispatcher, ResultCollector};
pub use self::document::{Chunk, ChunkContent, Document, TranslatedDocument, TranslationResult};
pub use self::reassembler::reassemble;
pub use self::router::{ModelCatalog, ModelRouter, TranslationPlan};

// Submodules
pub mod chunker;
pub mod dispatcher;
pub mod document;
pub mod reassembler;
pub mod router;
