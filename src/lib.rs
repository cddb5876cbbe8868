/*!
 * # book-translator
 *
 * A queue-driven worker that translates plain-text books with local
 * machine-translation models.
 *
 * ## Features
 *
 * - At-least-once job consumption from a durable SQLite queue, with
 *   visibility timeouts, receipt handles and dead-lettering
 * - Line-preserving chunking under a token limit
 * - Per-language-pair model routing:
 *   - multilingual model for an override set of pairs
 *   - direct bilingual models from a static catalog
 *   - two-stage pivot through English
 *   - multilingual fallback
 * - Bounded-concurrency translation with position-keyed reassembly
 * - Artifact storage with signed, expiring download links and recipient
 *   notification
 *
 * ## Architecture
 *
 * - `app_config`: Configuration management
 * - `app_controller`: Wiring of configuration into the worker and CLI commands
 * - `database`: SQLite connection and schema backing the queue
 * - `queue`: Message queue trait, SQLite queue and job consumer
 * - `job`: Jobs and the queue message contract
 * - `translation`: Document model, chunker, router, dispatcher, reassembler
 * - `providers`: Translation backends (HTTP inference server, mock)
 * - `delivery`: Artifact stores, notifiers and the delivery gateway
 * - `pipeline`: Per-job state machine
 * - `worker`: Poll/process/acknowledge loop
 * - `language_utils`: ISO language code utilities
 * - `file_utils`: File system and object-key helpers
 * - `errors`: Error types
 */

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

pub mod app_config;
pub mod app_controller;
pub mod database;
pub mod delivery;
pub mod errors;
pub mod file_utils;
pub mod job;
pub mod language_utils;
pub mod pipeline;
pub mod providers;
pub mod queue;
pub mod translation;
pub mod worker;

// Re-export main types for easier usage
pub use app_config::Config;
pub use errors::{DecodeError, DeliveryError, PipelineError, ProviderError, QueueError, RoutingError, TranslationError};
pub use job::{Job, JobMessage, SourceLocation};
pub use language_utils::{get_language_name, normalize_to_part1};
pub use pipeline::{JobFailure, JobPipeline, JobReport, JobStage};
pub use worker::{PollOutcome, Worker, WorkerStats};
