/*!
 * Concurrent chunk translation.
 *
 * All chunks of one job run through a bounded pool of in-flight model calls.
 * Completion order is arbitrary; every result keeps its line index and
 * position so reassembly is deterministic.
 */

use futures::stream::{self, StreamExt};
use log::{debug, error, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::errors::{ProviderError, TranslationError};
use crate::language_utils::PIVOT_LANGUAGE;
use crate::providers::{ModelSpec, TranslationBackend};

use super::document::{Chunk, ChunkContent, TranslationResult};
use super::router::{ModelRouter, TranslationPlan};

/// Per-job result store, one lock per line
#[derive(Debug)]
pub struct ResultCollector {
    lines: Vec<Mutex<Vec<(usize, String)>>>,
}

impl ResultCollector {
    pub fn new(line_count: usize) -> Self {
        Self {
            lines: (0..line_count).map(|_| Mutex::new(Vec::new())).collect(),
        }
    }

    /// Record one chunk's translation
    pub fn push(&self, line_index: usize, position: usize, text: String) -> Result<(), TranslationError> {
        let line = self.lines.get(line_index).ok_or_else(|| {
            TranslationError::Reassembly(format!(
                "Result for line {} but document has {} lines",
                line_index,
                self.lines.len()
            ))
        })?;
        line.lock().push((position, text));
        Ok(())
    }

    /// Take every collected result, grouped by line
    pub fn drain(&self) -> Vec<TranslationResult> {
        let mut results = Vec::new();
        for (line_index, line) in self.lines.iter().enumerate() {
            results.extend(line.lock().drain(..).map(|(position, text)| TranslationResult {
                line_index,
                position,
                text,
            }));
        }
        results
    }
}

/// What happened to one chunk
enum ChunkOutcome {
    Done,
    /// Not started because a sibling already failed
    Skipped,
    Failed(TranslationError),
}

/// Translation dispatcher with bounded concurrency
#[derive(Debug, Clone)]
pub struct Dispatcher {
    router: Arc<ModelRouter>,
    backend: Arc<dyn TranslationBackend>,
    max_concurrent_requests: usize,
    chunk_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        router: Arc<ModelRouter>,
        backend: Arc<dyn TranslationBackend>,
        max_concurrent_requests: usize,
        chunk_timeout: Duration,
    ) -> Self {
        Self {
            router,
            backend,
            max_concurrent_requests: max_concurrent_requests.max(1),
            chunk_timeout,
        }
    }

    pub fn router(&self) -> &ModelRouter {
        &self.router
    }

    /// Translate all chunks of a job.
    ///
    /// Fails with the first chunk error once every in-flight chunk has
    /// settled; chunks not yet started when a failure is seen are skipped.
    pub async fn dispatch(
        &self,
        chunks: Vec<Chunk>,
        line_count: usize,
        source_language: &str,
        target_language: &str,
    ) -> Result<Vec<TranslationResult>, TranslationError> {
        let plan = Arc::new(self.router.route(source_language, target_language)?);
        let collector = Arc::new(ResultCollector::new(line_count));
        let aborted = Arc::new(AtomicBool::new(false));
        let total = chunks.len();
        let start_time = Instant::now();

        debug!(
            "Dispatching {} chunks {}->{} ({}, {} workers)",
            total,
            source_language,
            target_language,
            plan.describe(),
            self.max_concurrent_requests
        );

        let outcomes = stream::iter(chunks)
            .map(|chunk| {
                let backend = self.backend.clone();
                let plan = plan.clone();
                let collector = collector.clone();
                let aborted = aborted.clone();
                let timeout = self.chunk_timeout;

                async move {
                    let Chunk {
                        line_index,
                        position,
                        content,
                    } = chunk;

                    let text = match content {
                        ChunkContent::Blank(original) => {
                            return match collector.push(line_index, position, original) {
                                Ok(()) => ChunkOutcome::Done,
                                Err(e) => ChunkOutcome::Failed(e),
                            };
                        }
                        ChunkContent::Text(text) => text,
                    };

                    if aborted.load(Ordering::SeqCst) {
                        return ChunkOutcome::Skipped;
                    }

                    let result = execute_plan(
                        backend.as_ref(),
                        &plan,
                        &text,
                        source_language,
                        target_language,
                        timeout,
                    )
                    .await;

                    match result {
                        Ok(translated) => match collector.push(line_index, position, translated) {
                            Ok(()) => ChunkOutcome::Done,
                            Err(e) => ChunkOutcome::Failed(e),
                        },
                        Err(source) => {
                            aborted.store(true, Ordering::SeqCst);
                            error!("Chunk {} of line {} failed: {}", position, line_index, source);
                            ChunkOutcome::Failed(TranslationError::Chunk {
                                line_index,
                                position,
                                source,
                            })
                        }
                    }
                }
            })
            .buffer_unordered(self.max_concurrent_requests)
            .collect::<Vec<_>>()
            .await;

        let mut first_error = None;
        let mut skipped = 0;
        for outcome in outcomes {
            match outcome {
                ChunkOutcome::Done => {}
                ChunkOutcome::Skipped => skipped += 1,
                ChunkOutcome::Failed(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(e) = first_error {
            if skipped > 0 {
                warn!("{} of {} chunks were not started after a failure", skipped, total);
            }
            return Err(e);
        }

        debug!("Dispatched {} chunks in {:?}", total, start_time.elapsed());
        Ok(collector.drain())
    }
}

/// Run one chunk through its plan; pivot stages run strictly in sequence
async fn execute_plan(
    backend: &dyn TranslationBackend,
    plan: &TranslationPlan,
    text: &str,
    source_language: &str,
    target_language: &str,
    timeout: Duration,
) -> Result<String, ProviderError> {
    match plan {
        TranslationPlan::MultilingualDirect(model)
        | TranslationPlan::BilingualDirect(model)
        | TranslationPlan::Fallback(model) => {
            call_model(backend, model, text, source_language, target_language, timeout).await
        }
        TranslationPlan::Pivot { to_english, from_english } => {
            let intermediate = call_model(backend, to_english, text, source_language, PIVOT_LANGUAGE, timeout).await?;
            call_model(backend, from_english, &intermediate, PIVOT_LANGUAGE, target_language, timeout).await
        }
    }
}

async fn call_model(
    backend: &dyn TranslationBackend,
    model: &ModelSpec,
    text: &str,
    source_language: &str,
    target_language: &str,
    timeout: Duration,
) -> Result<String, ProviderError> {
    tokio::time::timeout(timeout, backend.translate(model, text, source_language, target_language))
        .await
        .map_err(|_| ProviderError::Timeout(timeout))?
}
