/*!
 * Drives one job from its source artifact to a delivered translation.
 */

use log::{error, info};
use std::fmt;
use std::time::{Duration, Instant};

use crate::delivery::{ArtifactRef, DeliveryGateway};
use crate::errors::{PipelineError, TranslationError};
use crate::job::Job;
use crate::translation::{Chunker, Dispatcher, Document, reassemble};

use super::stage::{JobStage, StageTracker};

/// Summary of a completed job.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job_id: String,
    pub artifact: ArtifactRef,
    pub download_url: String,
    pub notified: bool,
    /// Lines after paragraph unwrapping; `None` when translation was skipped
    pub line_count: Option<usize>,
    pub chunk_count: Option<usize>,
    /// The artifact was found from an earlier attempt and only delivered
    pub resumed: bool,
    pub elapsed: Duration,
}

/// A job that did not complete.
#[derive(Debug)]
pub struct JobFailure {
    pub job_id: String,
    /// Last stage reached before the failure
    pub stage: JobStage,
    pub error: PipelineError,
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Job {} failed at stage {}: {}", self.job_id, self.stage, self.error)
    }
}

impl std::error::Error for JobFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Fetch, chunk, translate, reassemble and deliver.
#[derive(Debug, Clone)]
pub struct JobPipeline {
    chunker: Chunker,
    dispatcher: Dispatcher,
    gateway: DeliveryGateway,
    unwrap_paragraphs: bool,
}

impl JobPipeline {
    pub fn new(chunker: Chunker, dispatcher: Dispatcher, gateway: DeliveryGateway, unwrap_paragraphs: bool) -> Self {
        Self {
            chunker,
            dispatcher,
            gateway,
            unwrap_paragraphs,
        }
    }

    pub fn gateway(&self) -> &DeliveryGateway {
        &self.gateway
    }

    /// Process one job to completion or failure.
    pub async fn process(&self, job: &Job) -> Result<JobReport, JobFailure> {
        let started = Instant::now();
        let mut tracker = StageTracker::new(&job.job_id);

        match self.run(job, &mut tracker, started).await {
            Ok(report) => {
                info!(
                    "Job {} done in {:?}: {}{}",
                    job.job_id,
                    report.elapsed,
                    report.artifact,
                    if report.resumed { " (resumed)" } else { "" }
                );
                Ok(report)
            }
            Err(error) => {
                let stage = tracker.fail();
                error!("Job {} failed at stage {}: {}", job.job_id, stage, error);
                Err(JobFailure {
                    job_id: job.job_id.clone(),
                    stage,
                    error,
                })
            }
        }
    }

    async fn run(&self, job: &Job, tracker: &mut StageTracker, started: Instant) -> Result<JobReport, PipelineError> {
        if self.gateway.artifact_exists(job).await? {
            info!("Job {}: translation already stored, resuming at delivery", job.job_id);
            let receipt = self.gateway.publish(job, self.gateway.artifact_for(job)).await?;
            tracker.advance(JobStage::Delivered);
            tracker.advance(JobStage::Done);
            return Ok(JobReport {
                job_id: job.job_id.clone(),
                artifact: receipt.artifact,
                download_url: receipt.download_url,
                notified: receipt.notified,
                line_count: None,
                chunk_count: None,
                resumed: true,
                elapsed: started.elapsed(),
            });
        }

        let text = self.gateway.fetch_source(job).await?;
        let mut document = Document::from_text(&text);
        if self.unwrap_paragraphs {
            document = document.unwrap_paragraphs();
        }
        let line_count = document.line_count();
        tracker.advance(JobStage::Fetched);

        let chunks = self.chunker.chunk(&document);
        let chunk_count = chunks.len();
        info!("Job {}: {} lines in {} chunks", job.job_id, line_count, chunk_count);
        tracker.advance(JobStage::Chunked);

        tracker.advance(JobStage::Translating);
        let results = self
            .dispatcher
            .dispatch(chunks, line_count, &job.source_lang, &job.target_lang)
            .await?;

        let translated = reassemble(line_count, results, document.trailing_newline())?;
        if translated.line_count() != line_count {
            return Err(TranslationError::Reassembly(format!(
                "Translated document has {} lines, source has {}",
                translated.line_count(),
                line_count
            ))
            .into());
        }
        tracker.advance(JobStage::Reassembled);

        let artifact = self.gateway.store_artifact(job, translated.render()).await?;
        let receipt = self.gateway.publish(job, artifact).await?;
        tracker.advance(JobStage::Delivered);
        tracker.advance(JobStage::Done);

        Ok(JobReport {
            job_id: job.job_id.clone(),
            artifact: receipt.artifact,
            download_url: receipt.download_url,
            notified: receipt.notified,
            line_count: Some(line_count),
            chunk_count: Some(chunk_count),
            resumed: false,
            elapsed: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::{MemoryArtifactStore, MemoryNotifier};
    use crate::job::SourceLocation;
    use crate::providers::mock::MockBackend;
    use crate::translation::{ModelCatalog, ModelRouter};
    use std::sync::Arc;

    fn pipeline(backend: MockBackend, store: &MemoryArtifactStore, notifier: &MemoryNotifier) -> JobPipeline {
        let mut catalog = ModelCatalog::new();
        catalog.insert("en-vi", "models/en-vi");
        let router = ModelRouter::new(catalog, "m2m100", Vec::new(), ["en", "vi"].iter().map(|s| s.to_string()));
        let dispatcher = Dispatcher::new(Arc::new(router), Arc::new(backend), 4, Duration::from_secs(5));
        let gateway = DeliveryGateway::new(
            Arc::new(store.clone()),
            Arc::new(notifier.clone()),
            "books",
            Duration::from_secs(7 * 24 * 3600),
        );
        JobPipeline::new(Chunker::with_whitespace_tokenizer(512), dispatcher, gateway, false)
    }

    fn job() -> Job {
        Job {
            job_id: "j1".to_string(),
            source: SourceLocation::Stored {
                bucket: "books".to_string(),
                key: "tale.txt".to_string(),
            },
            source_lang: "en".to_string(),
            target_lang: "vi".to_string(),
            recipient: Some("reader@example.com".to_string()),
        }
    }

    #[tokio::test]
    async fn test_process_withExistingArtifact_shouldSkipTranslation() {
        let store = MemoryArtifactStore::new();
        let notifier = MemoryNotifier::new();
        let backend = MockBackend::working();
        store.insert("books", "tale_j1_translated.txt", "already done");

        let report = pipeline(backend.clone(), &store, &notifier).process(&job()).await.unwrap();

        assert!(report.resumed);
        assert_eq!(backend.call_count(), 0);
        assert_eq!(notifier.sent().len(), 1);
        assert_eq!(store.get("books", "tale_j1_translated.txt").unwrap(), "already done");
    }

    #[tokio::test]
    async fn test_process_withMissingSource_shouldFailAtReceived() {
        let failure = pipeline(MockBackend::working(), &MemoryArtifactStore::new(), &MemoryNotifier::new())
            .process(&job())
            .await
            .unwrap_err();

        assert_eq!(failure.stage, JobStage::Received);
        assert!(!failure.error.is_retryable());
    }

    #[tokio::test]
    async fn test_process_withStoreFailure_shouldFailAfterReassembly() {
        let store = MemoryArtifactStore::failing_writes();
        store.insert("books", "tale.txt", "Hello");
        let notifier = MemoryNotifier::new();

        let failure = pipeline(MockBackend::working(), &store, &notifier).process(&job()).await.unwrap_err();

        assert_eq!(failure.stage, JobStage::Reassembled);
        assert!(failure.error.is_retryable());
        assert!(notifier.sent().is_empty());
    }
}
