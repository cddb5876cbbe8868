use anyhow::{Context, Result, anyhow};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::Path;
use std::sync::Arc;

use crate::app_config::{Config, NotificationMethod};
use crate::delivery::{ArtifactStore, DeliveryGateway, LocalArtifactStore, Notifier, OutboxNotifier, WebhookNotifier};
use crate::file_utils::FileManager;
use crate::job::JobMessage;
use crate::language_utils;
use crate::pipeline::JobPipeline;
use crate::providers::TranslationBackend;
use crate::providers::inference::HttpInferenceBackend;
use crate::queue::{MessageQueue, QueueConsumer, QueueStats, SqliteQueue};
use crate::translation::{Chunker, Dispatcher, ModelCatalog, ModelRouter};
use crate::worker::{Worker, WorkerStats};

// @module: Application controller wiring configuration to the worker and CLI commands

/// Result of an enqueue command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnqueueSummary {
    pub enqueued: Vec<String>,
    pub failed: usize,
}

/// Main application controller
pub struct Controller {
    // @field: App configuration
    config: Config,
}

impl Controller {
    // @method: Create a controller; the configuration must already be valid
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate().context("Invalid configuration")?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Open the SQLite queue named in the configuration
    pub fn open_queue(&self) -> Result<SqliteQueue> {
        let path = self.config.queue_database_path()?;
        SqliteQueue::open(&path).with_context(|| format!("Failed to open queue at {:?}", path))
    }

    /// Load the model catalog and check every advertised pivot has both stages
    pub fn build_router(&self) -> Result<ModelRouter> {
        let models = &self.config.models;
        let catalog = ModelCatalog::load(&models.model_names_path, &models.model_dir, &models.model_prefix)?;
        let router = ModelRouter::from_config(models, catalog);
        router.validate_pivots().context("Model catalog does not cover the supported languages")?;
        Ok(router)
    }

    pub fn build_backend(&self) -> Result<Arc<dyn TranslationBackend>> {
        let translation = &self.config.translation;
        let backend = HttpInferenceBackend::new(
            &translation.inference_endpoint,
            translation.chunk_timeout(),
            translation.retry_count,
            translation.retry_backoff_ms,
        )?;
        Ok(Arc::new(backend))
    }

    pub fn build_store(&self) -> Result<Arc<dyn ArtifactStore>> {
        let storage = &self.config.storage;
        if storage.link_secret.is_empty() {
            warn!("storage.link_secret is empty; download links are not protected");
        }
        let store = LocalArtifactStore::new(&storage.root_dir, &storage.link_base_url, &storage.link_secret)?;
        Ok(Arc::new(store))
    }

    pub fn build_notifier(&self) -> Result<Arc<dyn Notifier>> {
        let notification = &self.config.notification;
        let notifier: Arc<dyn Notifier> = match notification.method {
            NotificationMethod::Outbox => Arc::new(OutboxNotifier::new(&notification.outbox_dir, &notification.sender)),
            NotificationMethod::Webhook => Arc::new(WebhookNotifier::new(
                &notification.webhook_url,
                &notification.sender,
                std::time::Duration::from_secs(30),
            )?),
        };
        Ok(notifier)
    }

    /// Assemble a worker from explicit collaborators
    pub fn build_worker(
        &self,
        queue: Arc<dyn MessageQueue>,
        router: ModelRouter,
        backend: Arc<dyn TranslationBackend>,
        store: Arc<dyn ArtifactStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Worker {
        let config = &self.config;
        let consumer = QueueConsumer::new(queue, &config.queue, &config.storage.default_bucket);
        let dispatcher = Dispatcher::new(
            Arc::new(router),
            backend,
            config.translation.concurrent_requests,
            config.translation.chunk_timeout(),
        );
        let gateway = DeliveryGateway::new(store, notifier, &config.storage.default_bucket, config.storage.link_expiry());
        let pipeline = JobPipeline::new(
            Chunker::with_whitespace_tokenizer(config.translation.max_tokens_per_chunk),
            dispatcher,
            gateway,
            config.translation.unwrap_paragraphs,
        );

        Worker::new(
            consumer,
            pipeline,
            config.queue.idle_backoff(),
            config.notification.notify_on_failure,
        )
    }

    /// Run the worker until Ctrl-C
    pub async fn run_worker(&self) -> Result<WorkerStats> {
        let router = self.build_router()?;
        let backend = self.build_backend()?;
        if let Err(e) = backend.test_connection().await {
            warn!("Inference server is not reachable yet: {}", e);
        }
        let queue: Arc<dyn MessageQueue> = Arc::new(self.open_queue()?);
        let worker = self.build_worker(queue, router, backend, self.build_store()?, self.build_notifier()?);

        let stats = worker
            .run(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Failed to listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
                info!("Ctrl-C received, finishing current job");
            })
            .await;
        Ok(stats)
    }

    /// Upload a file, or every `.txt` file below a directory, and enqueue one job per file
    pub async fn enqueue_path(
        &self,
        path: &Path,
        source_lang: &str,
        target_lang: &str,
        recipient: Option<String>,
    ) -> Result<EnqueueSummary> {
        let source_lang = language_utils::normalize_to_part1(source_lang)?;
        let target_lang = language_utils::normalize_to_part1(target_lang)?;
        if source_lang == target_lang {
            return Err(anyhow!("Source and target language are both '{}'", source_lang));
        }

        let files = if path.is_dir() {
            FileManager::find_files(path, "txt")?
        } else if FileManager::file_exists(path) {
            vec![path.to_path_buf()]
        } else {
            return Err(anyhow!("Input path does not exist: {:?}", path));
        };
        if files.is_empty() {
            return Err(anyhow!("No .txt files found in {:?}", path));
        }

        let queue = self.open_queue()?;
        let store = self.build_store()?;
        let bucket = self.config.storage.default_bucket.clone();

        let progress = ProgressBar::new(files.len() as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress.set_style(style.progress_chars("#>-"));

        let mut summary = EnqueueSummary::default();
        for file in &files {
            let file_name = file
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| "book.txt".to_string());
            progress.set_message(file_name.clone());

            let unique_id = uuid::Uuid::new_v4().to_string();
            let key = FileManager::source_key(&file_name, &unique_id);
            let result = async {
                let content = tokio::fs::read(file)
                    .await
                    .with_context(|| format!("Failed to read {:?}", file))?;
                store.store(&bucket, &key, content.into()).await?;
                let message = JobMessage::stored(&bucket, &key, &unique_id, &source_lang, &target_lang)
                    .with_recipient(recipient.clone());
                queue.send(&message.to_json()).await?;
                Ok::<_, anyhow::Error>(())
            }
            .await;

            match result {
                Ok(()) => {
                    info!("Enqueued {} as job {}", file_name, unique_id);
                    summary.enqueued.push(unique_id);
                }
                Err(e) => {
                    error!("Failed to enqueue {}: {:#}", file_name, e);
                    summary.failed += 1;
                }
            }
            progress.inc(1);
        }
        progress.finish_with_message("done");

        Ok(summary)
    }

    pub async fn queue_stats(&self) -> Result<QueueStats> {
        Ok(self.open_queue()?.stats().await?)
    }
}
