/*!
 * Common test utilities for the book-translator test suite
 */

use std::sync::Arc;

use book_translator::app_config::Config;
use book_translator::app_controller::Controller;
use book_translator::delivery::{MemoryArtifactStore, MemoryNotifier};
use book_translator::job::JobMessage;
use book_translator::providers::mock::MockBackend;
use book_translator::queue::{MessageQueue, SqliteQueue};
use book_translator::translation::{ModelCatalog, ModelRouter};
use book_translator::worker::Worker;

/// Bucket every test job is stored in
pub const BUCKET: &str = "books";

/// Model mapping used across the suite
pub const MODEL_NAMES: &str = "\
en-vi=opus-mt-en-vi
en-ko=opus-mt-tc-big-en-ko
fr-en=opus-mt-fr-en
en-de=opus-mt-en-de
";

/// Route test output through env_logger; repeated calls are ignored
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Configuration tuned for fast tests: no poll wait, no idle backoff
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.queue.poll_wait_secs = 0;
    config.queue.idle_backoff_secs = 0;
    config.queue.visibility_timeout_secs = 30;
    config.queue.max_receive_count = 3;
    config.translation.max_tokens_per_chunk = 8;
    config.translation.concurrent_requests = 4;
    config.storage.default_bucket = BUCKET.to_string();
    config
}

/// Router over `MODEL_NAMES` with the configured overrides and languages
pub fn test_router(config: &Config) -> ModelRouter {
    let catalog = ModelCatalog::parse(MODEL_NAMES, "models", "ct2fast-").expect("valid model mapping");
    ModelRouter::from_config(&config.models, catalog)
}

/// A worker wired to in-memory collaborators that tests can inspect
pub struct TestHarness {
    pub worker: Worker,
    pub queue: Arc<SqliteQueue>,
    pub store: MemoryArtifactStore,
    pub notifier: MemoryNotifier,
    pub backend: MockBackend,
}

impl TestHarness {
    pub fn new(backend: MockBackend) -> Self {
        Self::with_parts(test_config(), backend, MemoryArtifactStore::new(), MemoryNotifier::new())
    }

    pub fn with_parts(config: Config, backend: MockBackend, store: MemoryArtifactStore, notifier: MemoryNotifier) -> Self {
        init_logging();
        let controller = Controller::with_config(config).expect("valid test config");
        let queue = Arc::new(SqliteQueue::in_memory().expect("in-memory queue"));
        let worker = controller.build_worker(
            queue.clone(),
            test_router(controller.config()),
            Arc::new(backend.clone()),
            Arc::new(store.clone()),
            Arc::new(notifier.clone()),
        );

        Self {
            worker,
            queue,
            store,
            notifier,
            backend,
        }
    }

    /// Upload a source text and enqueue a job for it
    pub async fn submit(&self, key: &str, text: &str, job_id: &str, source: &str, target: &str, recipient: Option<&str>) {
        self.store.insert(BUCKET, key, text.to_string());
        let message =
            JobMessage::stored(BUCKET, key, job_id, source, target).with_recipient(recipient.map(|r| r.to_string()));
        self.queue.send(&message.to_json()).await.expect("send job");
    }

    /// Translated artifact as text
    pub fn artifact(&self, key: &str) -> Option<String> {
        self.store
            .get(BUCKET, key)
            .map(|bytes| String::from_utf8_lossy(&bytes).to_string())
    }
}
