/*!
 * Full lifecycle on disk: enqueue through the controller, then let a worker
 * built from the same configuration translate and deliver.
 */

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use book_translator::app_config::Config;
use book_translator::app_controller::Controller;
use book_translator::delivery::LocalArtifactStore;
use book_translator::file_utils::FileManager;
use book_translator::providers::mock::MockBackend;
use book_translator::worker::PollOutcome;

use crate::common;

fn on_disk_config(dir: &Path) -> Config {
    let mut config = common::test_config();
    config.queue.database_path = Some(dir.join("queue.db"));
    config.storage.root_dir = dir.join("storage");
    config.storage.link_secret = "lifecycle-secret".to_string();
    config.notification.outbox_dir = dir.join("outbox");
    config
}

#[tokio::test]
async fn test_enqueueThenWork_withLocalStack_shouldWriteArtifactAndOutboxMail() -> Result<()> {
    common::init_logging();
    let dir = tempfile::tempdir()?;
    let book = dir.path().join("novel.txt");
    std::fs::write(&book, "It was a dark night.\n\nThe end.\n")?;

    let controller = Controller::with_config(on_disk_config(dir.path()))?;
    let summary = controller
        .enqueue_path(&book, "eng", "vie", Some("reader@example.com".to_string()))
        .await?;
    assert_eq!(summary.enqueued.len(), 1);
    let job_id = &summary.enqueued[0];

    let worker = controller.build_worker(
        Arc::new(controller.open_queue()?),
        common::test_router(controller.config()),
        Arc::new(MockBackend::working()),
        controller.build_store()?,
        controller.build_notifier()?,
    );

    let PollOutcome::Completed(report) = worker.run_once().await? else {
        panic!("expected the enqueued job to complete");
    };
    assert_eq!(&report.job_id, job_id);
    assert!(report.artifact.key.ends_with(&format!("_{}_translated.txt", job_id)));

    let artifact_path = dir
        .path()
        .join("storage")
        .join(&report.artifact.bucket)
        .join(&report.artifact.key);
    assert_eq!(
        std::fs::read_to_string(&artifact_path)?,
        "[vi] It was a dark night.\n\n[vi] The end.\n"
    );

    // The emailed link verifies against the store's secret
    let url = url::Url::parse(&report.download_url)?;
    let query: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
    let expires: i64 = query["expires"].parse()?;
    let config = controller.config();
    let store = LocalArtifactStore::new(
        &config.storage.root_dir,
        &config.storage.link_base_url,
        &config.storage.link_secret,
    )?;
    assert!(store.verify_link(&report.artifact.bucket, &report.artifact.key, expires, &query["signature"]));

    let mails = FileManager::find_files(dir.path().join("outbox"), "eml")?;
    assert_eq!(mails.len(), 1);
    let mail = std::fs::read_to_string(&mails[0])?;
    assert!(mail.contains("To: reader@example.com\r\n"));
    assert!(mail.contains("Subject: Your book is ready!\r\n"));
    assert!(mail.contains(&report.download_url));

    let stats = controller.queue_stats().await?;
    assert_eq!((stats.visible, stats.in_flight), (0, 0));
    Ok(())
}

#[tokio::test]
async fn test_enqueuePath_withMissingPath_shouldFailWithoutEnqueueing() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let controller = Controller::with_config(on_disk_config(dir.path()))?;

    let result = controller
        .enqueue_path(&dir.path().join("nope.txt"), "en", "vi", None)
        .await;

    assert!(result.is_err());
    Ok(())
}
