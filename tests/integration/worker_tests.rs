/*!
 * Worker lifecycle tests against an in-memory queue, store and notifier.
 */

use std::time::Duration;

use book_translator::delivery::{MemoryArtifactStore, MemoryNotifier};
use book_translator::pipeline::JobStage;
use book_translator::providers::mock::MockBackend;
use book_translator::queue::MessageQueue;
use book_translator::worker::{FailureDisposition, PollOutcome};

use crate::common::{self, BUCKET, TestHarness};

const BOOK: &str = "Hello world.\n\nGoodbye.\n";

#[tokio::test]
async fn test_runOnce_withStoredBook_shouldTranslateDeliverAndAck() {
    let harness = TestHarness::new(MockBackend::working());
    harness
        .submit("uploads/novel.txt", BOOK, "job-1", "en", "vi", Some("reader@example.com"))
        .await;

    let outcome = harness.worker.run_once().await.unwrap();
    let PollOutcome::Completed(report) = outcome else {
        panic!("expected a completed job");
    };

    assert_eq!(report.job_id, "job-1");
    assert_eq!(report.artifact.key, "uploads/novel_job-1_translated.txt");
    assert_eq!(report.line_count, Some(3));
    assert!(report.notified);
    assert!(!report.resumed);
    assert_eq!(
        harness.artifact("uploads/novel_job-1_translated.txt").unwrap(),
        "[vi] Hello world.\n\n[vi] Goodbye.\n"
    );

    // Blank lines never reach the backend
    let calls = harness.backend.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| !c.model.is_multilingual() && c.model.to_string() == "bilingual(en-vi)"));

    let sent = harness.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, "reader@example.com");
    assert_eq!(sent[0].subject, "Your book is ready!");
    assert!(sent[0].body.contains(&report.download_url));
    assert!(sent[0].body.ends_with("within 7 days"));

    let stats = harness.queue.stats().await.unwrap();
    assert_eq!((stats.visible, stats.in_flight, stats.dead_lettered), (0, 0, 0));
}

#[tokio::test]
async fn test_runOnce_withFailingBackend_shouldLeaveMessageForRedelivery() {
    let harness = TestHarness::new(MockBackend::failing());
    harness
        .submit("novel.txt", BOOK, "job-2", "en", "vi", Some("reader@example.com"))
        .await;

    let outcome = harness.worker.run_once().await.unwrap();
    let PollOutcome::Failed { failure, disposition } = outcome else {
        panic!("expected a failed job");
    };

    assert_eq!(disposition, FailureDisposition::Redeliver);
    assert_eq!(failure.stage, JobStage::Translating);
    assert!(failure.error.is_retryable());

    // Only the uploaded source is in the store
    assert_eq!(harness.store.keys(), vec![(BUCKET.to_string(), "novel.txt".to_string())]);
    assert!(harness.notifier.sent().is_empty());

    let stats = harness.queue.stats().await.unwrap();
    assert_eq!(stats.in_flight, 1);
    assert_eq!(stats.dead_lettered, 0);
}

#[tokio::test]
async fn test_runOnce_withLastAttemptFailing_shouldDeadLetterAndNotify() {
    let mut config = common::test_config();
    config.queue.max_receive_count = 1;
    let harness = TestHarness::with_parts(
        config,
        MockBackend::failing(),
        MemoryArtifactStore::new(),
        MemoryNotifier::new(),
    );
    harness
        .submit("novel.txt", BOOK, "job-3", "en", "vi", Some("reader@example.com"))
        .await;

    let outcome = harness.worker.run_once().await.unwrap();
    assert!(matches!(
        outcome,
        PollOutcome::Failed {
            disposition: FailureDisposition::DeadLettered,
            ..
        }
    ));

    let sent = harness.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Your translation could not be completed");
    assert!(sent[0].body.contains("job-3"));

    let stats = harness.queue.stats().await.unwrap();
    assert_eq!((stats.visible, stats.in_flight, stats.dead_lettered), (0, 0, 1));
}

#[tokio::test]
async fn test_runOnce_withMissingSource_shouldDeadLetterWithoutRetry() {
    let harness = TestHarness::new(MockBackend::working());
    let message = book_translator::JobMessage::stored(BUCKET, "missing.txt", "job-4", "en", "vi");
    harness.queue.send(&message.to_json()).await.unwrap();

    let outcome = harness.worker.run_once().await.unwrap();
    let PollOutcome::Failed { failure, disposition } = outcome else {
        panic!("expected a failed job");
    };

    assert_eq!(disposition, FailureDisposition::DeadLettered);
    assert_eq!(failure.stage, JobStage::Received);
    assert_eq!(harness.backend.call_count(), 0);
    assert_eq!(harness.queue.stats().await.unwrap().dead_lettered, 1);
}

#[tokio::test]
async fn test_runOnce_withMalformedMessages_shouldDeadLetterAndStayIdle() {
    let harness = TestHarness::new(MockBackend::working());
    harness.queue.send("not json at all").await.unwrap();
    harness
        .queue
        .send(r#"{"s3_bucket":"books","s3_key":"a.txt","source_lang":"en","target_lang":"eng"}"#)
        .await
        .unwrap();

    let outcome = harness.worker.run_once().await.unwrap();
    assert!(matches!(outcome, PollOutcome::Idle));

    let stats = harness.queue.stats().await.unwrap();
    assert_eq!((stats.visible, stats.in_flight, stats.dead_lettered), (0, 0, 2));
    assert_eq!(harness.backend.call_count(), 0);
}

#[tokio::test]
async fn test_runOnce_withExistingArtifact_shouldResumeAtDelivery() {
    let harness = TestHarness::new(MockBackend::working());
    harness
        .submit("novel.txt", BOOK, "job-5", "en", "vi", Some("reader@example.com"))
        .await;
    harness
        .store
        .insert(BUCKET, "novel_job-5_translated.txt", "already translated\n".to_string());

    let outcome = harness.worker.run_once().await.unwrap();
    let PollOutcome::Completed(report) = outcome else {
        panic!("expected a completed job");
    };

    assert!(report.resumed);
    assert_eq!(harness.backend.call_count(), 0);
    assert_eq!(harness.notifier.sent().len(), 1);
    assert_eq!(harness.artifact("novel_job-5_translated.txt").unwrap(), "already translated\n");
}

#[tokio::test]
async fn test_runOnce_withInlineContent_shouldStoreUnderDefaultBucket() {
    let harness = TestHarness::new(MockBackend::working());
    harness
        .queue
        .send(r#"{"file_content":"Bonjour.\n","unique_id":"inline-1","source_lang":"fra","target_lang":"deu"}"#)
        .await
        .unwrap();

    let outcome = harness.worker.run_once().await.unwrap();
    let PollOutcome::Completed(report) = outcome else {
        panic!("expected a completed job");
    };

    assert_eq!(report.artifact.bucket, BUCKET);
    assert_eq!(report.artifact.key, "document_inline-1_translated.txt");
    assert!(!report.notified);
    // fr-de has no direct model, so it pivots through English
    assert_eq!(
        harness.artifact("document_inline-1_translated.txt").unwrap(),
        "[de] [en] Bonjour.\n"
    );
}

#[tokio::test]
async fn test_run_withShutdownAlreadySignalled_shouldNotTouchQueue() {
    let harness = TestHarness::new(MockBackend::working());
    harness.submit("novel.txt", BOOK, "job-6", "en", "vi", None).await;

    let stats = harness.worker.run(std::future::ready(())).await;

    assert_eq!(stats.completed, 0);
    assert_eq!(harness.queue.stats().await.unwrap().visible, 1);
}

#[tokio::test]
async fn test_run_withQueuedJobs_shouldProcessAllBeforeShutdown() {
    let harness = TestHarness::new(MockBackend::working());
    harness.submit("one.txt", "First.\n", "job-7", "en", "vi", None).await;
    harness.submit("two.txt", "Second.\n", "job-8", "en", "ko", None).await;

    let stats = harness.worker.run(tokio::time::sleep(Duration::from_secs(1))).await;

    assert_eq!(stats.completed, 2);
    assert_eq!(stats.failed, 0);
    assert_eq!(harness.artifact("one_job-7_translated.txt").unwrap(), "[vi] First.\n");
    assert_eq!(harness.artifact("two_job-8_translated.txt").unwrap(), "[ko] Second.\n");
}

#[tokio::test]
async fn test_runOnce_withMissingPivotModel_shouldDeadLetterOnFirstAttempt() {
    let harness = TestHarness::new(MockBackend::working());
    harness
        .submit("novel.txt", BOOK, "job-9", "de", "fr", Some("reader@example.com"))
        .await;

    let outcome = harness.worker.run_once().await.unwrap();
    let PollOutcome::Failed { failure, disposition } = outcome else {
        panic!("expected a failed job");
    };

    assert_eq!(disposition, FailureDisposition::DeadLettered);
    assert!(!failure.error.is_retryable());
    assert_eq!(harness.backend.call_count(), 0);
    let stats = harness.queue.stats().await.unwrap();
    assert_eq!((stats.visible, stats.in_flight, stats.dead_lettered), (0, 0, 1));
}
