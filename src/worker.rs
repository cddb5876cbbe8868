/*!
 * Queue worker loop.
 *
 * Jobs run one at a time: poll, process, then acknowledge. A failed job is
 * left on the queue so the visibility timeout hands it out again, until it
 * runs out of attempts or fails in a way retrying cannot fix; then it is
 * dead-lettered and the recipient is told.
 */

use log::{error, info, warn};
use std::future::Future;
use std::time::Duration;

use crate::errors::QueueError;
use crate::pipeline::{JobFailure, JobPipeline, JobReport};
use crate::queue::{Delivery, QueueConsumer};

/// Shortest interval between visibility extensions
const MIN_HEARTBEAT: Duration = Duration::from_millis(100);

/// What happened to a failed job's message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDisposition {
    /// Left un-acked; it comes back after the visibility timeout
    Redeliver,
    /// Removed from the live queue for good
    DeadLettered,
}

/// Result of one poll-and-process round
#[derive(Debug)]
pub enum PollOutcome {
    Idle,
    Completed(JobReport),
    Failed {
        failure: JobFailure,
        disposition: FailureDisposition,
    },
}

/// Counters for a worker run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub completed: usize,
    pub failed: usize,
    pub dead_lettered: usize,
    pub idle_polls: usize,
    pub queue_errors: usize,
}

impl WorkerStats {
    fn record(&mut self, outcome: &PollOutcome) {
        match outcome {
            PollOutcome::Idle => self.idle_polls += 1,
            PollOutcome::Completed(_) => self.completed += 1,
            PollOutcome::Failed { disposition, .. } => {
                self.failed += 1;
                if *disposition == FailureDisposition::DeadLettered {
                    self.dead_lettered += 1;
                }
            }
        }
    }
}

/// Sequential job worker
#[derive(Debug, Clone)]
pub struct Worker {
    consumer: QueueConsumer,
    pipeline: JobPipeline,
    idle_backoff: Duration,
    notify_on_failure: bool,
}

impl Worker {
    pub fn new(consumer: QueueConsumer, pipeline: JobPipeline, idle_backoff: Duration, notify_on_failure: bool) -> Self {
        Self {
            consumer,
            pipeline,
            idle_backoff,
            notify_on_failure,
        }
    }

    /// Poll once and process whatever arrives
    pub async fn run_once(&self) -> Result<PollOutcome, QueueError> {
        match self.consumer.poll().await? {
            Some(delivery) => self.handle(delivery).await,
            None => Ok(PollOutcome::Idle),
        }
    }

    /// Run until `shutdown` resolves. Shutdown is only observed between
    /// jobs; a job in progress always runs to its end.
    pub async fn run<F>(&self, shutdown: F) -> WorkerStats
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut stats = WorkerStats::default();
        info!("Worker started");

        loop {
            let polled = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                polled = self.consumer.poll() => polled,
            };

            let outcome = match polled {
                Ok(Some(delivery)) => self.handle(delivery).await,
                Ok(None) => Ok(PollOutcome::Idle),
                Err(e) => Err(e),
            };

            let pause = match outcome {
                Ok(outcome) => {
                    stats.record(&outcome);
                    matches!(outcome, PollOutcome::Idle)
                }
                Err(e) => {
                    error!("Queue error: {}", e);
                    stats.queue_errors += 1;
                    true
                }
            };

            if pause {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => break,
                    _ = tokio::time::sleep(self.idle_backoff) => {}
                }
            }
        }

        info!(
            "Worker stopped: {} completed, {} failed ({} dead-lettered)",
            stats.completed, stats.failed, stats.dead_lettered
        );
        stats
    }

    async fn handle(&self, delivery: Delivery) -> Result<PollOutcome, QueueError> {
        info!("Processing {} (receive #{})", delivery.job, delivery.receive_count);

        match self.process_with_heartbeat(&delivery).await {
            Ok(report) => {
                match self.consumer.ack(&delivery).await {
                    Ok(()) => {}
                    Err(QueueError::StaleReceipt(_)) => {
                        warn!(
                            "Job {} finished after its message was handed out again; the next attempt will resume at delivery",
                            delivery.job.job_id
                        );
                    }
                    Err(e) => return Err(e),
                }
                Ok(PollOutcome::Completed(report))
            }
            Err(failure) => {
                let retryable = failure.error.is_retryable();
                if retryable && self.consumer.has_attempts_left(&delivery) {
                    warn!(
                        "Job {} will be retried after the visibility timeout (attempt {} of {})",
                        delivery.job.job_id,
                        delivery.receive_count,
                        self.consumer.max_receive_count()
                    );
                    return Ok(PollOutcome::Failed {
                        failure,
                        disposition: FailureDisposition::Redeliver,
                    });
                }

                self.give_up(&delivery, &failure).await?;
                Ok(PollOutcome::Failed {
                    failure,
                    disposition: FailureDisposition::DeadLettered,
                })
            }
        }
    }

    async fn give_up(&self, delivery: &Delivery, failure: &JobFailure) -> Result<(), QueueError> {
        error!("Giving up on job {}: {}", delivery.job.job_id, failure);

        match self.consumer.dead_letter(delivery, &failure.to_string()).await {
            Ok(()) | Err(QueueError::StaleReceipt(_)) => {}
            Err(e) => return Err(e),
        }

        if self.notify_on_failure {
            if let Err(e) = self
                .pipeline
                .gateway()
                .notify_failure(&delivery.job, &failure.error.to_string())
                .await
            {
                warn!("Failed to send failure notice for job {}: {}", delivery.job.job_id, e);
            }
        }
        Ok(())
    }

    /// Process a job while periodically pushing its visibility deadline out
    async fn process_with_heartbeat(&self, delivery: &Delivery) -> Result<JobReport, JobFailure> {
        let period = (self.consumer.visibility_timeout() / 2).max(MIN_HEARTBEAT);
        let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        let process = self.pipeline.process(&delivery.job);
        tokio::pin!(process);

        loop {
            tokio::select! {
                result = &mut process => return result,
                _ = heartbeat.tick() => {
                    if let Err(e) = self.consumer.extend(delivery).await {
                        warn!("Could not extend visibility for job {}: {}", delivery.job.job_id, e);
                    }
                }
            }
        }
    }
}
