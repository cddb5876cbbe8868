/*!
 * Job lifecycle stages.
 */

use log::{info, warn};
use std::fmt;
use std::time::Instant;

/// Where a job is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStage {
    Received,
    Fetched,
    Chunked,
    Translating,
    Reassembled,
    Delivered,
    Done,
    Failed,
}

impl JobStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Allowed transitions. `Received -> Delivered` is the resume path taken
    /// when a previous attempt already stored the artifact.
    pub fn can_advance_to(self, next: JobStage) -> bool {
        use JobStage::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Received, Fetched)
            | (Fetched, Chunked)
            | (Chunked, Translating)
            | (Translating, Reassembled)
            | (Reassembled, Delivered)
            | (Received, Delivered)
            | (Delivered, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Fetched => "fetched",
            Self::Chunked => "chunked",
            Self::Translating => "translating",
            Self::Reassembled => "reassembled",
            Self::Delivered => "delivered",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks and logs one job's stage transitions
#[derive(Debug)]
pub struct StageTracker {
    job_id: String,
    stage: JobStage,
    history: Vec<JobStage>,
    entered_at: Instant,
}

impl StageTracker {
    pub fn new(job_id: &str) -> Self {
        info!("Job {}: {}", job_id, JobStage::Received);
        Self {
            job_id: job_id.to_string(),
            stage: JobStage::Received,
            history: vec![JobStage::Received],
            entered_at: Instant::now(),
        }
    }

    pub fn stage(&self) -> JobStage {
        self.stage
    }

    /// Stages visited so far, in order
    pub fn history(&self) -> &[JobStage] {
        &self.history
    }

    pub fn advance(&mut self, next: JobStage) {
        if !self.stage.can_advance_to(next) {
            warn!("Job {}: unexpected transition {} -> {}", self.job_id, self.stage, next);
        }
        info!(
            "Job {}: {} -> {} ({:?} in {})",
            self.job_id,
            self.stage,
            next,
            self.entered_at.elapsed(),
            self.stage
        );
        self.stage = next;
        self.history.push(next);
        self.entered_at = Instant::now();
    }

    /// Mark the job failed; returns the stage it failed in
    pub fn fail(&mut self) -> JobStage {
        let failed_in = self.stage;
        if !failed_in.is_terminal() {
            self.stage = JobStage::Failed;
            self.history.push(JobStage::Failed);
        }
        failed_in
    }
}
