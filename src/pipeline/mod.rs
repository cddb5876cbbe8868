/*!
 * Job pipeline: the per-job state machine from a received message to a
 * delivered artifact.
 */

pub mod orchestrator;
pub mod stage;

pub use orchestrator::{JobFailure, JobPipeline, JobReport};
pub use stage::{JobStage, StageTracker};
