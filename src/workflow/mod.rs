//! Query workflow orchestration.

pub mod orchestrator;
pub mod progress;

pub use orchestrator::{FailureReport, QueryOutput, RunOutcome, Workflow, WorkflowState};
pub use progress::{NoopReporter, ProgressReporter, RecordingReporter, WorkflowEvent};
