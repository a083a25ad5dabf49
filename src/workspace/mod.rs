//! Workspace platform API.
//!
//! Covers the jobs endpoints used to run the clean room notebook and read
//! its output, plus clean room listing.

pub mod mock;
pub mod rest;
pub mod types;

pub use mock::{MockRunBehavior, MockWorkspace};
pub use rest::RestWorkspaceClient;
pub use types::{
    CleanRoom, CleanRoomsNotebookOutput, CleanRoomsNotebookTask, OutputSchemaInfo, Run,
    RunLifeCycleState, RunOutput, RunResultState, RunState, RunTask, SubmitRun, SubmitTask,
};

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Client for the workspace platform.
#[async_trait]
pub trait WorkspaceApi: Send + Sync {
    /// Submits a one-time run and waits until it reaches a terminal state.
    ///
    /// This is the workflow's only long suspension. A run that terminates is
    /// returned as-is whether or not it succeeded; exceeding `timeout` is an
    /// error.
    async fn submit_and_wait(&self, request: &SubmitRun, timeout: Duration) -> Result<Run>;

    /// Fetches the output of a single task run.
    async fn get_run_output(&self, run_id: i64) -> Result<RunOutput>;

    /// Lists the clean rooms visible to the caller.
    async fn list_clean_rooms(&self) -> Result<Vec<CleanRoom>>;
}
