//! Mock workspace for testing.
//!
//! Provides deterministic run outcomes and records every call so tests can
//! assert which stages of the workflow were reached.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::types::{
    CleanRoom, CleanRoomsNotebookOutput, OutputSchemaInfo, Run, RunLifeCycleState, RunOutput,
    RunResultState, RunState, RunTask, SubmitRun,
};
use super::WorkspaceApi;
use crate::error::{PortalError, Result};

const MOCK_HOST: &str = "https://mock.cloud.databricks.com";

/// How the mock responds to the next submission.
#[derive(Debug, Clone, PartialEq)]
pub enum MockRunBehavior {
    /// The run succeeds; `output` becomes the task's `output_schema_info`.
    Succeed { output: Option<OutputSchemaInfo> },
    /// The run terminates with a `FAILED` result and the given message.
    Fail { message: String },
    /// The submission itself is rejected.
    Reject { message: String },
}

impl Default for MockRunBehavior {
    fn default() -> Self {
        Self::Succeed {
            output: Some(OutputSchemaInfo::new("mock_catalog", "mock_schema")),
        }
    }
}

#[derive(Debug, Default)]
struct MockWorkspaceState {
    behavior: Mutex<MockRunBehavior>,
    clean_rooms: Mutex<Vec<CleanRoom>>,
    next_run_id: AtomicI64,
    submitted: Mutex<Vec<SubmitRun>>,
    outputs: Mutex<HashMap<i64, RunOutput>>,
    output_requests: Mutex<Vec<i64>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// An in-memory workspace. Cloning yields another handle onto the same state.
#[derive(Debug, Clone)]
pub struct MockWorkspace {
    state: Arc<MockWorkspaceState>,
}

impl MockWorkspace {
    /// Creates a mock whose runs succeed into `mock_catalog.mock_schema`.
    pub fn new() -> Self {
        Self::with_behavior(MockRunBehavior::default())
    }

    /// Creates a mock with the given run behavior.
    pub fn with_behavior(behavior: MockRunBehavior) -> Self {
        let state = MockWorkspaceState {
            behavior: Mutex::new(behavior),
            clean_rooms: Mutex::new(vec![CleanRoom::named("comcast_cleanroom_do_not_delete")]),
            next_run_id: AtomicI64::new(1000),
            ..Default::default()
        };
        Self {
            state: Arc::new(state),
        }
    }

    /// Creates a mock whose runs succeed into the given catalog and schema.
    pub fn succeeding(catalog: impl Into<String>, schema: impl Into<String>) -> Self {
        Self::with_behavior(MockRunBehavior::Succeed {
            output: Some(OutputSchemaInfo::new(catalog, schema)),
        })
    }

    /// Changes how subsequent submissions behave.
    pub fn set_behavior(&self, behavior: MockRunBehavior) {
        *lock(&self.state.behavior) = behavior;
    }

    /// Replaces the clean rooms returned by `list_clean_rooms`.
    pub fn set_clean_rooms(&self, rooms: Vec<CleanRoom>) {
        *lock(&self.state.clean_rooms) = rooms;
    }

    /// Number of `submit_and_wait` calls.
    pub fn submit_count(&self) -> usize {
        lock(&self.state.submitted).len()
    }

    /// Every submitted request, in order.
    pub fn submitted_requests(&self) -> Vec<SubmitRun> {
        lock(&self.state.submitted).clone()
    }

    /// Task run ids whose output was requested, in order.
    pub fn output_requests(&self) -> Vec<i64> {
        lock(&self.state.output_requests).clone()
    }

    /// Reserves a parent run id and the task run id after it.
    fn allocate_run_id(&self) -> i64 {
        self.state.next_run_id.fetch_add(2, Ordering::SeqCst)
    }

    fn run_url(run_id: i64) -> String {
        format!("{MOCK_HOST}/#job/0/run/{run_id}")
    }

    fn terminated(run_id: i64, result: RunResultState, message: Option<String>) -> Run {
        let state = RunState {
            life_cycle_state: Some(RunLifeCycleState::Terminated),
            result_state: Some(result),
            state_message: message,
        };
        let task_run_id = run_id + 1;
        Run {
            run_id,
            run_name: None,
            run_page_url: Some(Self::run_url(run_id)),
            state: Some(state.clone()),
            tasks: vec![RunTask {
                run_id: task_run_id,
                task_key: Some("cleanroomapp".to_string()),
                run_page_url: Some(Self::run_url(task_run_id)),
                state: Some(state),
            }],
        }
    }
}

impl Default for MockWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkspaceApi for MockWorkspace {
    async fn submit_and_wait(&self, request: &SubmitRun, _timeout: Duration) -> Result<Run> {
        lock(&self.state.submitted).push(request.clone());
        let behavior = lock(&self.state.behavior).clone();

        let run = match behavior {
            MockRunBehavior::Reject { message } => return Err(PortalError::job(message)),
            MockRunBehavior::Succeed { output } => {
                let run = Self::terminated(self.allocate_run_id(), RunResultState::Success, None);
                let output = RunOutput {
                    clean_rooms_notebook_output: Some(CleanRoomsNotebookOutput {
                        output_schema_info: output,
                    }),
                    ..Default::default()
                };
                lock(&self.state.outputs).insert(run.tasks[0].run_id, output);
                run
            }
            MockRunBehavior::Fail { message } => Self::terminated(
                self.allocate_run_id(),
                RunResultState::Failed,
                Some(message),
            ),
        };

        Ok(run)
    }

    async fn get_run_output(&self, run_id: i64) -> Result<RunOutput> {
        lock(&self.state.output_requests).push(run_id);
        lock(&self.state.outputs)
            .get(&run_id)
            .cloned()
            .ok_or_else(|| PortalError::output(format!("Run {run_id} has no output")))
    }

    async fn list_clean_rooms(&self) -> Result<Vec<CleanRoom>> {
        Ok(lock(&self.state.clean_rooms).clone())
    }
}
