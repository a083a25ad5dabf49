//! Wire models for the jobs and clean rooms APIs.
//!
//! Nested response fields are optional on the wire; callers resolve them
//! explicitly instead of assuming they are present.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Body of `POST /api/2.1/jobs/runs/submit`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmitRun {
    pub run_name: String,
    pub tasks: Vec<SubmitTask>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmitTask {
    pub task_key: String,
    pub clean_rooms_notebook_task: CleanRoomsNotebookTask,
}

/// Runs a notebook shared into a clean room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CleanRoomsNotebookTask {
    pub clean_room_name: String,
    pub notebook_name: String,
    /// Pins the notebook content; the run fails if the notebook changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default)]
    pub notebook_base_parameters: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRunResponse {
    pub run_id: i64,
}

/// A job run as returned by `GET /api/2.1/jobs/runs/get`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Run {
    pub run_id: i64,
    #[serde(default)]
    pub run_name: Option<String>,
    #[serde(default)]
    pub run_page_url: Option<String>,
    #[serde(default)]
    pub state: Option<RunState>,
    #[serde(default)]
    pub tasks: Vec<RunTask>,
}

impl Run {
    fn life_cycle_state(&self) -> Option<RunLifeCycleState> {
        self.state.as_ref().and_then(|s| s.life_cycle_state)
    }

    /// Returns true once the run will make no further progress.
    pub fn is_terminal(&self) -> bool {
        self.life_cycle_state().is_some_and(|s| s.is_terminal())
    }

    /// Returns true if the run terminated with a `SUCCESS` result.
    pub fn succeeded(&self) -> bool {
        self.life_cycle_state() == Some(RunLifeCycleState::Terminated)
            && self.state.as_ref().and_then(|s| s.result_state) == Some(RunResultState::Success)
    }

    /// Returns the run page URL, falling back to the first task's.
    pub fn page_url(&self) -> Option<&str> {
        self.run_page_url
            .as_deref()
            .or_else(|| self.tasks.first().and_then(|t| t.run_page_url.as_deref()))
    }

    /// Summarizes the run state for logs and error messages.
    pub fn describe_state(&self) -> String {
        match &self.state {
            Some(state) => state.to_string(),
            None => "no state reported".to_string(),
        }
    }
}

/// One task within a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunTask {
    pub run_id: i64,
    #[serde(default)]
    pub task_key: Option<String>,
    #[serde(default)]
    pub run_page_url: Option<String>,
    #[serde(default)]
    pub state: Option<RunState>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunState {
    #[serde(default)]
    pub life_cycle_state: Option<RunLifeCycleState>,
    #[serde(default)]
    pub result_state: Option<RunResultState>,
    #[serde(default)]
    pub state_message: Option<String>,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let life_cycle = self
            .life_cycle_state
            .map(|s| s.as_str())
            .unwrap_or("UNKNOWN");
        write!(f, "{life_cycle}")?;
        if let Some(result) = self.result_state {
            write!(f, "/{}", result.as_str())?;
        }
        if let Some(msg) = self.state_message.as_deref().filter(|m| !m.is_empty()) {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunLifeCycleState {
    Queued,
    Pending,
    Running,
    Terminating,
    Terminated,
    Skipped,
    InternalError,
    Blocked,
    WaitingForRetry,
    #[serde(other)]
    Unknown,
}

impl RunLifeCycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Terminating => "TERMINATING",
            Self::Terminated => "TERMINATED",
            Self::Skipped => "SKIPPED",
            Self::InternalError => "INTERNAL_ERROR",
            Self::Blocked => "BLOCKED",
            Self::WaitingForRetry => "WAITING_FOR_RETRY",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated | Self::Skipped | Self::InternalError)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunResultState {
    Success,
    SuccessWithFailures,
    Failed,
    Timedout,
    Canceled,
    MaximumConcurrentRunsReached,
    Excluded,
    UpstreamFailed,
    UpstreamCanceled,
    Disabled,
    #[serde(other)]
    Unknown,
}

impl RunResultState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::SuccessWithFailures => "SUCCESS_WITH_FAILURES",
            Self::Failed => "FAILED",
            Self::Timedout => "TIMEDOUT",
            Self::Canceled => "CANCELED",
            Self::MaximumConcurrentRunsReached => "MAXIMUM_CONCURRENT_RUNS_REACHED",
            Self::Excluded => "EXCLUDED",
            Self::UpstreamFailed => "UPSTREAM_FAILED",
            Self::UpstreamCanceled => "UPSTREAM_CANCELED",
            Self::Disabled => "DISABLED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Response of `GET /api/2.1/jobs/runs/get-output`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunOutput {
    #[serde(default)]
    pub clean_rooms_notebook_output: Option<CleanRoomsNotebookOutput>,
    /// Error message if the task failed.
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_trace: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CleanRoomsNotebookOutput {
    #[serde(default)]
    pub output_schema_info: Option<OutputSchemaInfo>,
}

/// Where a clean room notebook materialized its output.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OutputSchemaInfo {
    #[serde(default)]
    pub catalog_name: Option<String>,
    #[serde(default)]
    pub schema_name: Option<String>,
    /// Epoch millis after which the output schema is dropped.
    #[serde(default)]
    pub expiration_time: Option<i64>,
}

impl OutputSchemaInfo {
    /// Creates schema info with both names set.
    pub fn new(catalog_name: impl Into<String>, schema_name: impl Into<String>) -> Self {
        Self {
            catalog_name: Some(catalog_name.into()),
            schema_name: Some(schema_name.into()),
            expiration_time: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CleanRoom {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl CleanRoom {
    /// Creates a clean room with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListCleanRoomsResponse {
    #[serde(default)]
    pub clean_rooms: Vec<CleanRoom>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}
