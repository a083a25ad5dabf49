//! Packages a query into a clean room notebook run and waits for it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::config::WorkflowConfig;
use crate::error::{PortalError, Result};
use crate::query::Scope;
use crate::workspace::{CleanRoomsNotebookTask, Run, SubmitRun, SubmitTask, WorkspaceApi};

/// Notebook parameter carrying the user's SQL.
pub const SQL_PARAMETER: &str = "sql";

/// Notebook parameter carrying the dataset scope.
pub const SCOPE_PARAMETER: &str = "Dataset_Scope";

/// Fixed job target for every submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSettings {
    pub run_name: String,
    pub task_key: String,
    pub clean_room_name: String,
    pub notebook_name: String,
    pub notebook_etag: String,
    pub timeout: Duration,
}

impl From<&WorkflowConfig> for JobSettings {
    fn from(config: &WorkflowConfig) -> Self {
        Self {
            run_name: config.run_name.clone(),
            task_key: config.task_key.clone(),
            clean_room_name: config.clean_room_name.clone(),
            notebook_name: config.notebook_name.clone(),
            notebook_etag: config.notebook_etag.clone(),
            timeout: config.submit_timeout(),
        }
    }
}

/// Submits query runs on behalf of the app's service principal.
pub struct JobSubmitter {
    api: Arc<dyn WorkspaceApi>,
    settings: JobSettings,
}

impl JobSubmitter {
    pub fn new(api: Arc<dyn WorkspaceApi>, settings: JobSettings) -> Self {
        Self { api, settings }
    }

    /// Builds the single-task run request for a query.
    pub fn build_request(&self, query_text: &str, scope: Scope) -> SubmitRun {
        let mut parameters = BTreeMap::new();
        parameters.insert(SQL_PARAMETER.to_string(), query_text.to_string());
        parameters.insert(SCOPE_PARAMETER.to_string(), scope.as_str().to_string());

        SubmitRun {
            run_name: self.settings.run_name.clone(),
            tasks: vec![SubmitTask {
                task_key: self.settings.task_key.clone(),
                clean_rooms_notebook_task: CleanRoomsNotebookTask {
                    clean_room_name: self.settings.clean_room_name.clone(),
                    notebook_name: self.settings.notebook_name.clone(),
                    etag: Some(self.settings.notebook_etag.clone()),
                    notebook_base_parameters: parameters,
                },
            }],
        }
    }

    /// Submits the query and blocks until the run is terminal.
    ///
    /// Returns the run only if it succeeded. A run that ends in any other
    /// state is a `JobSubmission` error carrying its id and page URL.
    pub async fn run_as_service_principal(&self, query_text: &str, scope: Scope) -> Result<Run> {
        let request = self.build_request(query_text, scope);
        info!(
            clean_room = %self.settings.clean_room_name,
            notebook = %self.settings.notebook_name,
            %scope,
            "Submitting clean room notebook run"
        );

        let run = self
            .api
            .submit_and_wait(&request, self.settings.timeout)
            .await?;

        if !run.succeeded() {
            error!(run_id = run.run_id, state = %run.describe_state(), "Run did not succeed");
            return Err(PortalError::job_run(
                format!("Run {} finished as {}", run.run_id, run.describe_state()),
                Some(run.run_id),
                run.page_url().map(String::from),
            ));
        }

        if run.tasks.is_empty() {
            return Err(PortalError::job_run(
                format!("Run {} reported no tasks", run.run_id),
                Some(run.run_id),
                run.page_url().map(String::from),
            ));
        }

        info!(run_id = run.run_id, url = run.page_url().unwrap_or(""), "Run succeeded");
        Ok(run)
    }
}
