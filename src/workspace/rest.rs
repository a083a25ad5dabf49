//! REST implementation of the workspace API.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::types::{CleanRoom, ListCleanRoomsResponse, Run, RunOutput, SubmitRun, SubmitRunResponse};
use super::WorkspaceApi;
use crate::error::{PortalError, Result};
use crate::http::{ApiClient, ErrorKind};

const SUBMIT_PATH: &str = "api/2.1/jobs/runs/submit";
const GET_RUN_PATH: &str = "api/2.1/jobs/runs/get";
const GET_OUTPUT_PATH: &str = "api/2.1/jobs/runs/get-output";
const CLEAN_ROOMS_PATH: &str = "api/2.0/clean-rooms";

/// Delay before the given poll attempt: one second per attempt, capped.
pub fn poll_delay(attempt: u32, max: Duration) -> Duration {
    Duration::from_secs(u64::from(attempt.max(1))).min(max)
}

/// Workspace client speaking the public REST API.
#[derive(Debug, Clone)]
pub struct RestWorkspaceClient {
    api: ApiClient,
    poll_interval_max: Duration,
}

impl RestWorkspaceClient {
    /// Creates a client polling run status at most every `poll_interval_max`.
    pub fn new(api: ApiClient, poll_interval_max: Duration) -> Self {
        Self {
            api,
            poll_interval_max,
        }
    }

    /// Fetches the current state of a run.
    pub async fn get_run(&self, run_id: i64) -> Result<Run> {
        self.api
            .get_json(GET_RUN_PATH, &[("run_id", run_id.to_string())], ErrorKind::Job)
            .await
            .map_err(|e| attach_run_id(e, run_id))
    }

    async fn wait_for_terminal(&self, run_id: i64) -> Result<Run> {
        let mut attempt = 1;
        loop {
            let run = self.get_run(run_id).await?;
            if run.is_terminal() {
                info!(run_id, state = %run.describe_state(), "Run reached a terminal state");
                return Ok(run);
            }

            let delay = poll_delay(attempt, self.poll_interval_max);
            debug!(run_id, state = %run.describe_state(), ?delay, "Run still in progress");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

fn attach_run_id(err: PortalError, id: i64) -> PortalError {
    match err {
        PortalError::JobSubmission {
            message,
            run_page_url,
            ..
        } => PortalError::job_run(message, Some(id), run_page_url),
        other => other,
    }
}

#[async_trait]
impl WorkspaceApi for RestWorkspaceClient {
    async fn submit_and_wait(&self, request: &SubmitRun, timeout: Duration) -> Result<Run> {
        let submitted: SubmitRunResponse = self
            .api
            .post_json(SUBMIT_PATH, request, ErrorKind::Job)
            .await?;
        let run_id = submitted.run_id;
        info!(run_id, run_name = %request.run_name, "Submitted run");

        match tokio::time::timeout(timeout, self.wait_for_terminal(run_id)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(run_id, ?timeout, "Timed out waiting for run");
                let url = match self.get_run(run_id).await {
                    Ok(run) => run.page_url().map(String::from),
                    Err(_) => None,
                };
                Err(PortalError::job_run(
                    format!(
                        "Timed out after {}s waiting for run {run_id} to finish",
                        timeout.as_secs()
                    ),
                    Some(run_id),
                    url,
                ))
            }
        }
    }

    async fn get_run_output(&self, run_id: i64) -> Result<RunOutput> {
        self.api
            .get_json(
                GET_OUTPUT_PATH,
                &[("run_id", run_id.to_string())],
                ErrorKind::Output,
            )
            .await
    }

    async fn list_clean_rooms(&self) -> Result<Vec<CleanRoom>> {
        let mut rooms = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let query: Vec<(&str, String)> = page_token
                .take()
                .map(|t| vec![("page_token", t)])
                .unwrap_or_default();
            let page: ListCleanRoomsResponse = self
                .api
                .get_json(CLEAN_ROOMS_PATH, &query, ErrorKind::Connection)
                .await?;

            rooms.extend(page.clean_rooms);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(count = rooms.len(), "Listed clean rooms");
        Ok(rooms)
    }
}
