//! The "Run Query" workflow.
//!
//! Sequences submit, resolve, connect and read for one query request, and
//! turns any stage failure into a report instead of an error, so a failed
//! run never takes the session down with it.

use std::sync::Arc;
use tracing::{debug, error, info};

use super::progress::{NoopReporter, ProgressReporter, WorkflowEvent};
use crate::config::WorkflowConfig;
use crate::connection::ConnectionProvider;
use crate::db::{ResultTable, SqlConnector};
use crate::error::{PortalError, Result};
use crate::jobs::{JobSettings, JobSubmitter, OutputLocation, OutputResolver};
use crate::query::{read_table, QueryRequest};
use crate::workspace::{Run, WorkspaceApi};

/// Where an invocation currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    Submitting,
    Resolving,
    Connecting,
    Done,
    Failed,
}

impl WorkflowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::Resolving => "resolving",
            Self::Connecting => "connecting",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

/// A successful invocation.
#[derive(Debug, Clone)]
pub struct QueryOutput {
    pub run: Run,
    pub location: OutputLocation,
    pub table_name: String,
    pub table: ResultTable,
}

impl QueryOutput {
    /// Link to the run in the workspace UI.
    pub fn run_page_url(&self) -> Option<&str> {
        self.run.page_url()
    }
}

/// A failed invocation.
#[derive(Debug)]
pub struct FailureReport {
    /// The stage that was running when the failure happened.
    pub stage: WorkflowState,
    pub error: PortalError,
    /// User-facing message including the underlying error text.
    pub message: String,
}

/// Result of one "Run Query" activation.
#[derive(Debug)]
pub enum RunOutcome {
    Done(QueryOutput),
    Failed(FailureReport),
}

impl RunOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    /// Returns the output of a successful run.
    pub fn output(&self) -> Option<&QueryOutput> {
        match self {
            Self::Done(output) => Some(output),
            Self::Failed(_) => None,
        }
    }

    /// Returns the report of a failed run.
    pub fn failure(&self) -> Option<&FailureReport> {
        match self {
            Self::Done(_) => None,
            Self::Failed(report) => Some(report),
        }
    }
}

/// Composition root for the query workflow.
///
/// Owns the connection cache, so connections outlive individual invocations
/// but not the workflow itself.
pub struct Workflow {
    submitter: JobSubmitter,
    resolver: OutputResolver,
    connections: ConnectionProvider,
    http_path: String,
    reporter: Arc<dyn ProgressReporter>,
    state: WorkflowState,
    transitions: Vec<WorkflowState>,
}

impl Workflow {
    /// Wires the workflow against a workspace API and a SQL connector.
    pub fn new(
        api: Arc<dyn WorkspaceApi>,
        connector: Arc<dyn SqlConnector>,
        config: &WorkflowConfig,
    ) -> Self {
        Self {
            submitter: JobSubmitter::new(Arc::clone(&api), JobSettings::from(config)),
            resolver: OutputResolver::new(api),
            connections: ConnectionProvider::new(connector),
            http_path: config.http_path.clone(),
            reporter: Arc::new(NoopReporter),
            state: WorkflowState::Idle,
            transitions: Vec::new(),
        }
    }

    /// Sends progress events to `reporter`.
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Current state. Always `Idle` between invocations.
    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// States visited by the most recent invocation, ending in `Idle`.
    pub fn last_transitions(&self) -> &[WorkflowState] {
        &self.transitions
    }

    /// The connection cache shared across invocations.
    pub fn connections(&self) -> &ConnectionProvider {
        &self.connections
    }

    /// Runs one query end to end.
    ///
    /// Blocks on the remote run; never returns an error. Each call submits
    /// a fresh run, even for an identical request.
    pub async fn run_query(&mut self, request: &QueryRequest) -> RunOutcome {
        self.transitions.clear();

        self.transition(WorkflowState::Submitting);
        self.reporter.report(&WorkflowEvent::Submitting);
        let run = match self
            .submitter
            .run_as_service_principal(request.query_text(), request.scope())
            .await
        {
            Ok(run) => run,
            Err(e) => return self.fail(e),
        };
        self.reporter.report(&WorkflowEvent::Submitted {
            run_page_url: run.page_url().map(String::from),
        });

        self.transition(WorkflowState::Resolving);
        self.reporter.report(&WorkflowEvent::Resolving);
        let location = match self.resolver.resolve_output_location(&run).await {
            Ok(location) => location,
            Err(e) => return self.fail(e),
        };
        let table_name = location.table_name();

        self.transition(WorkflowState::Connecting);
        self.reporter.report(&WorkflowEvent::Connecting {
            table_name: table_name.clone(),
        });
        let table = match self.read_output(&table_name).await {
            Ok(table) => table,
            Err(e) => return self.fail(e),
        };

        self.transition(WorkflowState::Done);
        self.reporter.report(&WorkflowEvent::Done {
            row_count: table.row_count,
        });
        info!(run_id = run.run_id, table = %table_name, rows = table.row_count, "Query finished");
        self.transition(WorkflowState::Idle);

        RunOutcome::Done(QueryOutput {
            run,
            location,
            table_name,
            table,
        })
    }

    async fn read_output(&mut self, table_name: &str) -> Result<ResultTable> {
        let connection = self.connections.get_connection(&self.http_path).await?;
        read_table(table_name, connection.as_ref()).await
    }

    fn fail(&mut self, error: PortalError) -> RunOutcome {
        let stage = self.state;
        let message = error.user_message();
        error!(stage = stage.as_str(), "{}: {}", error.category(), error);

        self.transition(WorkflowState::Failed);
        self.reporter.report(&WorkflowEvent::Failed {
            message: message.clone(),
        });
        self.transition(WorkflowState::Idle);

        RunOutcome::Failed(FailureReport {
            stage,
            error,
            message,
        })
    }

    fn transition(&mut self, next: WorkflowState) {
        debug!(from = self.state.as_str(), to = next.as_str(), "Workflow transition");
        self.state = next;
        self.transitions.push(next);
    }
}
