//! Command-line application wiring.
//!
//! Resolves configuration, builds the workspace and SQL clients (real or
//! mock), and runs the selected command against them.

use std::io::{IsTerminal, Write};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::cli::{Cli, Command, QuerySource};
use crate::config::Config;
use crate::db::{MockSqlConnector, SqlConnector, WarehouseConnector};
use crate::error::{PortalError, Result};
use crate::http::{ApiClient, TokenCredentials};
use crate::query::{QueryRequest, Scope};
use crate::render::{render_output, OutputFormat};
use crate::shell::{run_shell, LineEditor, LineSource, PipedLines};
use crate::workflow::{ProgressReporter, RunOutcome, Workflow, WorkflowEvent};
use crate::workspace::{CleanRoom, MockWorkspace, RestWorkspaceClient, WorkspaceApi};

/// The remote systems a command talks to.
pub struct Services {
    pub workspace: Arc<dyn WorkspaceApi>,
    pub connector: Arc<dyn SqlConnector>,
}

impl Services {
    /// Builds REST clients for the configured workspace.
    pub fn connect(config: &Config) -> Result<Self> {
        let base_url = config.workspace.base_url()?;
        let token = config.workspace.require_token()?;
        let api = ApiClient::new(
            base_url,
            Arc::new(TokenCredentials::new(token)),
            config.workspace.request_timeout(),
        )?;
        info!("Workspace: {}", config.workspace.display_string());

        Ok(Self {
            workspace: Arc::new(RestWorkspaceClient::new(
                api.clone(),
                config.workflow.poll_interval_max(),
            )),
            connector: Arc::new(WarehouseConnector::new(api, &config.workflow)),
        })
    }

    /// Builds in-memory stand-ins for both remote systems.
    pub fn mock() -> Self {
        info!("Using mock workspace and SQL endpoint");
        Self {
            workspace: Arc::new(MockWorkspace::new()),
            connector: Arc::new(MockSqlConnector::new()),
        }
    }

    /// Creates a workflow over these services.
    pub fn workflow(&self, config: &Config, reporter: Arc<dyn ProgressReporter>) -> Workflow {
        Workflow::new(
            Arc::clone(&self.workspace),
            Arc::clone(&self.connector),
            &config.workflow,
        )
        .with_reporter(reporter)
    }
}

/// Prints workflow progress to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    /// Returns the lines shown to the user for an event.
    pub fn lines(event: &WorkflowEvent) -> Vec<String> {
        match event {
            WorkflowEvent::Submitting => vec!["Running the query.. please wait.".to_string()],
            WorkflowEvent::Submitted { run_page_url } => {
                let mut lines = vec!["Run successful!".to_string()];
                if let Some(url) = run_page_url {
                    lines.push(format!("View details: {url}"));
                }
                lines
            }
            WorkflowEvent::Connecting { table_name } => {
                vec![format!("Reading {table_name}")]
            }
            WorkflowEvent::Failed { message } => vec![message.clone()],
            WorkflowEvent::Resolving | WorkflowEvent::Done { .. } => Vec::new(),
        }
    }
}

impl ProgressReporter for ConsoleReporter {
    fn report(&self, event: &WorkflowEvent) {
        debug!(?event, "Workflow event");
        for line in Self::lines(event) {
            eprintln!("{line}");
        }
    }
}

/// Resolves configuration with precedence CLI > config file > environment.
pub fn resolve_config(cli: &Cli) -> Result<Config> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;

    config.workspace.merge(&cli.to_workspace_config());
    config.workspace.apply_env_defaults();
    Ok(config)
}

/// Resolves configuration for a command.
///
/// Mock mode never talks to the workspace, so a config file that fails to
/// load is reported and replaced by defaults.
pub fn load_config(cli: &Cli) -> Result<Config> {
    match resolve_config(cli) {
        Ok(config) => Ok(config),
        Err(e) if cli.mock => {
            warn!("Ignoring configuration in mock mode: {e}");
            let mut config = Config::default();
            config.workspace.merge(&cli.to_workspace_config());
            Ok(config)
        }
        Err(e) => Err(e),
    }
}

/// Runs the command selected on the command line.
pub async fn run(cli: Cli) -> Result<()> {
    let format = cli.parse_output_format()?;
    let config = load_config(&cli)?;
    let services = if cli.mock {
        Services::mock()
    } else {
        Services::connect(&config)?
    };
    let mut stdout = std::io::stdout();

    match &cli.command {
        Command::CleanRooms => {
            let rooms = services.workspace.list_clean_rooms().await?;
            print_clean_rooms(&rooms, format, &mut stdout)
        }
        Command::Run { .. } => {
            let scope = required_scope(&cli.command)?;
            let query = match cli.command.query_source() {
                Some(source) => read_query(source).await?,
                None => String::new(),
            };
            let mut workflow = services.workflow(&config, Arc::new(ConsoleReporter));
            run_once(&mut workflow, &QueryRequest::new(query, scope), format, &mut stdout)
                .await
        }
        Command::Shell { .. } => {
            let scope = required_scope(&cli.command)?;
            let mut workflow = services.workflow(&config, Arc::new(ConsoleReporter));
            let mut input: Box<dyn LineSource> = if std::io::stdin().is_terminal() {
                Box::new(LineEditor::spawn()?)
            } else {
                Box::new(PipedLines::new(BufReader::new(tokio::io::stdin())))
            };
            let summary =
                run_shell(&mut workflow, scope, input.as_mut(), format, &mut stdout).await?;
            info!(runs = summary.runs, failures = summary.failures, "Shell closed");
            Ok(())
        }
    }
}

fn required_scope(command: &Command) -> Result<Scope> {
    command
        .scope()?
        .ok_or_else(|| PortalError::config("A dataset scope must be selected"))
}

/// Reads the query text for the `run` command.
pub async fn read_query(source: QuerySource) -> Result<String> {
    match source {
        QuerySource::Inline(sql) => Ok(sql),
        QuerySource::File(path) => tokio::fs::read_to_string(&path).await.map_err(|e| {
            PortalError::config(format!("Failed to read query file {}: {e}", path.display()))
        }),
        QuerySource::Stdin => {
            let mut sql = String::new();
            tokio::io::stdin()
                .read_to_string(&mut sql)
                .await
                .map_err(|e| PortalError::config(format!("Failed to read query from stdin: {e}")))?;
            Ok(sql)
        }
    }
}

/// Names of the clean rooms that have one, in listing order.
pub fn clean_room_names(rooms: &[CleanRoom]) -> Vec<&str> {
    rooms
        .iter()
        .filter_map(|room| room.name.as_deref())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Writes the clean room listing.
pub fn print_clean_rooms(
    rooms: &[CleanRoom],
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<()> {
    let names = clean_room_names(rooms);
    let text = match format {
        OutputFormat::Table if names.is_empty() => "No clean rooms available.\n".to_string(),
        OutputFormat::Table => names.iter().map(|n| format!("{n}\n")).collect(),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&names)
                .map_err(|e| PortalError::internal(format!("Failed to serialize result: {e}")))?;
            json + "\n"
        }
    };
    write_out(out, &text)
}

/// Runs one query and writes its output table.
///
/// A failed run has already been reported to the user; its error is returned
/// so the process exits non-zero.
pub async fn run_once(
    workflow: &mut Workflow,
    request: &QueryRequest,
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<()> {
    match workflow.run_query(request).await {
        RunOutcome::Done(output) => write_out(out, &render_output(&output, format)?),
        RunOutcome::Failed(report) => Err(report.error),
    }
}

fn write_out(out: &mut dyn Write, text: &str) -> Result<()> {
    out.write_all(text.as_bytes())
        .and_then(|_| out.flush())
        .map_err(|e| PortalError::internal(format!("Failed to write output: {e}")))
}
