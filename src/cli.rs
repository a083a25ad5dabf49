//! Command-line argument parsing for the portal.
//!
//! Uses clap derive. Values that need domain validation (scope, output
//! format) are kept as strings here and parsed by the accessor methods, so
//! the error surfaces through the crate's error type.

use crate::config::{Config, WorkspaceConfig};
use crate::error::{PortalError, Result};
use crate::query::Scope;
use crate::render::OutputFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Run SQL against a Databricks clean room and read back the result.
#[derive(Parser, Debug)]
#[command(name = "cleanroom")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true, value_name = "PATH", env = "CLEANROOM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Workspace host (e.g., adb-1234567890.1.azuredatabricks.net)
    #[arg(short = 'H', long, global = true, value_name = "HOST")]
    pub host: Option<String>,

    /// Use in-memory workspace and SQL endpoint (for testing)
    #[arg(long, global = true)]
    pub mock: bool,

    /// Output format for results
    #[arg(long, global = true, value_name = "FORMAT", default_value = "table")]
    pub format: String,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List the clean rooms the caller can access
    CleanRooms,

    /// Run one query as a clean room job and print its output table
    Run {
        /// Dataset scope (All or NBCU)
        #[arg(short, long, value_name = "SCOPE")]
        scope: String,

        /// SQL text to run
        #[arg(short, long, value_name = "SQL", conflicts_with = "file")]
        query: Option<String>,

        /// Read the SQL text from a file ("-" for stdin)
        #[arg(short, long, value_name = "PATH")]
        file: Option<PathBuf>,
    },

    /// Run queries interactively, one per line
    Shell {
        /// Initial dataset scope (All or NBCU)
        #[arg(short, long, value_name = "SCOPE", default_value = "All")]
        scope: String,
    },
}

/// Where the `run` command reads its SQL from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuerySource {
    Inline(String),
    File(PathBuf),
    Stdin,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Workspace settings given on the command line.
    pub fn to_workspace_config(&self) -> WorkspaceConfig {
        WorkspaceConfig {
            host: self.host.clone(),
            ..Default::default()
        }
    }

    /// Parses the output format from the --format argument.
    pub fn parse_output_format(&self) -> Result<OutputFormat> {
        self.format.parse().map_err(PortalError::config)
    }
}

impl Command {
    /// Parses the --scope argument of `run` and `shell`.
    pub fn scope(&self) -> Result<Option<Scope>> {
        match self {
            Self::CleanRooms => Ok(None),
            Self::Run { scope, .. } | Self::Shell { scope } => scope.parse().map(Some),
        }
    }

    /// Returns where `run` should read its SQL from.
    pub fn query_source(&self) -> Option<QuerySource> {
        match self {
            Self::Run {
                query: Some(sql), ..
            } => Some(QuerySource::Inline(sql.clone())),
            Self::Run {
                file: Some(path), ..
            } if path.as_os_str() != "-" => Some(QuerySource::File(path.clone())),
            Self::Run { .. } => Some(QuerySource::Stdin),
            _ => None,
        }
    }
}
