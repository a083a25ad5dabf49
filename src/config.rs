//! Configuration management for the clean room portal.
//!
//! Handles loading configuration from TOML files and environment variables.
//! The `[workflow]` section carries the fixed job and endpoint targets; they
//! are not user-editable at run time.

use crate::error::{PortalError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Clean room every job is submitted to.
pub const DEFAULT_CLEAN_ROOM_NAME: &str = "comcast_cleanroom_do_not_delete";

/// Notebook executed inside the clean room.
pub const DEFAULT_NOTEBOOK_NAME: &str = "KAnon_Demo_Query_Notebook";

/// Content fingerprint pinning the notebook version.
pub const DEFAULT_NOTEBOOK_ETAG: &str =
    "55f069d3cfc9506734515f64271021a674b7a749cfd760cc628d2dae693e8fc5";

/// SQL endpoint used to read the job output.
pub const DEFAULT_HTTP_PATH: &str = "/sql/1.0/warehouses/c2dfc2e4e98e142c";

/// Table name the notebook writes its result to.
pub const OUTPUT_TABLE_NAME: &str = "cr_output_table";

/// Run name shown in the workspace jobs UI.
pub const DEFAULT_RUN_NAME: &str = "App-Triggered Cleanroom Job";

/// Task key of the single task in every submitted run.
pub const DEFAULT_TASK_KEY: &str = "cleanroomapp";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Workspace host and credentials.
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Job and endpoint targets.
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

/// Workspace connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Workspace host, with or without scheme.
    pub host: Option<String>,

    /// Personal access token (not recommended to store in config).
    pub token: Option<String>,

    /// Timeout for a single HTTP request in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            host: None,
            token: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl WorkspaceConfig {
    /// Applies `DATABRICKS_HOST` and `DATABRICKS_TOKEN` as defaults.
    pub fn apply_env_defaults(&mut self) {
        if self.host.is_none() {
            self.host = std::env::var("DATABRICKS_HOST").ok();
        }
        if self.token.is_none() {
            self.token = std::env::var("DATABRICKS_TOKEN").ok();
        }
    }

    /// Merges another config into this one, with the other taking precedence.
    pub fn merge(&mut self, other: &WorkspaceConfig) {
        if other.host.is_some() {
            self.host = other.host.clone();
        }
        if other.token.is_some() {
            self.token = other.token.clone();
        }
        if other.request_timeout_secs != default_request_timeout_secs() {
            self.request_timeout_secs = other.request_timeout_secs;
        }
    }

    /// Returns the workspace base URL, adding `https://` when no scheme is given.
    pub fn base_url(&self) -> Result<Url> {
        let host = self
            .host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| {
                PortalError::config("Workspace host is required (set DATABRICKS_HOST)")
            })?;

        let with_scheme = if host.contains("://") {
            host.to_string()
        } else {
            format!("https://{host}")
        };

        let url = Url::parse(&with_scheme)
            .map_err(|e| PortalError::config(format!("Invalid workspace host '{host}': {e}")))?;

        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(PortalError::config(format!(
                "Invalid scheme '{}'. Expected 'https'",
                url.scheme()
            )));
        }

        Ok(url)
    }

    /// Returns the access token or a configuration error.
    pub fn require_token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PortalError::config("Access token is required (set DATABRICKS_TOKEN)"))
    }

    /// Returns the per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Returns a display-safe string (no token) for UI purposes.
    pub fn display_string(&self) -> String {
        self.host.as_deref().unwrap_or("<no host>").to_string()
    }
}

/// Fixed targets of the query workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkflowConfig {
    pub clean_room_name: String,
    pub notebook_name: String,
    pub notebook_etag: String,
    pub http_path: String,
    pub run_name: String,
    pub task_key: String,

    /// Upper bound on waiting for a submitted run to finish.
    pub submit_timeout_secs: u64,

    /// Cap on the interval between run status polls.
    pub poll_interval_max_secs: u64,

    /// Server-side wait before a statement is polled instead.
    pub statement_wait_timeout_secs: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            clean_room_name: DEFAULT_CLEAN_ROOM_NAME.to_string(),
            notebook_name: DEFAULT_NOTEBOOK_NAME.to_string(),
            notebook_etag: DEFAULT_NOTEBOOK_ETAG.to_string(),
            http_path: DEFAULT_HTTP_PATH.to_string(),
            run_name: DEFAULT_RUN_NAME.to_string(),
            task_key: DEFAULT_TASK_KEY.to_string(),
            submit_timeout_secs: 20 * 60,
            poll_interval_max_secs: 10,
            statement_wait_timeout_secs: 30,
        }
    }
}

impl WorkflowConfig {
    /// Returns the submit-and-wait timeout.
    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }

    /// Returns the polling interval cap.
    pub fn poll_interval_max(&self) -> Duration {
        Duration::from_secs(self.poll_interval_max_secs.max(1))
    }

    /// Validates that every fixed target is present.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("clean_room_name", &self.clean_room_name),
            ("notebook_name", &self.notebook_name),
            ("notebook_etag", &self.notebook_etag),
            ("http_path", &self.http_path),
            ("task_key", &self.task_key),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(PortalError::config(format!(
                    "workflow.{field} must not be empty"
                )));
            }
        }
        if self.statement_wait_timeout_secs != 0
            && !(5..=50).contains(&self.statement_wait_timeout_secs)
        {
            return Err(PortalError::config(
                "workflow.statement_wait_timeout_secs must be 0 or between 5 and 50",
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cleanroom-portal")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file.
    ///
    /// A missing file yields the default configuration.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| PortalError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            PortalError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })?;
        config.workflow.validate()?;
        Ok(config)
    }
}
