//! Error types for the clean room portal.
//!
//! Defines the main error enum used throughout the application.

use thiserror::Error;

/// Main error type for portal operations.
#[derive(Error, Debug)]
pub enum PortalError {
    /// Endpoint unreachable or bad credentials.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Malformed SQL or engine-side failure.
    #[error("Query error: {0}")]
    QueryExecution(String),

    /// The remote run failed, timed out, or could not be created.
    #[error("Job submission error: {message}")]
    JobSubmission {
        message: String,
        run_id: Option<i64>,
        run_page_url: Option<String>,
    },

    /// The run finished but produced no usable output descriptor.
    #[error("Output resolution error: {0}")]
    OutputResolution(String),

    /// Output table missing or unreadable.
    #[error("Table read error: {0}")]
    TableRead(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PortalError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query execution error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::QueryExecution(msg.into())
    }

    /// Creates a job submission error without run context.
    pub fn job(msg: impl Into<String>) -> Self {
        Self::JobSubmission {
            message: msg.into(),
            run_id: None,
            run_page_url: None,
        }
    }

    /// Creates a job submission error that points at a specific run.
    pub fn job_run(
        msg: impl Into<String>,
        run_id: Option<i64>,
        run_page_url: Option<String>,
    ) -> Self {
        Self::JobSubmission {
            message: msg.into(),
            run_id,
            run_page_url,
        }
    }

    /// Creates an output resolution error with the given message.
    pub fn output(msg: impl Into<String>) -> Self {
        Self::OutputResolution(msg.into())
    }

    /// Creates a table read error with the given message.
    pub fn table_read(msg: impl Into<String>) -> Self {
        Self::TableRead(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::QueryExecution(_) => "Query Error",
            Self::JobSubmission { .. } => "Job Submission Error",
            Self::OutputResolution(_) => "Output Resolution Error",
            Self::TableRead(_) => "Table Read Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Returns the run page URL attached to a job failure, if any.
    pub fn run_page_url(&self) -> Option<&str> {
        match self {
            Self::JobSubmission { run_page_url, .. } => run_page_url.as_deref(),
            _ => None,
        }
    }

    /// Builds the message shown to the user when a run fails.
    ///
    /// Job failures carry a link to the remote run for diagnosis.
    pub fn user_message(&self) -> String {
        match self.run_page_url() {
            Some(url) => format!("Error during run: {self} (details: {url})"),
            None => format!("Error during run: {self}"),
        }
    }
}

/// Result type alias using PortalError.
pub type Result<T> = std::result::Result<T, PortalError>;
