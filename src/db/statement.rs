//! Wire models for the SQL Statement Execution API.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/2.0/sql/statements`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatementRequest {
    pub warehouse_id: String,
    pub statement: String,
    pub wait_timeout: String,
    pub on_wait_timeout: String,
    pub format: String,
    pub disposition: String,
}

impl StatementRequest {
    /// Builds an inline JSON_ARRAY request that keeps running past the wait timeout.
    pub fn inline(
        warehouse_id: impl Into<String>,
        statement: impl Into<String>,
        wait_timeout_secs: u64,
    ) -> Self {
        Self {
            warehouse_id: warehouse_id.into(),
            statement: statement.into(),
            wait_timeout: format!("{wait_timeout_secs}s"),
            on_wait_timeout: "CONTINUE".to_string(),
            format: "JSON_ARRAY".to_string(),
            disposition: "INLINE".to_string(),
        }
    }
}

/// Statement status and, once succeeded, the first result chunk.
#[derive(Debug, Clone, Deserialize)]
pub struct StatementResponse {
    pub statement_id: String,
    pub status: StatementStatus,
    #[serde(default)]
    pub manifest: Option<ResultManifest>,
    #[serde(default)]
    pub result: Option<ResultData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatementStatus {
    pub state: StatementState,
    #[serde(default)]
    pub error: Option<ServiceError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatementState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
    Closed,
    #[serde(other)]
    Unknown,
}

impl StatementState {
    /// Returns true once the statement will make no further progress.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceError {
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ServiceError {
    /// Returns `CODE: message`, or whichever half is present.
    pub fn describe(&self) -> String {
        match (&self.error_code, &self.message) {
            (Some(code), Some(msg)) => format!("{code}: {msg}"),
            (None, Some(msg)) => msg.clone(),
            (Some(code), None) => code.clone(),
            (None, None) => "unknown error".to_string(),
        }
    }

    /// Returns true when the engine reports the referenced table is missing.
    pub fn is_table_not_found(&self) -> bool {
        const MARKER: &str = "TABLE_OR_VIEW_NOT_FOUND";
        self.error_code.as_deref() == Some(MARKER)
            || self.message.as_deref().is_some_and(|m| m.contains(MARKER))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultManifest {
    #[serde(default)]
    pub schema: Option<ResultSchema>,
    #[serde(default)]
    pub total_row_count: Option<i64>,
    #[serde(default)]
    pub total_chunk_count: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultSchema {
    #[serde(default)]
    pub columns: Vec<ColumnSchema>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    #[serde(default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub position: Option<i64>,
}

/// One chunk of inline rows.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultData {
    #[serde(default)]
    pub chunk_index: Option<i64>,
    #[serde(default)]
    pub row_count: Option<i64>,
    #[serde(default)]
    pub data_array: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    pub next_chunk_index: Option<i64>,
}
