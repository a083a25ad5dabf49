//! SQL warehouse client over the Statement Execution API.
//!
//! Provides `WarehouseConnector`, which implements `SqlConnector` by mapping an
//! endpoint path such as `/sql/1.0/warehouses/<id>` onto the warehouse id used
//! by the REST statement endpoints.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::statement::{ResultData, StatementRequest, StatementResponse, StatementState};
use super::{ColumnInfo, Cursor, ResultTable, Row, SqlConnection, SqlConnector, Value};
use crate::config::WorkflowConfig;
use crate::error::{PortalError, Result};
use crate::http::{ApiClient, ErrorKind};

/// Interval between statement status polls.
const STATEMENT_POLL_INTERVAL_MS: u64 = 500;

/// Extracts the warehouse id from an endpoint path.
///
/// Accepts `/sql/1.0/warehouses/<id>` and the older `/sql/1.0/endpoints/<id>`.
pub fn parse_warehouse_id(http_path: &str) -> Result<String> {
    let trimmed = http_path.trim().trim_end_matches('/');
    let mut segments = trimmed.rsplitn(2, '/');
    let id = segments.next().unwrap_or_default();
    let prefix = segments.next().unwrap_or_default();

    let known_prefix = prefix.ends_with("/warehouses") || prefix.ends_with("/endpoints");
    if id.is_empty() || !known_prefix {
        return Err(PortalError::config(format!(
            "Invalid SQL endpoint path '{http_path}'. Expected /sql/1.0/warehouses/<id>"
        )));
    }

    Ok(id.to_string())
}

/// Subset of `GET /api/2.0/sql/warehouses/<id>` used to verify access.
#[derive(Debug, Deserialize)]
struct WarehouseInfo {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

/// Opens warehouse connections using shared workspace credentials.
#[derive(Debug, Clone)]
pub struct WarehouseConnector {
    api: ApiClient,
    wait_timeout_secs: u64,
}

impl WarehouseConnector {
    /// Creates a connector from an API client and the workflow settings.
    pub fn new(api: ApiClient, workflow: &WorkflowConfig) -> Self {
        Self {
            api,
            wait_timeout_secs: workflow.statement_wait_timeout_secs,
        }
    }
}

#[async_trait]
impl SqlConnector for WarehouseConnector {
    async fn connect(&self, http_path: &str) -> Result<Arc<dyn SqlConnection>> {
        let warehouse_id = parse_warehouse_id(http_path)?;

        let info: WarehouseInfo = self
            .api
            .get_json(
                &format!("api/2.0/sql/warehouses/{warehouse_id}"),
                &[],
                ErrorKind::Connection,
            )
            .await?;

        info!(
            warehouse_id = %warehouse_id,
            name = info.name.as_deref().unwrap_or("unknown"),
            state = info.state.as_deref().unwrap_or("unknown"),
            "Connected to SQL warehouse"
        );

        Ok(Arc::new(WarehouseConnection {
            api: self.api.clone(),
            http_path: http_path.to_string(),
            warehouse_id,
            wait_timeout_secs: self.wait_timeout_secs,
        }))
    }
}

/// A connection to one SQL warehouse.
#[derive(Debug)]
struct WarehouseConnection {
    api: ApiClient,
    http_path: String,
    warehouse_id: String,
    wait_timeout_secs: u64,
}

#[async_trait]
impl SqlConnection for WarehouseConnection {
    fn http_path(&self) -> &str {
        &self.http_path
    }

    async fn cursor(&self) -> Result<Box<dyn Cursor>> {
        Ok(Box::new(WarehouseCursor {
            api: self.api.clone(),
            warehouse_id: self.warehouse_id.clone(),
            wait_timeout_secs: self.wait_timeout_secs,
            statement: None,
            started_at: None,
            closed: false,
        }))
    }
}

/// Cursor over a single statement.
struct WarehouseCursor {
    api: ApiClient,
    warehouse_id: String,
    wait_timeout_secs: u64,
    statement: Option<StatementResponse>,
    started_at: Option<Instant>,
    closed: bool,
}

impl WarehouseCursor {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(PortalError::internal("Cursor is already closed"));
        }
        Ok(())
    }

    async fn poll_statement(&self, statement_id: &str) -> Result<StatementResponse> {
        self.api
            .get_json(
                &format!("api/2.0/sql/statements/{statement_id}"),
                &[],
                ErrorKind::Query,
            )
            .await
    }

    async fn fetch_chunk(&self, statement_id: &str, chunk_index: i64) -> Result<ResultData> {
        self.api
            .get_json(
                &format!("api/2.0/sql/statements/{statement_id}/result/chunks/{chunk_index}"),
                &[],
                ErrorKind::TableRead,
            )
            .await
    }
}

#[async_trait]
impl Cursor for WarehouseCursor {
    async fn execute(&mut self, sql: &str) -> Result<()> {
        self.ensure_open()?;

        let request = StatementRequest::inline(&self.warehouse_id, sql, self.wait_timeout_secs);
        self.started_at = Some(Instant::now());

        let mut response: StatementResponse = self
            .api
            .post_json("api/2.0/sql/statements", &request, ErrorKind::Query)
            .await?;
        let statement_id = response.statement_id.clone();
        debug!(statement_id = %statement_id, state = ?response.status.state, "Statement submitted");

        while !response.status.state.is_terminal() {
            // Record the in-flight id so close() can cancel it.
            self.statement = Some(response);
            tokio::time::sleep(Duration::from_millis(STATEMENT_POLL_INTERVAL_MS)).await;
            response = self.poll_statement(&statement_id).await?;
        }

        let state = response.status.state;
        let error = response.status.error.clone();
        self.statement = Some(response);

        match state {
            StatementState::Succeeded => Ok(()),
            _ => {
                let detail = error
                    .as_ref()
                    .map(|e| e.describe())
                    .unwrap_or_else(|| format!("statement ended in state {state:?}"));
                if error.as_ref().is_some_and(|e| e.is_table_not_found()) {
                    Err(PortalError::table_read(detail))
                } else {
                    Err(PortalError::query(detail))
                }
            }
        }
    }

    async fn fetch_all(&mut self) -> Result<ResultTable> {
        self.ensure_open()?;

        let statement = self
            .statement
            .as_ref()
            .filter(|s| s.status.state == StatementState::Succeeded)
            .ok_or_else(|| PortalError::table_read("No successful statement to fetch from"))?;

        let columns: Vec<(ColumnInfo, String)> = statement
            .manifest
            .as_ref()
            .and_then(|m| m.schema.as_ref())
            .map(|s| {
                s.columns
                    .iter()
                    .map(|c| {
                        let type_name = c.type_name.clone().unwrap_or_else(|| "STRING".to_string());
                        (ColumnInfo::new(&c.name, &type_name), type_name)
                    })
                    .collect()
            })
            .unwrap_or_default();

        let statement_id = statement.statement_id.clone();
        let mut chunk = statement.result.clone().unwrap_or_default();
        let mut rows: Vec<Row> = Vec::new();

        loop {
            for raw in chunk.data_array.take().unwrap_or_default() {
                if raw.len() != columns.len() {
                    return Err(PortalError::table_read(format!(
                        "Row has {} values but the schema has {} columns",
                        raw.len(),
                        columns.len()
                    )));
                }
                let row = raw
                    .iter()
                    .zip(&columns)
                    .map(|(cell, (_, type_name))| Value::from_sql_text(type_name, cell.as_deref()))
                    .collect();
                rows.push(row);
            }

            match chunk.next_chunk_index {
                Some(next) => chunk = self.fetch_chunk(&statement_id, next).await?,
                None => break,
            }
        }

        let elapsed = self.started_at.map(|s| s.elapsed()).unwrap_or_default();
        let columns = columns.into_iter().map(|(c, _)| c).collect();
        Ok(ResultTable::with_data(columns, rows).with_execution_time(elapsed))
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let Some(statement) = self.statement.take() else {
            return Ok(());
        };

        if !statement.status.state.is_terminal() {
            warn!(statement_id = %statement.statement_id, "Cancelling unfinished statement");
            self.api
                .post_json::<_, serde_json::Value>(
                    &format!("api/2.0/sql/statements/{}/cancel", statement.statement_id),
                    &serde_json::json!({}),
                    ErrorKind::Query,
                )
                .await?;
        }

        Ok(())
    }
}
