//! SQL endpoint abstraction.
//!
//! Provides a trait-based interface over the query endpoint so the workflow
//! can run against the live warehouse or an in-memory mock.

mod mock;
mod statement;
mod types;
mod warehouse;

pub use mock::MockSqlConnector;
pub use statement::{
    ColumnSchema, ResultData, ResultManifest, ResultSchema, ServiceError, StatementRequest,
    StatementResponse, StatementState, StatementStatus,
};
pub use types::{ColumnInfo, ResultTable, Row, Value};
pub use warehouse::{parse_warehouse_id, WarehouseConnector};

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Opens connections to a query endpoint.
///
/// Implementations carry the process-wide host and credential configuration;
/// callers only name the endpoint path.
#[async_trait]
pub trait SqlConnector: Send + Sync {
    /// Establishes a new connection for the given endpoint path.
    async fn connect(&self, http_path: &str) -> Result<Arc<dyn SqlConnection>>;
}

/// A reusable handle to a query endpoint.
#[async_trait]
pub trait SqlConnection: Send + Sync {
    /// Returns the endpoint path this connection was opened for.
    fn http_path(&self) -> &str;

    /// Acquires a cursor. Callers must `close` it on every exit path.
    async fn cursor(&self) -> Result<Box<dyn Cursor>>;
}

/// A single-statement query cursor.
#[async_trait]
pub trait Cursor: Send {
    /// Executes a SQL statement, waiting until the engine finishes it.
    async fn execute(&mut self, sql: &str) -> Result<()>;

    /// Materializes every row produced by the last statement.
    async fn fetch_all(&mut self) -> Result<ResultTable>;

    /// Releases the cursor. Safe to call more than once.
    async fn close(&mut self) -> Result<()>;
}
