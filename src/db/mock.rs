//! Mock SQL endpoint for testing.
//!
//! Provides an in-memory connector that returns a canned table and records
//! every connection, cursor and statement so tests can assert on them.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{ColumnInfo, Cursor, ResultTable, SqlConnection, SqlConnector, Value};
use crate::error::{PortalError, Result};

#[derive(Debug, Default)]
struct MockSqlState {
    table: ResultTable,
    connect_error: Option<String>,
    execute_error: Option<String>,
    fetch_error: Option<String>,
    connects: AtomicUsize,
    cursors_opened: AtomicUsize,
    cursors_closed: AtomicUsize,
    executed: Mutex<Vec<String>>,
}

/// A mock connector whose connections all share one recorded state.
///
/// Cloning yields another handle onto the same state.
#[derive(Debug, Clone)]
pub struct MockSqlConnector {
    state: Arc<MockSqlState>,
}

impl MockSqlConnector {
    /// Creates a mock that serves a small sample table.
    pub fn new() -> Self {
        Self::with_table(sample_table())
    }

    /// Creates a mock that serves the given table.
    pub fn with_table(table: ResultTable) -> Self {
        Self {
            state: Arc::new(MockSqlState {
                table,
                ..Default::default()
            }),
        }
    }

    /// Creates a mock whose `connect` always fails.
    pub fn failing_connect(msg: impl Into<String>) -> Self {
        Self {
            state: Arc::new(MockSqlState {
                connect_error: Some(msg.into()),
                ..Default::default()
            }),
        }
    }

    /// Creates a mock whose statements fail at execution.
    pub fn failing_execute(msg: impl Into<String>) -> Self {
        Self {
            state: Arc::new(MockSqlState {
                execute_error: Some(msg.into()),
                ..Default::default()
            }),
        }
    }

    /// Creates a mock whose statements succeed but cannot be fetched.
    pub fn failing_fetch(msg: impl Into<String>) -> Self {
        Self {
            state: Arc::new(MockSqlState {
                fetch_error: Some(msg.into()),
                ..Default::default()
            }),
        }
    }

    /// Number of successful `connect` calls.
    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Number of cursors handed out.
    pub fn cursors_opened(&self) -> usize {
        self.state.cursors_opened.load(Ordering::SeqCst)
    }

    /// Number of cursors currently open.
    pub fn open_cursors(&self) -> usize {
        self.cursors_opened() - self.state.cursors_closed.load(Ordering::SeqCst)
    }

    /// Every statement executed so far, in order.
    pub fn executed_sql(&self) -> Vec<String> {
        self.state
            .executed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for MockSqlConnector {
    fn default() -> Self {
        Self::new()
    }
}

fn sample_table() -> ResultTable {
    ResultTable::with_data(
        vec![
            ColumnInfo::new("network", "STRING"),
            ColumnInfo::new("households", "LONG"),
        ],
        vec![
            vec![Value::from("NBC"), Value::Int(1200)],
            vec![Value::from("Bravo"), Value::Int(340)],
        ],
    )
    .with_execution_time(Duration::from_millis(1))
}

#[async_trait]
impl SqlConnector for MockSqlConnector {
    async fn connect(&self, http_path: &str) -> Result<Arc<dyn SqlConnection>> {
        if let Some(msg) = &self.state.connect_error {
            return Err(PortalError::connection(msg.clone()));
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockSqlConnection {
            http_path: http_path.to_string(),
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockSqlConnection {
    http_path: String,
    state: Arc<MockSqlState>,
}

#[async_trait]
impl SqlConnection for MockSqlConnection {
    fn http_path(&self) -> &str {
        &self.http_path
    }

    async fn cursor(&self) -> Result<Box<dyn Cursor>> {
        self.state.cursors_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockCursor {
            state: Arc::clone(&self.state),
            executed: false,
            closed: false,
        }))
    }
}

struct MockCursor {
    state: Arc<MockSqlState>,
    executed: bool,
    closed: bool,
}

#[async_trait]
impl Cursor for MockCursor {
    async fn execute(&mut self, sql: &str) -> Result<()> {
        if self.closed {
            return Err(PortalError::internal("Cursor is already closed"));
        }
        self.state
            .executed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(sql.to_string());

        if let Some(msg) = &self.state.execute_error {
            return Err(PortalError::query(msg.clone()));
        }
        self.executed = true;
        Ok(())
    }

    async fn fetch_all(&mut self) -> Result<ResultTable> {
        if !self.executed {
            return Err(PortalError::table_read("No successful statement to fetch from"));
        }
        if let Some(msg) = &self.state.fetch_error {
            return Err(PortalError::table_read(msg.clone()));
        }
        Ok(self.state.table.clone())
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.state.cursors_closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
