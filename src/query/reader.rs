//! Reads a whole table through a SQL connection.

use std::time::Instant;
use tracing::{debug, warn};

use crate::db::{Cursor, ResultTable, SqlConnection};
use crate::error::Result;

/// Reads every row of `table_name`.
///
/// The cursor is closed on every exit path. Callers get either the fully
/// materialized table or an error, never a partial result.
pub async fn read_table(table_name: &str, connection: &dyn SqlConnection) -> Result<ResultTable> {
    let start = Instant::now();
    let mut cursor = connection.cursor().await?;

    let result = select_all(cursor.as_mut(), table_name).await;

    if let Err(e) = cursor.close().await {
        warn!(table = table_name, "Failed to close cursor: {}", e);
    }

    let table = result?;
    debug!(
        table = table_name,
        rows = table.row_count,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Read output table"
    );
    Ok(table)
}

async fn select_all(cursor: &mut dyn Cursor, table_name: &str) -> Result<ResultTable> {
    cursor.execute(&format!("SELECT * FROM {table_name}")).await?;
    cursor.fetch_all().await
}
