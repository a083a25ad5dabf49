//! Result table rendering for the terminal.
//!
//! Renders tables as aligned text with auto-sized columns, or as JSON for
//! piping into other tools.

use serde::Serialize;
use std::str::FromStr;

use crate::db::{ResultTable, Value};
use crate::error::{PortalError, Result};
use crate::workflow::QueryOutput;

/// Maximum width for any column.
const MAX_COLUMN_WIDTH: usize = 40;

/// Minimum width for any column.
const MIN_COLUMN_WIDTH: usize = 4;

/// How results are written to stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned text table.
    #[default]
    Table,
    /// JSON document with run metadata and rows.
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "text" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            _ => Err(format!(
                "Invalid output format: {s}. Expected: table or json"
            )),
        }
    }
}

/// Truncates a string to fit within the given width, adding ellipsis if needed.
fn truncate(s: &str, max_width: usize) -> String {
    let len = s.chars().count();
    if len <= max_width {
        s.to_string()
    } else if max_width <= 3 {
        s.chars().take(max_width).collect()
    } else {
        let kept: String = s.chars().take(max_width - 3).collect();
        format!("{kept}...")
    }
}

fn cell_text(value: &Value) -> String {
    value.to_display_string().replace(['\n', '\t'], " ")
}

/// Calculates the display width of each column.
fn column_widths(table: &ResultTable) -> Vec<usize> {
    let mut widths: Vec<usize> = table
        .columns
        .iter()
        .map(|col| col.name.chars().count().max(MIN_COLUMN_WIDTH))
        .collect();

    for row in &table.rows {
        for (i, value) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell_text(value).chars().count());
            }
        }
    }

    widths.iter().map(|&w| w.min(MAX_COLUMN_WIDTH)).collect()
}

/// Renders a table as aligned text with a header rule and row count.
pub fn render_table(table: &ResultTable) -> String {
    if table.columns.is_empty() {
        return "(empty result)\n".to_string();
    }

    let widths = column_widths(table);
    let mut out = String::new();

    let header: Vec<String> = table
        .columns
        .iter()
        .zip(&widths)
        .map(|(col, &w)| format!("{:<w$}", truncate(&col.name, w)))
        .collect();
    out.push_str(header.join(" | ").trim_end());
    out.push('\n');

    let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    out.push_str(&rule.join("-+-"));
    out.push('\n');

    for row in &table.rows {
        let cells: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, &w)| {
                let text = row.get(i).map(cell_text).unwrap_or_default();
                let text = truncate(&text, w);
                match row.get(i) {
                    Some(Value::Int(_)) | Some(Value::Float(_)) => format!("{text:>w$}"),
                    _ => format!("{text:<w$}"),
                }
            })
            .collect();
        out.push_str(cells.join(" | ").trim_end());
        out.push('\n');
    }

    let noun = if table.row_count == 1 { "row" } else { "rows" };
    out.push_str(&format!("({} {noun})\n", table.row_count));
    out
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    run_id: i64,
    run_page_url: Option<&'a str>,
    table: &'a str,
    result: &'a ResultTable,
}

/// Renders a finished query as a JSON document.
pub fn render_json(output: &QueryOutput) -> Result<String> {
    let doc = JsonOutput {
        run_id: output.run.run_id,
        run_page_url: output.run_page_url(),
        table: &output.table_name,
        result: &output.table,
    };
    serde_json::to_string_pretty(&doc)
        .map_err(|e| PortalError::internal(format!("Failed to serialize result: {e}")))
}

/// Renders a finished query in the requested format.
pub fn render_output(output: &QueryOutput, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(render_table(&output.table)),
        OutputFormat::Json => render_json(output).map(|s| s + "\n"),
    }
}
