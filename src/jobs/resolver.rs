//! Resolves where a finished run materialized its output table.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::OUTPUT_TABLE_NAME;
use crate::error::{PortalError, Result};
use crate::workspace::{Run, RunOutput, WorkspaceApi};

/// Catalog and schema holding a run's output table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputLocation {
    pub catalog_name: String,
    pub schema_name: String,
}

impl OutputLocation {
    pub fn new(catalog_name: impl Into<String>, schema_name: impl Into<String>) -> Self {
        Self {
            catalog_name: catalog_name.into(),
            schema_name: schema_name.into(),
        }
    }

    /// Fully qualified name of the output table in this location.
    ///
    /// Catalog and schema are backtick-quoted; the table name is always
    /// [`OUTPUT_TABLE_NAME`].
    pub fn table_name(&self) -> String {
        format!(
            "{}.{}.{}",
            quote_identifier(&self.catalog_name),
            quote_identifier(&self.schema_name),
            OUTPUT_TABLE_NAME
        )
    }
}

impl fmt::Display for OutputLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.catalog_name, self.schema_name)
    }
}

fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Looks up run outputs through the workspace API.
pub struct OutputResolver {
    api: Arc<dyn WorkspaceApi>,
}

impl OutputResolver {
    pub fn new(api: Arc<dyn WorkspaceApi>) -> Self {
        Self { api }
    }

    /// Resolves the output location of a terminal run.
    ///
    /// Only the first task is inspected; runs submitted by this workflow
    /// always have exactly one.
    pub async fn resolve_output_location(&self, run: &Run) -> Result<OutputLocation> {
        let task = run.tasks.first().ok_or_else(|| {
            PortalError::output(format!("Run {} has no tasks to read output from", run.run_id))
        })?;
        if run.tasks.len() > 1 {
            warn!(
                run_id = run.run_id,
                tasks = run.tasks.len(),
                "Run has more than one task; using the first"
            );
        }

        let output = self.api.get_run_output(task.run_id).await?;
        let location = extract_location(task.run_id, &output)?;
        debug!(run_id = task.run_id, location = %location, "Resolved output location");
        Ok(location)
    }
}

/// Walks the optional fields of a run output down to the catalog and schema.
pub fn extract_location(task_run_id: i64, output: &RunOutput) -> Result<OutputLocation> {
    let missing = |field: &str| {
        let mut msg = format!("Run {task_run_id} output has no {field}");
        if let Some(err) = output.error.as_deref().filter(|e| !e.is_empty()) {
            msg.push_str(&format!(" (notebook error: {err})"));
        }
        PortalError::output(msg)
    };

    let info = output
        .clean_rooms_notebook_output
        .as_ref()
        .ok_or_else(|| missing("clean_rooms_notebook_output"))?
        .output_schema_info
        .as_ref()
        .ok_or_else(|| missing("output_schema_info"))?;

    let catalog = info
        .catalog_name
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| missing("output_schema_info.catalog_name"))?;
    let schema = info
        .schema_name
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| missing("output_schema_info.schema_name"))?;

    Ok(OutputLocation::new(catalog, schema))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::{
        CleanRoomsNotebookOutput, MockRunBehavior, MockWorkspace, OutputSchemaInfo, SubmitRun,
    };
    use std::time::Duration;

    fn output_with(info: Option<OutputSchemaInfo>) -> RunOutput {
        RunOutput {
            clean_rooms_notebook_output: Some(CleanRoomsNotebookOutput {
                output_schema_info: info,
            }),
            ..Default::default()
        }
    }

    async fn finished_run(ws: &MockWorkspace) -> Run {
        let request = SubmitRun {
            run_name: "r".to_string(),
            tasks: vec![],
        };
        ws.submit_and_wait(&request, Duration::from_secs(1))
            .await
            .unwrap()
    }

    #[test]
    fn test_table_name_format() {
        let location = OutputLocation::new("c1", "s1");
        assert_eq!(location.table_name(), "`c1`.`s1`.cr_output_table");
        assert_eq!(location.to_string(), "c1.s1");
    }

    #[test]
    fn test_table_name_escapes_backticks() {
        let location = OutputLocation::new("we`ird", "s");
        assert_eq!(location.table_name(), "`we``ird`.`s`.cr_output_table");
    }

    #[test]
    fn test_extract_location() {
        let output = output_with(Some(OutputSchemaInfo::new("cat", "sch")));
        let location = extract_location(1, &output).unwrap();
        assert_eq!(location, OutputLocation::new("cat", "sch"));
    }

    #[test]
    fn test_extract_location_missing_schema_info() {
        let err = extract_location(7, &output_with(None)).unwrap_err();
        assert_eq!(err.category(), "Output Resolution Error");
        assert!(err.to_string().contains("output_schema_info"));
    }

    #[test]
    fn test_extract_location_missing_notebook_output_includes_error() {
        let output = RunOutput {
            error: Some("AnalysisException: bad column".to_string()),
            ..Default::default()
        };
        let err = extract_location(7, &output).unwrap_err();
        assert!(err.to_string().contains("clean_rooms_notebook_output"));
        assert!(err.to_string().contains("AnalysisException"));
    }

    #[test]
    fn test_extract_location_empty_catalog() {
        let output = output_with(Some(OutputSchemaInfo::new("", "sch")));
        let err = extract_location(7, &output).unwrap_err();
        assert!(err.to_string().contains("catalog_name"));
    }

    #[tokio::test]
    async fn test_resolve_reads_first_task_output() {
        let ws = MockWorkspace::succeeding("c1", "s1");
        let run = finished_run(&ws).await;
        let resolver = OutputResolver::new(Arc::new(ws.clone()));

        let location = resolver.resolve_output_location(&run).await.unwrap();

        assert_eq!(location, OutputLocation::new("c1", "s1"));
        assert_eq!(ws.output_requests(), vec![run.tasks[0].run_id]);
    }

    #[tokio::test]
    async fn test_resolve_missing_output_schema_info() {
        let ws = MockWorkspace::with_behavior(MockRunBehavior::Succeed { output: None });
        let run = finished_run(&ws).await;
        let resolver = OutputResolver::new(Arc::new(ws));

        let err = resolver.resolve_output_location(&run).await.unwrap_err();
        assert_eq!(err.category(), "Output Resolution Error");
    }

    #[tokio::test]
    async fn test_resolve_run_without_tasks() {
        let ws = MockWorkspace::new();
        let mut run = finished_run(&ws).await;
        run.tasks.clear();
        let resolver = OutputResolver::new(Arc::new(ws.clone()));

        let err = resolver.resolve_output_location(&run).await.unwrap_err();
        assert_eq!(err.category(), "Output Resolution Error");
        assert!(ws.output_requests().is_empty());
    }
}
