//! End-to-end workflow tests against the in-memory workspace and SQL endpoint.

use std::sync::Arc;

use cleanroom_portal::config::{WorkflowConfig, DEFAULT_CLEAN_ROOM_NAME, DEFAULT_NOTEBOOK_NAME};
use cleanroom_portal::db::{ColumnInfo, MockSqlConnector, ResultTable, Value};
use cleanroom_portal::jobs::OutputLocation;
use cleanroom_portal::query::{QueryRequest, Scope};
use cleanroom_portal::workflow::{RecordingReporter, Workflow, WorkflowEvent, WorkflowState};
use cleanroom_portal::workspace::{MockRunBehavior, MockWorkspace};
use pretty_assertions::assert_eq;

fn workflow(ws: &MockWorkspace, sql: &MockSqlConnector) -> Workflow {
    Workflow::new(
        Arc::new(ws.clone()),
        Arc::new(sql.clone()),
        &WorkflowConfig::default(),
    )
}

fn network_table() -> ResultTable {
    ResultTable::with_data(
        vec![
            ColumnInfo::new("network", "STRING"),
            ColumnInfo::new("reach", "BIGINT"),
        ],
        vec![
            vec![Value::from("NBC"), Value::Int(10)],
            vec![Value::from("Peacock"), Value::Int(20)],
            vec![Value::from("Bravo"), Value::Int(30)],
        ],
    )
}

#[tokio::test]
async fn test_successful_run_reads_output_table() {
    let ws = MockWorkspace::succeeding("c1", "s1");
    let sql = MockSqlConnector::with_table(network_table());
    let mut wf = workflow(&ws, &sql);

    let outcome = wf
        .run_query(&QueryRequest::new("SELECT 1", Scope::All))
        .await;

    let output = outcome.output().expect("run should succeed");
    assert_eq!(output.location, OutputLocation::new("c1", "s1"));
    assert_eq!(output.table_name, "`c1`.`s1`.cr_output_table");
    assert_eq!(output.table.row_count, 3);
    assert_eq!(output.table.column_names(), vec!["network", "reach"]);
    assert_eq!(
        sql.executed_sql(),
        vec!["SELECT * FROM `c1`.`s1`.cr_output_table".to_string()]
    );
    assert_eq!(sql.open_cursors(), 0);
    assert_eq!(wf.state(), WorkflowState::Idle);
}

#[tokio::test]
async fn test_submitted_run_carries_query_and_scope() {
    let ws = MockWorkspace::new();
    let sql = MockSqlConnector::new();
    let mut wf = workflow(&ws, &sql);

    wf.run_query(&QueryRequest::new("SELECT count(*) FROM t", Scope::Nbcu))
        .await;

    let requests = ws.submitted_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].run_name, "App-Triggered Cleanroom Job");
    assert_eq!(requests[0].tasks.len(), 1);

    let task = &requests[0].tasks[0];
    assert_eq!(task.task_key, "cleanroomapp");
    let notebook = &task.clean_rooms_notebook_task;
    assert_eq!(notebook.clean_room_name, DEFAULT_CLEAN_ROOM_NAME);
    assert_eq!(notebook.notebook_name, DEFAULT_NOTEBOOK_NAME);
    assert!(notebook.etag.is_some());
    assert_eq!(
        notebook.notebook_base_parameters["sql"],
        "SELECT count(*) FROM t"
    );
    assert_eq!(notebook.notebook_base_parameters["Dataset_Scope"], "NBCU");
}

#[tokio::test]
async fn test_failed_remote_run_reports_link_and_skips_read() {
    let ws = MockWorkspace::with_behavior(MockRunBehavior::Fail {
        message: "Notebook raised an exception".to_string(),
    });
    let sql = MockSqlConnector::new();
    let reporter = Arc::new(RecordingReporter::new());
    let mut wf = workflow(&ws, &sql).with_reporter(reporter.clone());

    let outcome = wf
        .run_query(&QueryRequest::new("SELECT 1", Scope::Nbcu))
        .await;

    let report = outcome.failure().expect("run should fail");
    assert_eq!(report.stage, WorkflowState::Submitting);
    assert_eq!(report.error.category(), "Job Submission Error");
    let url = report.error.run_page_url().expect("failure carries run link");
    assert!(report.message.starts_with("Error during run: "));
    assert!(report.message.contains(url));

    assert!(ws.output_requests().is_empty());
    assert_eq!(sql.connect_count(), 0);
    assert!(sql.executed_sql().is_empty());

    let events = reporter.take();
    assert_eq!(events.first(), Some(&WorkflowEvent::Submitting));
    assert!(matches!(events.last(), Some(WorkflowEvent::Failed { .. })));
    assert_eq!(wf.state(), WorkflowState::Idle);
}

#[tokio::test]
async fn test_missing_output_schema_info_skips_read() {
    let ws = MockWorkspace::with_behavior(MockRunBehavior::Succeed { output: None });
    let sql = MockSqlConnector::new();
    let mut wf = workflow(&ws, &sql);

    let outcome = wf
        .run_query(&QueryRequest::new("SELECT 1", Scope::All))
        .await;

    let report = outcome.failure().expect("resolution should fail");
    assert_eq!(report.stage, WorkflowState::Resolving);
    assert_eq!(report.error.category(), "Output Resolution Error");
    assert_eq!(ws.output_requests().len(), 1);
    assert_eq!(sql.cursors_opened(), 0);
    assert!(sql.executed_sql().is_empty());
}

#[tokio::test]
async fn test_identical_requests_submit_separate_runs() {
    let ws = MockWorkspace::new();
    let sql = MockSqlConnector::new();
    let mut wf = workflow(&ws, &sql);
    let request = QueryRequest::new("SELECT 1", Scope::All);

    let first = wf.run_query(&request).await;
    let second = wf.run_query(&request).await;

    assert_eq!(ws.submit_count(), 2);
    let first_id = first.output().map(|o| o.run.run_id);
    let second_id = second.output().map(|o| o.run.run_id);
    assert!(first_id.is_some());
    assert_ne!(first_id, second_id);
}

#[tokio::test]
async fn test_connection_is_reused_across_invocations() {
    let ws = MockWorkspace::new();
    let sql = MockSqlConnector::new();
    let mut wf = workflow(&ws, &sql);

    for query in ["SELECT 1", "SELECT 2", "SELECT 3"] {
        let outcome = wf.run_query(&QueryRequest::new(query, Scope::All)).await;
        assert!(outcome.is_done());
    }

    assert_eq!(sql.connect_count(), 1);
    assert_eq!(sql.cursors_opened(), 3);
    assert_eq!(sql.open_cursors(), 0);
    assert_eq!(wf.connections().len(), 1);
}

#[tokio::test]
async fn test_read_failure_is_reported_and_session_recovers() {
    let ws = MockWorkspace::new();
    let sql = MockSqlConnector::failing_execute("TABLE_OR_VIEW_NOT_FOUND");
    let mut wf = workflow(&ws, &sql);

    let outcome = wf
        .run_query(&QueryRequest::new("SELECT 1", Scope::All))
        .await;

    let report = outcome.failure().expect("read should fail");
    assert_eq!(report.stage, WorkflowState::Connecting);
    assert!(report.message.contains("TABLE_OR_VIEW_NOT_FOUND"));
    assert_eq!(sql.open_cursors(), 0);
    assert_eq!(wf.state(), WorkflowState::Idle);
}
