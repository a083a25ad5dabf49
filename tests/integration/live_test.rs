//! Live workspace tests.
//!
//! These talk to a real workspace and are skipped unless DATABRICKS_HOST and
//! DATABRICKS_TOKEN are set. The query test also submits a clean room job, so
//! it additionally needs CLEANROOM_LIVE_QUERY to be set to the SQL to run.

use std::sync::Arc;

use cleanroom_portal::app::{clean_room_names, Services};
use cleanroom_portal::config::{Config, WorkspaceConfig};
use cleanroom_portal::query::{QueryRequest, Scope};
use cleanroom_portal::workflow::NoopReporter;

/// Builds a config from the environment, or `None` when credentials are missing.
fn live_config() -> Option<Config> {
    let mut workspace = WorkspaceConfig::default();
    workspace.apply_env_defaults();
    workspace.host.as_ref()?;
    workspace.token.as_ref()?;
    Some(Config {
        workspace,
        ..Default::default()
    })
}

#[tokio::test]
async fn test_list_clean_rooms() {
    let Some(config) = live_config() else {
        eprintln!("Skipping test: DATABRICKS_HOST or DATABRICKS_TOKEN not set");
        return;
    };

    let services = Services::connect(&config).unwrap();
    let rooms = services.workspace.list_clean_rooms().await.unwrap();

    assert!(clean_room_names(&rooms).iter().all(|name| !name.is_empty()));
}

#[tokio::test]
async fn test_connect_to_default_warehouse() {
    let Some(config) = live_config() else {
        eprintln!("Skipping test: DATABRICKS_HOST or DATABRICKS_TOKEN not set");
        return;
    };

    let services = Services::connect(&config).unwrap();
    let connection = services
        .connector
        .connect(&config.workflow.http_path)
        .await
        .unwrap();

    assert_eq!(connection.http_path(), config.workflow.http_path);
}

#[tokio::test]
async fn test_run_query_end_to_end() {
    let Some(config) = live_config() else {
        eprintln!("Skipping test: DATABRICKS_HOST or DATABRICKS_TOKEN not set");
        return;
    };
    let Ok(sql) = std::env::var("CLEANROOM_LIVE_QUERY") else {
        eprintln!("Skipping test: CLEANROOM_LIVE_QUERY not set");
        return;
    };

    let services = Services::connect(&config).unwrap();
    let mut workflow = services.workflow(&config, Arc::new(NoopReporter));
    let outcome = workflow
        .run_query(&QueryRequest::new(sql, Scope::All))
        .await;

    if let Some(report) = outcome.failure() {
        panic!("{}", report.message);
    }
    let output = outcome.output().unwrap();
    assert!(output.table_name.ends_with(".cr_output_table"));
    assert!(output.run_page_url().is_some());
}
