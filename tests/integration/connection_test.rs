//! Connection integration tests.
//!
//! Tests connection caching, table reads and error handling when the
//! endpoint cannot be reached.

use std::sync::Arc;
use std::time::Duration;

use cleanroom_portal::config::{WorkflowConfig, DEFAULT_HTTP_PATH};
use cleanroom_portal::connection::ConnectionProvider;
use cleanroom_portal::db::{parse_warehouse_id, MockSqlConnector, SqlConnector, WarehouseConnector};
use cleanroom_portal::http::{ApiClient, TokenCredentials};
use cleanroom_portal::query::read_table;
use cleanroom_portal::workspace::{RestWorkspaceClient, WorkspaceApi};
use url::Url;

/// Client pointed at a local port nothing listens on.
fn unreachable_api() -> ApiClient {
    let url = Url::parse("http://127.0.0.1:9").unwrap();
    ApiClient::new(
        url,
        Arc::new(TokenCredentials::new("dapi-test")),
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn test_same_path_returns_same_connection() {
    let connector = MockSqlConnector::new();
    let mut provider = ConnectionProvider::new(Arc::new(connector.clone()));

    let first = provider.get_connection(DEFAULT_HTTP_PATH).await.unwrap();
    let second = provider.get_connection(DEFAULT_HTTP_PATH).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(connector.connect_count(), 1);
}

#[tokio::test]
async fn test_distinct_paths_get_distinct_connections() {
    let connector = MockSqlConnector::new();
    let mut provider = ConnectionProvider::new(Arc::new(connector.clone()));

    let a = provider
        .get_connection("/sql/1.0/warehouses/aaa")
        .await
        .unwrap();
    let b = provider
        .get_connection("/sql/1.0/warehouses/bbb")
        .await
        .unwrap();

    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(a.http_path(), "/sql/1.0/warehouses/aaa");
    assert_eq!(b.http_path(), "/sql/1.0/warehouses/bbb");
    assert_eq!(provider.len(), 2);
    assert_eq!(connector.connect_count(), 2);
}

#[tokio::test]
async fn test_failed_connect_is_not_cached() {
    let connector = MockSqlConnector::failing_connect("endpoint stopped");
    let mut provider = ConnectionProvider::new(Arc::new(connector));

    let err = provider
        .get_connection(DEFAULT_HTTP_PATH)
        .await
        .err()
        .unwrap();

    assert_eq!(err.category(), "Connection Error");
    assert!(!provider.is_cached(DEFAULT_HTTP_PATH));
    assert!(provider.is_empty());
}

#[tokio::test]
async fn test_read_table_through_cached_connection() {
    let connector = MockSqlConnector::new();
    let mut provider = ConnectionProvider::new(Arc::new(connector.clone()));
    let connection = provider.get_connection(DEFAULT_HTTP_PATH).await.unwrap();

    let table = read_table("`c`.`s`.cr_output_table", connection.as_ref())
        .await
        .unwrap();
    let again = read_table("`c`.`s`.cr_output_table", connection.as_ref())
        .await
        .unwrap();

    assert_eq!(table.row_count, again.row_count);
    assert_eq!(connector.cursors_opened(), 2);
    assert_eq!(connector.open_cursors(), 0);
}

#[tokio::test]
async fn test_read_table_fetch_failure_closes_cursor() {
    let connector = MockSqlConnector::failing_fetch("chunk expired");
    let connection = connector.connect(DEFAULT_HTTP_PATH).await.unwrap();

    let err = read_table("t", connection.as_ref()).await.unwrap_err();

    assert_eq!(err.category(), "Table Read Error");
    assert_eq!(connector.open_cursors(), 0);
}

#[test]
fn test_default_path_names_a_warehouse() {
    assert_eq!(
        parse_warehouse_id(DEFAULT_HTTP_PATH).unwrap(),
        "c2dfc2e4e98e142c"
    );
}

#[tokio::test(flavor = "current_thread")]
async fn test_warehouse_connect_unreachable_host() {
    let connector = WarehouseConnector::new(unreachable_api(), &WorkflowConfig::default());

    let result = connector.connect(DEFAULT_HTTP_PATH).await;

    let err = result.err().unwrap();
    assert_eq!(err.category(), "Connection Error");
}

#[tokio::test(flavor = "current_thread")]
async fn test_list_clean_rooms_unreachable_host() {
    let client = RestWorkspaceClient::new(unreachable_api(), Duration::from_secs(1));

    let err = client.list_clean_rooms().await.unwrap_err();

    assert_eq!(err.category(), "Connection Error");
}
