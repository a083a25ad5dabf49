//! Connection provider that caches one connection per endpoint path.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::db::{SqlConnection, SqlConnector};
use crate::error::{PortalError, Result};

/// Lazily opens and caches SQL connections keyed by endpoint path.
///
/// Owned by the workflow's composition root; connections live until the
/// provider is dropped.
pub struct ConnectionProvider {
    connector: Arc<dyn SqlConnector>,
    connections: HashMap<String, Arc<dyn SqlConnection>>,
}

impl ConnectionProvider {
    /// Creates a provider that opens connections through `connector`.
    pub fn new(connector: Arc<dyn SqlConnector>) -> Self {
        Self {
            connector,
            connections: HashMap::new(),
        }
    }

    /// Returns the connection for `http_path`, opening it on first use.
    ///
    /// Connect failures propagate unchanged and leave nothing cached.
    pub async fn get_connection(&mut self, http_path: &str) -> Result<Arc<dyn SqlConnection>> {
        if http_path.is_empty() {
            return Err(PortalError::config("SQL endpoint path must not be empty"));
        }

        if let Some(conn) = self.connections.get(http_path) {
            debug!(http_path, "Reusing cached connection");
            return Ok(Arc::clone(conn));
        }

        info!(http_path, "Opening SQL connection");
        let conn = self.connector.connect(http_path).await?;
        self.connections
            .insert(http_path.to_string(), Arc::clone(&conn));
        Ok(conn)
    }

    /// Check if a connection is cached for the given path.
    pub fn is_cached(&self, http_path: &str) -> bool {
        self.connections.contains_key(http_path)
    }

    /// Number of cached connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns true if no connection has been opened yet.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockSqlConnector;

    #[test]
    fn test_new_provider_is_empty() {
        let provider = ConnectionProvider::new(Arc::new(MockSqlConnector::new()));
        assert!(provider.is_empty());
        assert!(!provider.is_cached("/sql/1.0/warehouses/a"));
    }

    #[tokio::test]
    async fn test_same_path_returns_same_connection() {
        let connector = MockSqlConnector::new();
        let mut provider = ConnectionProvider::new(Arc::new(connector.clone()));

        let first = provider.get_connection("/sql/1.0/warehouses/a").await.unwrap();
        let second = provider.get_connection("/sql/1.0/warehouses/a").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(connector.connect_count(), 1);
        assert_eq!(provider.len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_paths_get_distinct_connections() {
        let connector = MockSqlConnector::new();
        let mut provider = ConnectionProvider::new(Arc::new(connector.clone()));

        let a = provider.get_connection("/sql/1.0/warehouses/a").await.unwrap();
        let b = provider.get_connection("/sql/1.0/warehouses/b").await.unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a.http_path(), "/sql/1.0/warehouses/a");
        assert_eq!(b.http_path(), "/sql/1.0/warehouses/b");
        assert_eq!(connector.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_paths_are_matched_exactly() {
        let connector = MockSqlConnector::new();
        let mut provider = ConnectionProvider::new(Arc::new(connector.clone()));

        provider.get_connection("/sql/1.0/warehouses/a").await.unwrap();
        provider.get_connection("/sql/1.0/warehouses/a/").await.unwrap();

        assert_eq!(connector.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_connect_failure_propagates_and_is_not_cached() {
        let mut provider =
            ConnectionProvider::new(Arc::new(MockSqlConnector::failing_connect("401")));

        let err = provider.get_connection("/p").await.err().unwrap();

        assert_eq!(err.to_string(), "Connection error: 401");
        assert!(!provider.is_cached("/p"));
    }

    #[tokio::test]
    async fn test_empty_path_rejected() {
        let mut provider = ConnectionProvider::new(Arc::new(MockSqlConnector::new()));
        let err = provider.get_connection("").await.err().unwrap();
        assert_eq!(err.category(), "Configuration Error");
    }
}
