//! Integration tests for cleanroom-portal.
//!
//! Live tests require DATABRICKS_HOST and DATABRICKS_TOKEN.

pub mod connection_test;
pub mod live_test;
pub mod workflow_test;
