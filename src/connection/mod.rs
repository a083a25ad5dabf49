//! Connection management.
//!
//! Centralizes the lifecycle of SQL endpoint connections.

pub mod provider;

pub use provider::ConnectionProvider;
