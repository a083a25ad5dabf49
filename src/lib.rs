//! cleanroom-portal - submit SQL to a Databricks clean room and read back the
//! job's output table.
//!
//! This library exposes the core modules for the `cleanroom` binary and for
//! integration tests.

pub mod app;
pub mod cli;
pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod http;
pub mod jobs;
pub mod logging;
pub mod query;
pub mod render;
pub mod shell;
pub mod workflow;
pub mod workspace;

#[cfg(test)]
mod stub_server;
