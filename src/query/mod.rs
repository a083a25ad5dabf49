//! Query requests and output table reads.
//!
//! A `QueryRequest` is what the user submits; `read_table` is how the job's
//! output is pulled back over the SQL endpoint.

pub mod reader;

pub use reader::read_table;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PortalError;

/// Dataset partition a query is allowed to target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    #[serde(rename = "All")]
    All,
    #[serde(rename = "NBCU")]
    Nbcu,
}

impl Scope {
    /// Returns the value passed to the notebook.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Nbcu => "NBCU",
        }
    }
}

impl FromStr for Scope {
    type Err = PortalError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALL" => Ok(Self::All),
            "NBCU" => Ok(Self::Nbcu),
            "" => Err(PortalError::config("A dataset scope must be selected")),
            _ => Err(PortalError::config(format!(
                "Unknown dataset scope '{s}'. Expected one of: All, NBCU"
            ))),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One activation of "Run Query".
///
/// Immutable once built. Empty query text is allowed; the notebook decides
/// what it means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    query_text: String,
    scope: Scope,
}

impl QueryRequest {
    /// Creates a request for the given query and scope.
    pub fn new(query_text: impl Into<String>, scope: Scope) -> Self {
        Self {
            query_text: query_text.into(),
            scope,
        }
    }

    pub fn query_text(&self) -> &str {
        &self.query_text
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }
}
