//! Crawl and store error taxonomy
//!
//! Every failure kind the engine can surface is a variant here. Top-level
//! operations catch these and turn them into structured responses; nothing
//! escapes the application facade as a panic or a raw error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure kinds surfaced by the crawl/sync engine.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum CrawlError {
    /// Request failed outright or returned a non-success status.
    #[error("network request failed: {0}")]
    Network(String),

    /// The remote payload decoded fine but carried an explicit error field.
    #[error("remote api error: {0}")]
    Api(String),

    /// The remote payload was missing the expected result field.
    #[error("remote api returned an empty result: {0}")]
    EmptyResult(String),

    /// Page structure did not match the expected layout.
    #[error("failed to parse page content: {0}")]
    Parse(String),

    /// A store write was rejected because the revision was stale.
    #[error("conflicting write for document {id}")]
    Conflict { id: String },

    /// Collection-level read/write failure in the local store.
    #[error("storage operation failed: {0}")]
    Storage(String),
}

impl CrawlError {
    /// True when the write was rejected on a stale revision and may be
    /// retried with a corrected one.
    pub fn is_conflict(&self) -> bool {
        matches!(self, CrawlError::Conflict { .. })
    }
}

impl From<sqlx::Error> for CrawlError {
    fn from(err: sqlx::Error) -> Self {
        CrawlError::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for CrawlError {
    fn from(err: reqwest::Error) -> Self {
        CrawlError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_is_distinguishable() {
        let err = CrawlError::Conflict {
            id: "a#q#A1#x".to_string(),
        };
        assert!(err.is_conflict());
        assert!(!CrawlError::Network("timeout".to_string()).is_conflict());
    }

    #[test]
    fn display_messages_carry_context() {
        let err = CrawlError::Parse("missing #vvp-items-grid".to_string());
        assert!(err.to_string().contains("vvp-items-grid"));
    }
}
