//! Query client for the remote movie catalog.
//!
//! Catalog intents are rendered to SQL text, shipped to the catalog service
//! over its row/column JSON pipeline protocol, and parsed back into
//! [`Movie`] records by column name.

mod client;
pub mod sql;
pub mod wire;

pub use client::QueryClient;
pub use wire::{ColumnIndex, RecordMapping, ResultSet};

use async_trait::async_trait;
use thiserror::Error;

use crate::movie::Movie;

/// Errors returned by catalog queries.
///
/// Zero rows is not an error: queries return `Ok(vec![])`.
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    /// Network failure, non-success HTTP status or timeout.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Body was not JSON or lacked the result envelope.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The catalog service reported an SQL error.
    #[error("Remote query error: {0}")]
    Remote(String),
}

impl From<reqwest::Error> for QueryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            QueryError::Transport(format!("request timed out: {}", err))
        } else {
            QueryError::Transport(err.to_string())
        }
    }
}

/// Read-only access to the remote catalog.
///
/// Implemented by [`QueryClient`] and by the mock in `testing`.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Records in storage order.
    async fn fetch_page(&self, limit: usize, offset: usize) -> Result<Vec<Movie>, QueryError>;

    /// Up to `count` random records whose genre list contains `genre`
    /// (case-insensitive). May return fewer.
    async fn fetch_by_genre(&self, genre: &str, count: usize) -> Result<Vec<Movie>, QueryError>;

    /// Records whose normalized title contains the normalized `query`.
    async fn search_by_title(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Movie>, QueryError>;

    /// Unordered random sample.
    async fn fetch_random(&self, count: usize) -> Result<Vec<Movie>, QueryError>;

    /// Records with the given IDs. Unknown IDs are skipped.
    async fn fetch_by_ids(&self, ids: &[i64]) -> Result<Vec<Movie>, QueryError>;
}
