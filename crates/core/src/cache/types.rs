//! Catalog service types.

use serde::Serialize;
use thiserror::Error;

use crate::movie::Movie;
use crate::overlay::OverlayError;
use crate::query::QueryError;

/// Refresh cycle state. `Paging` covers an in-flight `load_more`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    Idle,
    Fetching,
    Backfilling,
    Paging,
}

impl SyncState {
    pub fn is_idle(&self) -> bool {
        matches!(self, SyncState::Idle)
    }
}

/// Which step produced a `DataLoaded` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadPhase {
    /// First page of a refresh, before backfill.
    Initial,
    /// End of the genre backfill round.
    Backfilled,
    /// A `load_more` page.
    Page,
}

/// Broadcast to subscribers as the cache changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CatalogEvent {
    DataLoaded { phase: LoadPhase, total: usize },
    RefreshFailed { message: String },
}

/// Result of a `refresh` call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The full fetch and backfill cycle ran.
    Completed,
    /// Another cycle was in flight; nothing happened.
    Rejected,
}

/// Result of a `load_more` call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    Loaded { fetched: usize, added: usize },
    Rejected,
}

/// Where search results came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchSource {
    Local,
    Remote,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub source: SearchSource,
    pub movies: Vec<Movie>,
}

/// Point-in-time service status.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub state: SyncState,
    pub cached: usize,
    pub offset: usize,
    pub recommendations_dirty: bool,
    pub language: String,
}

/// Errors from catalog service operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Catalog query failed: {0}")]
    Query(#[from] QueryError),

    #[error("Overlay store failed: {0}")]
    Overlay(#[from] OverlayError),

    #[error("Unknown movie: {0}")]
    UnknownMovie(i64),

    #[error("Sync cycle aborted: {0}")]
    Aborted(String),
}
