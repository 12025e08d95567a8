//! Per-user overlay: watchlist, watched flags and resume positions.
//!
//! The overlay is local-only and independent of catalog availability. Writes
//! are idempotent upserts keyed by movie ID; reads return a snapshot taken at
//! call time.

mod sqlite;

pub use sqlite::SqliteOverlayStore;

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use thiserror::Error;

/// Errors for overlay operations.
///
/// A failed write means the user's action was lost and must be surfaced.
#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("Database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for OverlayError {
    fn from(err: rusqlite::Error) -> Self {
        OverlayError::Database(err.to_string())
    }
}

/// Trait for overlay storage.
pub trait OverlayStore: Send + Sync {
    /// Add a movie to the watchlist. No-op if already present.
    fn add_watchlist(&self, id: i64) -> Result<(), OverlayError>;

    /// Remove a movie from the watchlist. No-op if absent.
    fn remove_watchlist(&self, id: i64) -> Result<(), OverlayError>;

    /// Watchlist IDs, oldest first.
    fn list_watchlist_ids(&self) -> Result<Vec<i64>, OverlayError>;

    /// Mark a movie watched. No-op if already watched.
    fn add_watched(&self, id: i64) -> Result<(), OverlayError>;

    /// Clear the watched mark. No-op if absent.
    fn remove_watched(&self, id: i64) -> Result<(), OverlayError>;

    /// Watched IDs, oldest first.
    fn list_watched_ids(&self) -> Result<Vec<i64>, OverlayError>;

    /// Store the resume position in minutes (last write wins).
    fn set_resume(&self, id: i64, minutes: u32) -> Result<(), OverlayError>;

    /// All stored resume positions.
    fn list_resume_positions(&self) -> Result<HashMap<i64, u32>, OverlayError>;

    /// Read all three facts at once.
    fn snapshot(&self) -> Result<OverlaySnapshot, OverlayError> {
        Ok(OverlaySnapshot {
            watchlist: self.list_watchlist_ids()?.into_iter().collect(),
            watched: self.list_watched_ids()?.into_iter().collect(),
            resume: self.list_resume_positions()?,
        })
    }
}

/// Point-in-time copy of the overlay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OverlaySnapshot {
    pub watchlist: HashSet<i64>,
    pub watched: HashSet<i64>,
    pub resume: HashMap<i64, u32>,
}

impl OverlaySnapshot {
    pub fn in_watchlist(&self, id: i64) -> bool {
        self.watchlist.contains(&id)
    }

    pub fn is_watched(&self, id: i64) -> bool {
        self.watched.contains(&id)
    }

    /// Resume position, 0 if none.
    pub fn resume_minutes(&self, id: i64) -> u32 {
        self.resume.get(&id).copied().unwrap_or(0)
    }

    /// True if the overlay says anything about `id`.
    pub fn references(&self, id: i64) -> bool {
        self.in_watchlist(id) || self.is_watched(id) || self.resume_minutes(id) > 0
    }

    /// True when there is no personalization signal at all.
    pub fn has_no_signal(&self) -> bool {
        self.watchlist.is_empty() && self.watched.is_empty() && self.resume.values().all(|m| *m == 0)
    }

    /// Every referenced ID, sorted.
    pub fn referenced_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .watchlist
            .iter()
            .chain(self.watched.iter())
            .copied()
            .chain(self.resume.iter().filter(|(_, m)| **m > 0).map(|(id, _)| *id))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        ids.sort_unstable();
        ids
    }
}
