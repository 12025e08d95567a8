//! Deduplicated, insertion-ordered record cache.

use indexmap::IndexMap;

use crate::movie::Movie;
use crate::overlay::OverlaySnapshot;

/// In-memory catalog cache keyed by movie ID.
///
/// Admission is first-write-wins. Overlay flags are not part of admission:
/// they are recomputed by [`CatalogCache::remerge`] so an early admission
/// never freezes stale watchlist or resume state.
#[derive(Debug, Default)]
pub struct CatalogCache {
    records: IndexMap<i64, Movie>,
}

impl CatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `movie` unless a record with its ID is already cached.
    /// Returns true if it was admitted.
    pub fn cache_record(&mut self, movie: Movie) -> bool {
        if self.records.contains_key(&movie.id) {
            return false;
        }
        self.records.insert(movie.id, movie);
        true
    }

    /// Admit every record, returning how many were new.
    pub fn admit_all<I>(&mut self, movies: I) -> usize
    where
        I: IntoIterator<Item = Movie>,
    {
        movies
            .into_iter()
            .filter(|movie| !movie.loading)
            .map(|movie| self.cache_record(movie))
            .filter(|admitted| *admitted)
            .count()
    }

    /// Set the overlay mirror fields on `records` from `snapshot`.
    /// Membership of the cache is untouched.
    pub fn merge_overlay(records: &mut [Movie], snapshot: &OverlaySnapshot) {
        for movie in records.iter_mut() {
            apply_overlay(movie, snapshot);
        }
    }

    /// Recompute overlay flags on every cached record.
    pub fn remerge(&mut self, snapshot: &OverlaySnapshot) {
        for movie in self.records.values_mut() {
            apply_overlay(movie, snapshot);
        }
    }

    /// Mutable access for single-record overlay updates.
    pub fn get_mut(&mut self, id: i64) -> Option<&mut Movie> {
        self.records.get_mut(&id)
    }

    pub fn get(&self, id: i64) -> Option<&Movie> {
        self.records.get(&id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.records.contains_key(&id)
    }

    /// Records in admission order.
    pub fn records(&self) -> impl Iterator<Item = &Movie> {
        self.records.values()
    }

    pub fn to_vec(&self) -> Vec<Movie> {
        self.records.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

fn apply_overlay(movie: &mut Movie, snapshot: &OverlaySnapshot) {
    movie.in_watchlist = snapshot.in_watchlist(movie.id);
    movie.watched = snapshot.is_watched(movie.id);
    movie.resume_minutes = snapshot.resume_minutes(movie.id);
}
