//! Mock catalog source for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::movie::{normalize_for_search, Movie};
use crate::query::{CatalogSource, QueryError};

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    Page,
    Genre,
    Search,
    Random,
    Ids,
}

/// A recorded call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCatalogCall {
    Page { limit: usize, offset: usize },
    Genre { genre: String, count: usize },
    Search { query: String, limit: usize, offset: usize },
    Random { count: usize },
    Ids { ids: Vec<i64> },
}

/// Mock implementation of the CatalogSource trait.
///
/// Provides controllable behavior for testing:
/// - Serve pages from an in-memory catalog
/// - Return configured per-genre and search results
/// - Fail specific operations
/// - Delay every call
/// - Track calls for assertions
///
/// # Example
///
/// ```rust,ignore
/// use marquee_core::testing::{fixtures, MockCatalogSource};
///
/// let source = MockCatalogSource::new();
/// source.set_catalog(fixtures::movies_with_genres(1, 50, &["Drama"])).await;
/// source.set_genre_results("Action", fixtures::movies_with_genres(100, 5, &["Action"])).await;
/// ```
#[derive(Debug, Default)]
pub struct MockCatalogSource {
    /// Served by `fetch_page` and `fetch_random`, and the fallback for the
    /// other operations.
    catalog: Arc<RwLock<Vec<Movie>>>,
    /// Per-genre results keyed by lower-cased genre.
    genre_results: Arc<RwLock<HashMap<String, Vec<Movie>>>>,
    /// Fixed search results. When unset, search filters the catalog.
    search_results: Arc<RwLock<Option<Vec<Movie>>>>,
    /// Records only reachable through `fetch_by_ids`.
    extras: Arc<RwLock<Vec<Movie>>>,
    /// Operations that fail until cleared.
    failures: Arc<RwLock<HashMap<MockOperation, QueryError>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    calls: Arc<RwLock<Vec<RecordedCatalogCall>>>,
}

impl MockCatalogSource {
    /// Create a new empty mock source.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    pub async fn set_catalog(&self, movies: Vec<Movie>) {
        *self.catalog.write().await = movies;
    }

    /// Results for `fetch_by_genre(genre, ..)`, truncated to the requested
    /// count.
    pub async fn set_genre_results(&self, genre: &str, movies: Vec<Movie>) {
        self.genre_results
            .write()
            .await
            .insert(genre.to_lowercase(), movies);
    }

    pub async fn set_search_results(&self, movies: Vec<Movie>) {
        *self.search_results.write().await = Some(movies);
    }

    /// Add a record that only `fetch_by_ids` can find.
    pub async fn add_extra(&self, movie: Movie) {
        self.extras.write().await.push(movie);
    }

    /// Make `operation` fail with `error` until [`Self::clear_failures`].
    pub async fn fail(&self, operation: MockOperation, error: QueryError) {
        self.failures.write().await.insert(operation, error);
    }

    pub async fn clear_failures(&self) {
        self.failures.write().await.clear();
    }

    /// Delay every call by `delay`.
    pub async fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write().await = delay;
    }

    // =========================================================================
    // Assertions
    // =========================================================================

    pub async fn calls(&self) -> Vec<RecordedCatalogCall> {
        self.calls.read().await.clone()
    }

    /// `(genre, count)` of every genre request.
    pub async fn genre_calls(&self) -> Vec<(String, usize)> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|call| match call {
                RecordedCatalogCall::Genre { genre, count } => Some((genre.clone(), *count)),
                _ => None,
            })
            .collect()
    }

    pub async fn id_calls(&self) -> Vec<Vec<i64>> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|call| match call {
                RecordedCatalogCall::Ids { ids } => Some(ids.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn clear_calls(&self) {
        self.calls.write().await.clear();
    }

    async fn enter(&self, call: RecordedCatalogCall, operation: MockOperation) -> Result<(), QueryError> {
        self.calls.write().await.push(call);

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.failures.read().await.get(&operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CatalogSource for MockCatalogSource {
    async fn fetch_page(&self, limit: usize, offset: usize) -> Result<Vec<Movie>, QueryError> {
        self.enter(RecordedCatalogCall::Page { limit, offset }, MockOperation::Page)
            .await?;

        Ok(self
            .catalog
            .read()
            .await
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn fetch_by_genre(&self, genre: &str, count: usize) -> Result<Vec<Movie>, QueryError> {
        self.enter(
            RecordedCatalogCall::Genre {
                genre: genre.to_string(),
                count,
            },
            MockOperation::Genre,
        )
        .await?;

        if let Some(movies) = self.genre_results.read().await.get(&genre.to_lowercase()) {
            return Ok(movies.iter().take(count).cloned().collect());
        }

        Ok(self
            .catalog
            .read()
            .await
            .iter()
            .filter(|m| m.has_genre(genre))
            .take(count)
            .cloned()
            .collect())
    }

    async fn search_by_title(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Movie>, QueryError> {
        self.enter(
            RecordedCatalogCall::Search {
                query: query.to_string(),
                limit,
                offset,
            },
            MockOperation::Search,
        )
        .await?;

        if let Some(movies) = self.search_results.read().await.as_ref() {
            return Ok(movies.iter().skip(offset).take(limit).cloned().collect());
        }

        let needle = normalize_for_search(query);
        Ok(self
            .catalog
            .read()
            .await
            .iter()
            .filter(|m| normalize_for_search(&m.title).contains(&needle))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn fetch_random(&self, count: usize) -> Result<Vec<Movie>, QueryError> {
        self.enter(RecordedCatalogCall::Random { count }, MockOperation::Random)
            .await?;

        Ok(self.catalog.read().await.iter().take(count).cloned().collect())
    }

    async fn fetch_by_ids(&self, ids: &[i64]) -> Result<Vec<Movie>, QueryError> {
        self.enter(
            RecordedCatalogCall::Ids { ids: ids.to_vec() },
            MockOperation::Ids,
        )
        .await?;

        let mut found: Vec<Movie> = Vec::new();
        let catalog = self.catalog.read().await;
        let extras = self.extras.read().await;
        let genre_results = self.genre_results.read().await;
        let search_results = self.search_results.read().await;

        let candidates = catalog
            .iter()
            .chain(extras.iter())
            .chain(genre_results.values().flatten())
            .chain(search_results.iter().flatten());
        for movie in candidates {
            if ids.contains(&movie.id) && !found.contains(movie) {
                found.push(movie.clone());
            }
        }
        Ok(found)
    }
}
