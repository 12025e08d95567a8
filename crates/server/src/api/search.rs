//! Title search endpoint.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use marquee_core::{Movie, SearchSource};

use super::handlers::{api_error, sync_error, ApiError};
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 20;

/// Where to look for matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Cached records only.
    Local,
    /// Catalog backend only; failures are returned.
    Remote,
    /// Remote, falling back to the cache.
    #[default]
    Both,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub mode: SearchMode,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub source: SearchSource,
    pub movies: Vec<Movie>,
    pub total: usize,
}

/// GET /api/v1/search
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = params.q.trim();
    if query.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Query cannot be empty"));
    }
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    let catalog = state.catalog();

    let (source, movies) = match params.mode {
        SearchMode::Local => (SearchSource::Local, catalog.search_local(query).await),
        SearchMode::Remote => (
            SearchSource::Remote,
            catalog
                .search_remote(query, limit, params.offset)
                .await
                .map_err(sync_error)?,
        ),
        SearchMode::Both => {
            let results = catalog.search(query, limit, params.offset).await;
            (results.source, results.movies)
        }
    };

    Ok(Json(SearchResponse {
        query: query.to_string(),
        source,
        total: movies.len(),
        movies,
    }))
}
