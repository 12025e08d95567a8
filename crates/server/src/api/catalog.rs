//! Catalog sync and view endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use marquee_core::{Movie, PageOutcome};

use super::handlers::{api_error, sync_error, ApiError};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub started: bool,
}

#[derive(Debug, Serialize)]
pub struct LoadMoreResponse {
    pub fetched: usize,
    pub added: usize,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct MovieListResponse {
    pub movies: Vec<Movie>,
    pub total: usize,
}

impl From<Vec<Movie>> for MovieListResponse {
    fn from(movies: Vec<Movie>) -> Self {
        let total = movies.len();
        Self { movies, total }
    }
}

#[derive(Debug, Serialize)]
pub struct GenreListResponse {
    pub genres: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct LanguageRequest {
    pub language: String,
}

/// Start a refresh cycle in the background.
///
/// POST /api/v1/refresh
pub async fn refresh(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let catalog = state.catalog().clone();
    if !catalog.state().await.is_idle() {
        return (
            StatusCode::CONFLICT,
            Json(RefreshResponse { started: false }),
        );
    }

    spawn_refresh(catalog);
    (StatusCode::ACCEPTED, Json(RefreshResponse { started: true }))
}

/// Fetch the next page of the catalog.
///
/// POST /api/v1/movies/more
pub async fn load_more(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LoadMoreResponse>, ApiError> {
    let catalog = state.catalog();
    match catalog.load_more().await.map_err(sync_error)? {
        PageOutcome::Loaded { fetched, added } => Ok(Json(LoadMoreResponse {
            fetched,
            added,
            total: catalog.status().await.cached,
        })),
        PageOutcome::Rejected => Err(api_error(
            StatusCode::CONFLICT,
            "A refresh or page load is already running",
        )),
    }
}

/// GET /api/v1/movies
pub async fn list_movies(State(state): State<Arc<AppState>>) -> Json<MovieListResponse> {
    Json(state.catalog().movies().await.into())
}

/// GET /api/v1/movies/{id}
pub async fn get_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Movie>, ApiError> {
    state
        .catalog()
        .movie(id)
        .await
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Movie not found: {}", id)))
}

/// GET /api/v1/genres
pub async fn list_genres(State(state): State<Arc<AppState>>) -> Json<GenreListResponse> {
    Json(GenreListResponse {
        genres: state.catalog().significant_genres().await,
    })
}

/// GET /api/v1/genres/{genre}/movies
pub async fn genre_movies(
    State(state): State<Arc<AppState>>,
    Path(genre): Path<String>,
) -> Json<MovieListResponse> {
    Json(state.catalog().movies_for_genre(&genre).await.into())
}

/// GET /api/v1/recommendations
pub async fn recommendations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MovieListResponse>, ApiError> {
    let movies = state
        .catalog()
        .recommendations()
        .await
        .map_err(sync_error)?;
    Ok(Json(movies.into()))
}

/// POST /api/v1/recommendations/refresh
pub async fn refresh_recommendations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MovieListResponse>, ApiError> {
    let movies = state
        .catalog()
        .refresh_recommendations()
        .await
        .map_err(sync_error)?;
    Ok(Json(movies.into()))
}

/// GET /api/v1/continue-watching
pub async fn continue_watching(State(state): State<Arc<AppState>>) -> Json<MovieListResponse> {
    Json(state.catalog().continue_watching().await.into())
}

/// Switch the synopsis language and reload the catalog.
///
/// PUT /api/v1/language
pub async fn set_language(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LanguageRequest>,
) -> Result<StatusCode, ApiError> {
    let language = request.language.trim();
    if language.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Language cannot be empty"));
    }

    let catalog = state.catalog().clone();
    catalog.set_language(language).await;
    spawn_refresh(catalog);
    Ok(StatusCode::ACCEPTED)
}

fn spawn_refresh(catalog: marquee_core::CatalogService) {
    tokio::spawn(async move {
        match catalog.refresh().await {
            Ok(outcome) => tracing::debug!("Refresh finished: {:?}", outcome),
            Err(e) => tracing::warn!("Refresh failed: {}", e),
        }
    });
}
