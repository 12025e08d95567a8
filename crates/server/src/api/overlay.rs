//! Watchlist, watched and resume endpoints.
//!
//! Every mutation returns the updated record. Unknown IDs are 404 and a
//! failed overlay write is 500.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use marquee_core::Movie;

use super::handlers::{sync_error, ApiError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ResumeRequest {
    pub minutes: u32,
}

/// PUT /api/v1/watchlist/{id}
pub async fn add_watchlist(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Movie>, ApiError> {
    let movie = state.catalog().add_watchlist(id).await.map_err(sync_error)?;
    Ok(Json(movie))
}

/// DELETE /api/v1/watchlist/{id}
pub async fn remove_watchlist(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Movie>, ApiError> {
    let movie = state
        .catalog()
        .remove_watchlist(id)
        .await
        .map_err(sync_error)?;
    Ok(Json(movie))
}

/// PUT /api/v1/watched/{id}
pub async fn add_watched(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Movie>, ApiError> {
    let movie = state.catalog().add_watched(id).await.map_err(sync_error)?;
    Ok(Json(movie))
}

/// DELETE /api/v1/watched/{id}
pub async fn remove_watched(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Movie>, ApiError> {
    let movie = state
        .catalog()
        .remove_watched(id)
        .await
        .map_err(sync_error)?;
    Ok(Json(movie))
}

/// PUT /api/v1/resume/{id}
pub async fn set_resume(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(request): Json<ResumeRequest>,
) -> Result<Json<Movie>, ApiError> {
    let movie = state
        .catalog()
        .set_resume(id, request.minutes)
        .await
        .map_err(sync_error)?;
    Ok(Json(movie))
}
