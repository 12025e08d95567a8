use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{catalog, handlers, middleware::metrics_middleware, overlay, search};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health, config and observability
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/status", get(handlers::get_status))
        .route("/metrics", get(handlers::get_metrics))
        // Sync
        .route("/refresh", post(catalog::refresh))
        .route("/language", put(catalog::set_language))
        .route("/movies", get(catalog::list_movies))
        .route("/movies/more", post(catalog::load_more))
        .route("/movies/{id}", get(catalog::get_movie))
        // Derived views
        .route("/genres", get(catalog::list_genres))
        .route("/genres/{genre}/movies", get(catalog::genre_movies))
        .route("/recommendations", get(catalog::recommendations))
        .route(
            "/recommendations/refresh",
            post(catalog::refresh_recommendations),
        )
        .route("/continue-watching", get(catalog::continue_watching))
        .route("/search", get(search::search))
        // User overlay
        .route(
            "/watchlist/{id}",
            put(overlay::add_watchlist).delete(overlay::remove_watchlist),
        )
        .route(
            "/watched/{id}",
            put(overlay::add_watched).delete(overlay::remove_watched),
        )
        .route("/resume/{id}", put(overlay::set_resume))
        .layer(middleware::from_fn(metrics_middleware))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
}
