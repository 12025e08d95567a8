//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process router
//! backed by a mock catalog source and a temp-file overlay store.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use marquee_core::{
    config::{CatalogConfig, LocaleConfig, OverlayConfig, ServerConfig, SyncConfig},
    testing::MockCatalogSource,
    CatalogService, Config, SqliteOverlayStore, StaticLocale,
};
use marquee_server::{api::create_router, state::AppState};

/// Re-export fixtures for test convenience
pub use marquee_core::testing::fixtures;

/// Number of records the mock catalog serves.
pub const CATALOG_SIZE: usize = 60;

/// Test fixture with a controllable catalog source.
///
/// The catalog is seeded with `CATALOG_SIZE` movies tagged with every
/// default genre, so a refresh never needs a backfill round.
pub struct TestFixture {
    pub router: Router,
    /// Mock catalog source - configure results and failures
    pub source: Arc<MockCatalogSource>,
    /// Service behind the router, for driving refreshes directly
    pub catalog: CatalogService,
    /// Holds the overlay database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a fixture whose catalog has not been loaded yet.
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let overlay_path = temp_dir.path().join("overlay.db");

        let source = Arc::new(MockCatalogSource::new());
        source
            .set_catalog(fixtures::movies_with_genres(
                1,
                CATALOG_SIZE,
                &fixtures::DEFAULT_GENRES,
            ))
            .await;

        let config = Config {
            catalog: CatalogConfig::new("http://catalog.invalid"),
            overlay: OverlayConfig {
                path: overlay_path.clone(),
            },
            sync: SyncConfig {
                rng_seed: Some(1),
                ..Default::default()
            },
            locale: LocaleConfig::default(),
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
        };

        let overlay = Arc::new(
            SqliteOverlayStore::new(&overlay_path).expect("Failed to create overlay store"),
        );
        let catalog = CatalogService::new(
            source.clone(),
            overlay,
            Arc::new(StaticLocale::new(config.locale.language.clone())),
            config.sync.clone(),
        );

        let state = Arc::new(AppState::new(config, catalog.clone()));
        let router = create_router(state);

        Self {
            router,
            source,
            catalog,
            temp_dir,
        }
    }

    /// Create a fixture and run one refresh cycle to completion.
    pub async fn loaded() -> Self {
        let fixture = Self::new().await;
        fixture
            .catalog
            .refresh()
            .await
            .expect("Initial refresh failed");
        fixture
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request without a body.
    pub async fn post(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a PUT request with an optional JSON body.
    pub async fn put(&self, path: &str, body: Option<Value>) -> TestResponse {
        self.request("PUT", path, body).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a GET request and return the raw text body.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        (status, String::from_utf8_lossy(&body_bytes).into_owned())
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}
