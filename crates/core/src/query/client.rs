//! HTTP client for the catalog pipeline endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::wire::{decode_response, encode_request, RecordMapping, ResultSet};
use super::{sql, CatalogSource, QueryError};
use crate::config::CatalogConfig;
use crate::locale::LocaleSource;
use crate::metrics;
use crate::movie::Movie;

/// Query client speaking the batched row/column JSON protocol.
pub struct QueryClient {
    client: Client,
    endpoint: String,
    auth_token: Option<String>,
    mapping: RecordMapping,
    locale: Arc<dyn LocaleSource>,
}

impl QueryClient {
    /// Create a new client from catalog configuration.
    pub fn new(config: &CatalogConfig, locale: Arc<dyn LocaleSource>) -> Result<Self, QueryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/v2/pipeline", config.url.trim_end_matches('/')),
            auth_token: config.auth_token.clone().filter(|t| !t.is_empty()),
            mapping: RecordMapping::new(config.image_base_url.clone()),
            locale,
        })
    }

    /// Execute an ordered batch of statements, returning one outcome per
    /// statement.
    pub async fn execute_batch(
        &self,
        statements: &[String],
    ) -> Result<Vec<Result<ResultSet, QueryError>>, QueryError> {
        let body = encode_request(statements);

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QueryError::Transport(format!(
                "catalog returned HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let text = response.text().await?;
        decode_response(&text)
    }

    /// Run a single SELECT and map its rows to movies.
    async fn query_movies(&self, operation: &str, sql: String) -> Result<Vec<Movie>, QueryError> {
        debug!("Catalog {}: {}", operation, sql);

        let outcome = self
            .execute_batch(std::slice::from_ref(&sql))
            .await
            .and_then(|mut results| {
                if results.is_empty() {
                    Ok(ResultSet::default())
                } else {
                    results.swap_remove(0)
                }
            })
            .map(|set| set.into_movies(&self.mapping));

        metrics::record_query(operation, &outcome);
        outcome
    }

    fn language(&self) -> String {
        self.locale.language()
    }
}

#[async_trait]
impl CatalogSource for QueryClient {
    async fn fetch_page(&self, limit: usize, offset: usize) -> Result<Vec<Movie>, QueryError> {
        self.query_movies("page", sql::page(&self.language(), limit, offset))
            .await
    }

    async fn fetch_by_genre(&self, genre: &str, count: usize) -> Result<Vec<Movie>, QueryError> {
        self.query_movies("genre", sql::by_genre(&self.language(), genre, count))
            .await
    }

    async fn search_by_title(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Movie>, QueryError> {
        self.query_movies(
            "search",
            sql::search_title(&self.language(), query, limit, offset),
        )
        .await
    }

    async fn fetch_random(&self, count: usize) -> Result<Vec<Movie>, QueryError> {
        self.query_movies("random", sql::random(&self.language(), count))
            .await
    }

    async fn fetch_by_ids(&self, ids: &[i64]) -> Result<Vec<Movie>, QueryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.query_movies("ids", sql::by_ids(&self.language(), ids))
            .await
    }
}
