use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub overlay: OverlayConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub locale: LocaleConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Remote catalog (row/column pipeline endpoint) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    /// Base URL of the catalog database, e.g. "https://movies.turso.io".
    /// The client posts to `{url}/v2/pipeline`.
    pub url: String,
    /// Bearer token sent in the Authorization header.
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Prefix for relative poster paths.
    #[serde(default = "default_image_base_url")]
    pub image_base_url: String,
}

impl CatalogConfig {
    /// Config pointing at `url` with every other field defaulted.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: None,
            timeout_secs: default_timeout(),
            image_base_url: default_image_base_url(),
        }
    }
}

fn default_timeout() -> u32 {
    30
}

fn default_image_base_url() -> String {
    "https://image.tmdb.org/t/p/w500".to_string()
}

/// Local overlay database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OverlayConfig {
    #[serde(default = "default_overlay_path")]
    pub path: PathBuf,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            path: default_overlay_path(),
        }
    }
}

fn default_overlay_path() -> PathBuf {
    PathBuf::from("marquee.db")
}

/// Refresh, backfill and view sizing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
    /// Page size of the first fetch of a refresh cycle.
    #[serde(default = "default_initial_page_size")]
    pub initial_page_size: usize,
    /// Page size used by load-more.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Minimum number of cached movies per target genre.
    #[serde(default = "default_genre_floor")]
    pub genre_floor: usize,
    /// Genres the backfill round keeps above the floor.
    #[serde(default = "default_target_genres")]
    pub target_genres: Vec<String>,
    #[serde(default = "default_recommendation_limit")]
    pub recommendation_limit: usize,
    #[serde(default = "default_genre_sample_limit")]
    pub genre_sample_limit: usize,
    #[serde(default = "default_significant_genre_limit")]
    pub significant_genre_limit: usize,
    /// Fixed seed for sampling. Random from the OS when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rng_seed: Option<u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            initial_page_size: default_initial_page_size(),
            page_size: default_page_size(),
            genre_floor: default_genre_floor(),
            target_genres: default_target_genres(),
            recommendation_limit: default_recommendation_limit(),
            genre_sample_limit: default_genre_sample_limit(),
            significant_genre_limit: default_significant_genre_limit(),
            rng_seed: None,
        }
    }
}

fn default_initial_page_size() -> usize {
    50
}

fn default_page_size() -> usize {
    10
}

fn default_genre_floor() -> usize {
    10
}

fn default_target_genres() -> Vec<String> {
    ["Action", "Drama", "Comedy", "Romance", "Documentary", "Adventure"]
        .iter()
        .map(|g| g.to_string())
        .collect()
}

fn default_recommendation_limit() -> usize {
    20
}

fn default_genre_sample_limit() -> usize {
    10
}

fn default_significant_genre_limit() -> usize {
    5
}

/// Locale configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocaleConfig {
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
        }
    }
}

fn default_language() -> String {
    "en".to_string()
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub catalog: SanitizedCatalogConfig,
    pub overlay: OverlayConfig,
    pub sync: SyncConfig,
    pub locale: LocaleConfig,
    pub server: ServerConfig,
}

/// Sanitized catalog config (auth token hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedCatalogConfig {
    pub url: String,
    pub auth_token_configured: bool,
    pub timeout_secs: u32,
    pub image_base_url: String,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            catalog: SanitizedCatalogConfig {
                url: config.catalog.url.clone(),
                auth_token_configured: config
                    .catalog
                    .auth_token
                    .as_ref()
                    .is_some_and(|t| !t.is_empty()),
                timeout_secs: config.catalog.timeout_secs,
                image_base_url: config.catalog.image_base_url.clone(),
            },
            overlay: config.overlay.clone(),
            sync: config.sync.clone(),
            locale: config.locale.clone(),
            server: config.server.clone(),
        }
    }
}
