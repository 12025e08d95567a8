use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Catalog URL is not empty
/// - Server port is not 0
/// - Page sizes, genre floor and view limits are positive
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.catalog.url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "catalog.url cannot be empty".to_string(),
        ));
    }

    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let sync = &config.sync;
    let positive = [
        ("sync.initial_page_size", sync.initial_page_size),
        ("sync.page_size", sync.page_size),
        ("sync.genre_floor", sync.genre_floor),
        ("sync.recommendation_limit", sync.recommendation_limit),
        ("sync.genre_sample_limit", sync.genre_sample_limit),
        ("sync.significant_genre_limit", sync.significant_genre_limit),
    ];
    for (name, value) in positive {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{} must be greater than 0",
                name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        CatalogConfig, LocaleConfig, OverlayConfig, ServerConfig, SyncConfig,
    };
    use std::net::IpAddr;

    fn valid_config() -> Config {
        Config {
            catalog: CatalogConfig::new("http://localhost:8081"),
            overlay: OverlayConfig::default(),
            sync: SyncConfig::default(),
            locale: LocaleConfig::default(),
            server: ServerConfig::default(),
        }
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = valid_config();
        config.server = ServerConfig {
            host: "0.0.0.0".parse::<IpAddr>().unwrap(),
            port: 0,
        };
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_empty_url_fails() {
        let mut config = valid_config();
        config.catalog.url = "  ".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_floor_fails() {
        let mut config = valid_config();
        config.sync.genre_floor = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("sync.genre_floor"));
    }
}
