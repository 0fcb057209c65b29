use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - qBittorrent host is set and the request timeout is positive
/// - Server port is not 0
/// - Search polling interval and wait budget are positive
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.qbittorrent.host.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "qbittorrent.host cannot be empty".to_string(),
        ));
    }

    if config.qbittorrent.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "qbittorrent.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.search.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "search.poll_interval_ms cannot be 0".to_string(),
        ));
    }

    if config.search.max_wait_cycles == 0 {
        return Err(ConfigError::ValidationError(
            "search.max_wait_cycles cannot be 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    fn base_config() -> Config {
        load_config_from_str(
            r#"
[qbittorrent]
host = "localhost"
port = 8080
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&base_config()).is_ok());
    }

    #[test]
    fn test_validate_empty_host_fails() {
        let mut config = base_config();
        config.qbittorrent.host = "  ".to_string();
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = base_config();
        config.server.port = 0;
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_poll_budget() {
        let mut config = base_config();
        config.search.poll_interval_ms = 0;
        assert!(validate_config(&config).is_err());

        let mut config = base_config();
        config.search.max_wait_cycles = 0;
        assert!(validate_config(&config).is_err());
    }
}
