use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, validate_config, ConfigError};
use crate::crypt::Cipher;

/// Prefix of environment variables overriding file values.
pub const ENV_PREFIX: &str = "GRABBIT_";

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "grabbit.toml";

/// Marks a credential value as a Fernet token.
pub const ENCRYPTED_PREFIX: &str = "enc:";

/// Load `.env` from the working directory (or an explicit file) into the
/// process environment. Variables already set are left untouched.
pub fn load_env_file(path: Option<&Path>) -> Result<(), ConfigError> {
    match path {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.display().to_string()));
            }
            dotenv::from_path(path).map_err(|e| ConfigError::ParseError(e.to_string()))
        }
        None => {
            // A missing .env is the normal case.
            dotenv::dotenv().ok();
            Ok(())
        }
    }
}

/// Load configuration from file with environment variable overrides,
/// then decrypt credentials and validate.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    load_env_file(None)?;

    let file = match path {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.display().to_string()));
            }
            path.to_path_buf()
        }
        None => Path::new(DEFAULT_CONFIG_FILE).to_path_buf(),
    };

    let mut config: Config = Figment::new()
        .merge(Toml::file(&file))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    resolve_secrets(&mut config)?;
    validate_config(&config)?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    let mut config: Config =
        toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    resolve_secrets(&mut config)?;
    Ok(config)
}

/// Replace `enc:` prefixed credentials with their decrypted value.
pub fn resolve_secrets(config: &mut Config) -> Result<(), ConfigError> {
    let cipher = config
        .encryption_key
        .as_deref()
        .map(Cipher::new)
        .transpose()
        .map_err(|source| ConfigError::Secret {
            field: "encryption_key".to_string(),
            source,
        })?;

    let qb = &mut config.qbittorrent;
    for (field, value) in [
        ("qbittorrent.username", &mut qb.username),
        ("qbittorrent.password", &mut qb.password),
    ] {
        if let Some(token) = value.strip_prefix(ENCRYPTED_PREFIX) {
            let cipher = cipher
                .as_ref()
                .ok_or_else(|| ConfigError::MissingKey(field.to_string()))?;
            let plaintext = cipher.decrypt(token).map_err(|source| ConfigError::Secret {
                field: field.to_string(),
                source,
            })?;
            *value = plaintext;
        }
    }

    Ok(())
}
