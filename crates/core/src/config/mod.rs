mod loader;
mod types;
mod validate;

pub use loader::*;
pub use types::*;
pub use validate::*;

use thiserror::Error;

use crate::crypt::CryptError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("{0} is encrypted but no encryption_key is configured")]
    MissingKey(String),

    #[error("Failed to decrypt {field}: {source}")]
    Secret {
        field: String,
        #[source]
        source: CryptError,
    },
}
