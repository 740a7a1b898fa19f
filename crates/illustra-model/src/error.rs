use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building model values from untrusted input.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("image URL is not http(s): {0}")]
    UnsupportedScheme(String),

    #[error("malformed image URL '{url}': {reason}")]
    MalformedUrl { url: String, reason: String },

    #[error("search query is empty")]
    EmptyQuery,
}

/// Errors raised while loading an `ImageConfig` from disk.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
