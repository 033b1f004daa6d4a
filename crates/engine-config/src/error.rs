use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse pipeline config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to read env file {path}: {source}")]
    EnvFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid env file: {0}")]
    EnvFileFormat(String),

    #[error("Environment variable `{0}` referenced by the config is not set")]
    MissingVariable(String),

    #[error("Unterminated `${{` placeholder in `{0}`")]
    UnterminatedPlaceholder(String),

    #[error("Pipeline config validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),
}
