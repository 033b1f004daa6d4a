use connectors::sql::base::error::{ConnectorError, DbError};
use engine_config::error::ConfigError;
use engine_runtime::error::PipelineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to run the pipeline: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Failed to connect: {0}")]
    Connector(#[from] ConnectorError),

    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("Invalid run timestamp '{0}': expected RFC 3339")]
    InvalidRunTs(String),

    #[error("{failed} of {total} connections failed")]
    Unreachable { failed: usize, total: usize },

    #[error("{0} stale files could not be deleted")]
    CleanupIncomplete(usize),

    #[error("Run did not succeed")]
    RunFailed,

    #[error("Shutdown requested")]
    ShutdownRequested,
}
