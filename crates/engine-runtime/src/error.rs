use engine_core::error::RetryError;
use engine_processing::error::StageError;
use thiserror::Error;

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Creating the target schemas or tables failed.
    #[error("Failed to prepare target tables: {0}")]
    Prepare(#[from] RetryError<StageError>),

    /// Reading the table watermarks before the units start failed.
    #[error("Failed to read watermarks: {0}")]
    Watermark(RetryError<StageError>),

    #[error("Maintenance error: {0}")]
    Maintenance(#[from] std::io::Error),

    #[error("Shutdown requested")]
    ShutdownRequested,
}

/// Failure of the downstream pipeline trigger.
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("Failed to start downstream '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Downstream '{name}' exited with {status}")]
    Exit { name: String, status: String },

    #[error("Downstream '{0}' has an empty command")]
    EmptyCommand(String),

    #[error("Downstream '{0}' was cancelled")]
    Cancelled(String),
}
