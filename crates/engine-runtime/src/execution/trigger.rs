use crate::error::TriggerError;
use async_trait::async_trait;
use engine_core::retry::RetryDisposition;
use model::execution::pipeline::DownstreamConfig;
use std::io;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Starts the dependent pipeline and waits until it finishes.
#[async_trait]
pub trait DownstreamTrigger: Send + Sync {
    fn name(&self) -> &str;

    async fn trigger(&self, cancel: &CancellationToken) -> Result<(), TriggerError>;
}

/// Runs the downstream pipeline as a child process; a zero exit status
/// means it completed.
#[derive(Debug, Clone)]
pub struct CommandTrigger {
    config: DownstreamConfig,
}

impl CommandTrigger {
    pub fn new(config: DownstreamConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DownstreamTrigger for CommandTrigger {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn trigger(&self, cancel: &CancellationToken) -> Result<(), TriggerError> {
        let name = &self.config.name;
        let (program, args) = self
            .config
            .command
            .split_first()
            .ok_or_else(|| TriggerError::EmptyCommand(name.clone()))?;

        info!(downstream = %name, %program, "Triggering downstream pipeline");
        let mut child = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TriggerError::Spawn {
                name: name.clone(),
                source,
            })?;

        let status = tokio::select! {
            _ = cancel.cancelled() => return Err(TriggerError::Cancelled(name.clone())),
            status = child.wait() => status.map_err(|source| TriggerError::Spawn {
                name: name.clone(),
                source,
            })?,
        };

        if !status.success() {
            return Err(TriggerError::Exit {
                name: name.clone(),
                status: status.to_string(),
            });
        }

        info!(downstream = %name, "Downstream pipeline completed");
        Ok(())
    }
}

pub fn classify_trigger_error(err: &TriggerError) -> RetryDisposition {
    match err {
        TriggerError::Spawn { source, .. } if source.kind() == io::ErrorKind::NotFound => {
            RetryDisposition::Stop
        }
        TriggerError::Spawn { .. } | TriggerError::Exit { .. } => RetryDisposition::Retry,
        TriggerError::EmptyCommand(_) | TriggerError::Cancelled(_) => RetryDisposition::Stop,
    }
}
