use crate::error::CliError;
use async_trait::async_trait;
use connectors::sql::postgres::adapter::PgAdapter;
use model::execution::pipeline::PipelineConfig;
use tracing::{error, info};

/// Trait for "pinging" a database
#[async_trait]
pub trait ConnectionPinger {
    /// Attempts to ping; returns Err if unreachable
    async fn ping(&self) -> Result<(), CliError>;
}

/// Postgres pinger for the target or one source.
pub struct PostgresConnectionPinger {
    /// Label used in logs; never the URL, which may carry credentials.
    pub label: String,
    pub conn_str: String,
}

#[async_trait]
impl ConnectionPinger for PostgresConnectionPinger {
    async fn ping(&self) -> Result<(), CliError> {
        info!("Pinging Postgres '{}'", self.label);

        let adapter = PgAdapter::connect(&self.conn_str).await.inspect_err(|e| {
            error!("Postgres connection to '{}' failed: {}", self.label, e);
        })?;
        adapter.ping().await.inspect_err(|e| {
            error!("Postgres ping on '{}' failed: {}", self.label, e);
        })?;

        info!("Postgres ping to '{}' succeeded", self.label);
        Ok(())
    }
}

/// One pinger for the target followed by one per source.
pub fn pingers(config: &PipelineConfig) -> Vec<PostgresConnectionPinger> {
    let target = PostgresConnectionPinger {
        label: "target".to_string(),
        conn_str: config.target.url.clone(),
    };
    let sources = config.sources.values().map(|source| PostgresConnectionPinger {
        label: format!("source {}", source.id),
        conn_str: source.url.clone(),
    });
    std::iter::once(target).chain(sources).collect()
}

/// Pings every database of the pipeline, failing if any is unreachable.
pub async fn ping_all(config: &PipelineConfig) -> Result<(), CliError> {
    let pingers = pingers(config);
    let total = pingers.len();
    let mut failed = 0;
    for pinger in &pingers {
        if pinger.ping().await.is_err() {
            failed += 1;
        }
    }

    if failed > 0 {
        return Err(CliError::Unreachable { failed, total });
    }
    Ok(())
}
