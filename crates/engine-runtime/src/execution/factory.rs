use async_trait::async_trait;
use connectors::sql::{base::store::SourceStore, postgres::adapter::PgAdapter};
use engine_processing::error::StageError;
use model::execution::pipeline::SourceConfig;
use std::sync::Arc;

/// Opens a read connection to one configured source.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    async fn connect(&self, source: &SourceConfig) -> Result<Arc<dyn SourceStore>, StageError>;
}

/// Connects to every source with its own Postgres session.
#[derive(Debug, Default, Clone, Copy)]
pub struct PgSourceConnector;

#[async_trait]
impl SourceConnector for PgSourceConnector {
    async fn connect(&self, source: &SourceConfig) -> Result<Arc<dyn SourceStore>, StageError> {
        let adapter = PgAdapter::connect(&source.url).await?;
        Ok(Arc::new(adapter))
    }
}
