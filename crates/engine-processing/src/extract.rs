use crate::{error::StageError, watermark::WatermarkSnapshot};
use chrono::TimeDelta;
use connectors::sql::base::{requests::IncrementRequest, store::SourceStore};
use engine_core::context::run::RunContext;
use model::{
    execution::pipeline::{SourceConfig, TableConfig},
    records::handle::{Stage, StageHandle},
};
use std::sync::Arc;
use tracing::info;

/// Pulls a table's increment from one source into an extract file.
#[derive(Clone)]
pub struct Extractor {
    watermarks: Arc<WatermarkSnapshot>,
    overlap: TimeDelta,
}

impl Extractor {
    pub fn new(watermarks: Arc<WatermarkSnapshot>, overlap_secs: i64) -> Self {
        Self {
            watermarks,
            overlap: TimeDelta::seconds(overlap_secs),
        }
    }

    /// Returns the handle of the written file; the file is complete by then.
    pub async fn extract(
        &self,
        ctx: &RunContext,
        store: &dyn SourceStore,
        source: &SourceConfig,
        table: &TableConfig,
    ) -> Result<StageHandle, StageError> {
        let watermark = self
            .watermarks
            .get(&table.name)
            .ok_or_else(|| StageError::MissingWatermark(table.name.clone()))?;
        let request = match watermark.lower_bound(self.overlap) {
            Some(since) => IncrementRequest::since(&table.name, &table.increment_col, since),
            None => IncrementRequest::full(&table.name, &table.increment_col),
        };

        let batch = store.fetch_increment(&request).await?;
        if !batch
            .columns
            .iter()
            .any(|c| c.eq_ignore_ascii_case(&table.increment_col))
        {
            return Err(StageError::MissingColumn {
                table: table.name.clone(),
                column: table.increment_col.clone(),
            });
        }

        let handle = ctx.handle(&table.name, Stage::Extract, &source.id);
        ctx.staging.write(&handle, &batch)?;

        ctx.metrics.increment_extracted(batch.len() as u64);
        info!(
            source = %source.id,
            table = %table.name,
            %watermark,
            since = ?request.since,
            rows = batch.len(),
            "Extracted increment"
        );

        Ok(handle)
    }
}
