use crate::error::StageError;
use chrono::{NaiveDateTime, SubsecRound, Utc};
use connectors::sql::base::store::TargetStore;
use engine_core::context::run::RunContext;
use model::{
    core::{identifiers::TableRef, value::Value},
    execution::pipeline::{LoadTarget, TableConfig},
    records::{batch::RecordBatch, handle::StageHandle},
};
use std::sync::Arc;
use tracing::{debug, info};

/// Appends a split file to `stg.{table}` or `dlq.{table}`.
#[derive(Clone)]
pub struct Loader {
    target: Arc<dyn TargetStore>,
    batch_size: usize,
}

impl Loader {
    pub fn new(target: Arc<dyn TargetStore>, batch_size: usize) -> Self {
        Self {
            target,
            batch_size: batch_size.max(1),
        }
    }

    /// Stamps every row with the current UTC second and appends them.
    pub async fn load(
        &self,
        ctx: &RunContext,
        handle: &StageHandle,
        table: &TableConfig,
        target: LoadTarget,
    ) -> Result<u64, StageError> {
        let loaded_at = Utc::now().naive_utc().trunc_subsecs(0);
        self.load_at(ctx, handle, table, target, loaded_at).await
    }

    pub async fn load_at(
        &self,
        ctx: &RunContext,
        handle: &StageHandle,
        table: &TableConfig,
        target: LoadTarget,
        loaded_at: NaiveDateTime,
    ) -> Result<u64, StageError> {
        let mut batch = ctx.staging.read(handle)?;
        batch.push_constant(&table.tech_load_column.name, Value::TimestampNaive(loaded_at));

        let table_ref = TableRef::new(target.schema(), &table.name);
        let written = self.append(&table_ref, &batch).await?;

        match target {
            LoadTarget::Staging => ctx.metrics.increment_loaded_stg(written),
            LoadTarget::DeadLetter => ctx.metrics.increment_loaded_dlq(written),
        }
        info!(
            source = %handle.source_id,
            table = %table_ref,
            rows = written,
            "Loaded rows"
        );

        Ok(written)
    }

    async fn append(&self, table: &TableRef, batch: &RecordBatch) -> Result<u64, StageError> {
        let mut written = 0;
        for (idx, chunk) in batch.rows.chunks(self.batch_size).enumerate() {
            let count = self.target.append_rows(table, &batch.columns, chunk).await?;
            debug!(table = %table, chunk = idx, rows = count, "Appended chunk");
            written += count;
        }
        Ok(written)
    }
}
