use crate::error::StageError;
use connectors::sql::base::store::TargetStore;
use model::{
    core::{identifiers::TableRef, value::Value},
    execution::pipeline::{LoadTarget, REJECT_REASONS_COLUMN, SRC_ID_COLUMN, TableConfig},
    records::batch::RecordBatch,
};
use std::{collections::HashSet, sync::Arc};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupOutcome {
    pub before: usize,
    pub after: usize,
}

impl DedupOutcome {
    pub fn removed(&self) -> usize {
        self.before.saturating_sub(self.after)
    }
}

/// Keeps the first row of every group of rows that agree on `key`.
pub fn dedup_batch(batch: RecordBatch, key: &[String]) -> RecordBatch {
    let mut seen: HashSet<Vec<Value>> = HashSet::with_capacity(batch.len());
    let RecordBatch {
        entity,
        columns,
        rows,
    } = batch;

    let rows = rows
        .into_iter()
        .filter(|row| seen.insert(key.iter().map(|col| row.get_value(col)).collect()))
        .collect();

    RecordBatch::new(&entity, columns, rows)
}

/// Rewrites `dlq.{table}` so that each (load time, source, reasons) group
/// appears once.
#[derive(Clone)]
pub struct Deduplicator {
    target: Arc<dyn TargetStore>,
}

impl Deduplicator {
    pub fn new(target: Arc<dyn TargetStore>) -> Self {
        Self { target }
    }

    pub fn dedup_key(table: &TableConfig) -> Vec<String> {
        vec![
            table.tech_load_column.name.clone(),
            SRC_ID_COLUMN.to_string(),
            REJECT_REASONS_COLUMN.to_string(),
        ]
    }

    pub async fn dedup(&self, table: &TableConfig) -> Result<DedupOutcome, StageError> {
        let table_ref = TableRef::new(LoadTarget::DeadLetter.schema(), &table.name);
        let key = Self::dedup_key(table);

        let outcome = self
            .target
            .rewrite(&table_ref, &move |batch: RecordBatch| dedup_batch(batch, &key))
            .await?;

        let outcome = DedupOutcome {
            before: outcome.before,
            after: outcome.after,
        };
        info!(
            table = %table_ref,
            before = outcome.before,
            after = outcome.after,
            removed = outcome.removed(),
            "Deduplicated DLQ"
        );
        Ok(outcome)
    }
}
