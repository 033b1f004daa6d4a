use crate::{
    error::StageError,
    transform::{
        checks::CheckRegistry,
        validation::{RowValidator, Verdict},
    },
};
use engine_core::context::run::RunContext;
use model::{
    core::value::Value,
    execution::{
        check::CheckCode,
        pipeline::{REJECT_REASONS_COLUMN, RUN_ID_COLUMN, SRC_ID_COLUMN, SourceConfig, TableConfig},
    },
    records::{
        batch::RecordBatch,
        handle::{Stage, StageHandle},
    },
};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitCounts {
    pub valid: usize,
    pub invalid: usize,
}

impl SplitCounts {
    pub fn total(&self) -> usize {
        self.valid + self.invalid
    }
}

/// The two files written by a split, always in the order valid, invalid.
#[derive(Debug, Clone)]
pub struct SplitOutput {
    pub valid: StageHandle,
    pub invalid: StageHandle,
    pub counts: SplitCounts,
}

impl SplitOutput {
    pub fn handles(&self) -> [&StageHandle; 2] {
        [&self.valid, &self.invalid]
    }
}

#[derive(Debug, Clone)]
pub struct Partition {
    pub valid: RecordBatch,
    pub invalid: RecordBatch,
}

/// Tags every row with its source and run, then routes it by verdict.
/// Rows keep their input order within each side.
pub fn partition(
    batch: RecordBatch,
    validator: &RowValidator,
    src_id: &str,
    run_id: &str,
) -> Partition {
    let mut valid_columns = batch.columns;
    valid_columns.push(SRC_ID_COLUMN.to_string());
    valid_columns.push(RUN_ID_COLUMN.to_string());
    let mut invalid_columns = valid_columns.clone();
    invalid_columns.push(REJECT_REASONS_COLUMN.to_string());

    let mut valid = RecordBatch::empty(&batch.entity, valid_columns);
    let mut invalid = RecordBatch::empty(&batch.entity, invalid_columns);

    for mut row in batch.rows {
        let verdict = validator.validate(&row);
        row.push(SRC_ID_COLUMN, Value::String(src_id.to_string()));
        row.push(RUN_ID_COLUMN, Value::String(run_id.to_string()));

        match verdict {
            Verdict::Pass => valid.rows.push(row),
            Verdict::Reject(codes) => {
                row.push(REJECT_REASONS_COLUMN, Value::String(CheckCode::join(&codes)));
                invalid.rows.push(row);
            }
        }
    }

    Partition { valid, invalid }
}

pub struct Splitter {
    registry: Arc<CheckRegistry>,
}

impl Splitter {
    pub fn new(registry: Arc<CheckRegistry>) -> Self {
        Self { registry }
    }

    pub fn split(
        &self,
        ctx: &RunContext,
        handle: &StageHandle,
        table: &TableConfig,
        source: &SourceConfig,
    ) -> Result<SplitOutput, StageError> {
        let validator = RowValidator::new(&self.registry, &table.check_list)?;
        let batch = ctx.staging.read(handle)?;

        let Partition { valid, invalid } =
            partition(batch, &validator, &source.city_name, ctx.run_id.as_str());
        let counts = SplitCounts {
            valid: valid.len(),
            invalid: invalid.len(),
        };

        let output = SplitOutput {
            valid: handle.with_stage(Stage::TransformValid),
            invalid: handle.with_stage(Stage::TransformInvalid),
            counts,
        };
        ctx.staging.write(&output.valid, &valid)?;
        ctx.staging.write(&output.invalid, &invalid)?;

        ctx.metrics
            .increment_split(counts.valid as u64, counts.invalid as u64);
        info!(
            source = %source.id,
            table = %table.name,
            valid = counts.valid,
            invalid = counts.invalid,
            "Split extracted rows"
        );

        Ok(output)
    }
}
