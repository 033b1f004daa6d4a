use crate::memory::{MemoryConnector, MemorySource, MemoryTarget};
use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use connectors::file::csv::staging::CsvStagingArea;
use engine_core::context::run::RunContext;
use engine_runtime::execution::executor::PipelineRunner;
use model::{
    core::value::{FieldValue, Value},
    execution::{
        check::CheckCode,
        pipeline::{
            ColumnDef, PipelineConfig, RetrySettings, SourceConfig, TableConfig, TargetConfig,
        },
    },
    records::{batch::RecordBatch, row::RowData},
};
use std::{collections::BTreeMap, path::Path, sync::Arc};

pub const ORDERS: &str = "orders";
pub const TECH_COLUMN: &str = "load_dttm";

pub fn ts(day: u32, hour: u32, min: u32, sec: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, day)
        .and_then(|d| d.and_hms_opt(hour, min, sec))
        .expect("valid timestamp")
}

pub fn orders_table(checks: &[CheckCode]) -> TableConfig {
    TableConfig {
        name: ORDERS.into(),
        increment_col: "updated_at".into(),
        check_list: checks.to_vec(),
        tech_load_column: ColumnDef::new(TECH_COLUMN, "timestamp"),
        columns: vec![
            ColumnDef::new("id", "bigint"),
            ColumnDef::new("amount", "numeric"),
            ColumnDef::new("updated_at", "timestamp"),
        ],
    }
}

pub fn source(id: &str, city: &str) -> SourceConfig {
    SourceConfig {
        id: id.into(),
        url: format!("memory://{id}"),
        city_name: city.into(),
        tables: vec![ORDERS.into()],
    }
}

pub fn pipeline_config(
    staging_dir: &Path,
    table: TableConfig,
    sources: Vec<SourceConfig>,
) -> PipelineConfig {
    PipelineConfig {
        pipeline_id: "load_staging_data".into(),
        staging_dir: staging_dir.to_path_buf(),
        target: TargetConfig {
            url: "memory://dwh".into(),
        },
        watermark_schema: "stg".into(),
        overlap_secs: 330,
        batch_size: 2,
        retry: RetrySettings {
            attempts: 2,
            delay_secs: 0,
        },
        skip_marker: None,
        downstream: None,
        tables: BTreeMap::from([(table.name.clone(), table)]),
        sources: sources.into_iter().map(|s| (s.id.clone(), s)).collect(),
    }
}

/// One `orders` row; `amount: None` is a SQL NULL.
pub fn order(id: i64, amount: Option<&str>, updated_at: NaiveDateTime) -> RowData {
    RowData::new(
        ORDERS,
        vec![
            FieldValue::new("id", Value::Int(id)),
            FieldValue::new(
                "amount",
                amount.map_or(Value::Null, |a| Value::String(a.to_string())),
            ),
            FieldValue::new("updated_at", Value::TimestampNaive(updated_at)),
        ],
    )
}

pub fn orders_batch(rows: Vec<RowData>) -> RecordBatch {
    RecordBatch::new(
        ORDERS,
        vec!["id".into(), "amount".into(), "updated_at".into()],
        rows,
    )
}

pub fn run_context(config: &PipelineConfig, hour: u32) -> RunContext {
    let run_ts = Utc
        .with_ymd_and_hms(2024, 1, 19, hour, 0, 0)
        .single()
        .expect("valid run timestamp");
    RunContext::scheduled(
        &config.pipeline_id,
        run_ts,
        CsvStagingArea::new(&config.staging_dir),
    )
}

pub fn runner(
    config: PipelineConfig,
    target: Arc<MemoryTarget>,
    sources: Vec<(&str, Arc<MemorySource>)>,
) -> PipelineRunner {
    let connector = sources
        .into_iter()
        .fold(MemoryConnector::new(), |c, (id, s)| c.with_source(id, s));
    PipelineRunner::new(Arc::new(config), target, Arc::new(connector))
}

/// Text form of `column` for every row, `None` for null.
pub fn column(rows: &[RowData], column: &str) -> Vec<Option<String>> {
    rows.iter().map(|r| r.get_value(column).to_text()).collect()
}
