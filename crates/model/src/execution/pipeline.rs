use crate::execution::check::CheckCode;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, path::PathBuf};

/// Provenance column holding the source's city/branch name.
pub const SRC_ID_COLUMN: &str = "src_id";
/// Provenance column holding the id of the run that loaded the row.
pub const RUN_ID_COLUMN: &str = "run_id";
/// Column holding the failed check codes of a rejected row.
pub const REJECT_REASONS_COLUMN: &str = "reject_reasons";

pub const DEFAULT_PIPELINE_ID: &str = "load_staging_data";
pub const DEFAULT_STAGING_DIR: &str = "/tmp/stg_loader_staging";
pub const DEFAULT_WATERMARK_SCHEMA: &str = "stg";
pub const DEFAULT_OVERLAP_SECS: i64 = 330;
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Static description of one ETL run: which tables exist, how they are
/// checked and loaded, and which sources provide them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_pipeline_id")]
    pub pipeline_id: String,
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
    pub target: TargetConfig,
    #[serde(default = "default_watermark_schema")]
    pub watermark_schema: String,
    #[serde(default = "default_overlap_secs")]
    pub overlap_secs: i64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub skip_marker: Option<PathBuf>,
    #[serde(default)]
    pub downstream: Option<DownstreamConfig>,
    pub tables: BTreeMap<String, TableConfig>,
    pub sources: BTreeMap<String, SourceConfig>,
}

impl PipelineConfig {
    pub fn table(&self, name: &str) -> Option<&TableConfig> {
        self.tables.get(name)
    }

    pub fn source(&self, id: &str) -> Option<&SourceConfig> {
        self.sources.get(id)
    }

    /// Every (source, table) pair the run processes, in a stable order.
    pub fn units(&self) -> Vec<(&SourceConfig, &TableConfig)> {
        self.sources
            .values()
            .flat_map(|source| {
                source
                    .tables
                    .iter()
                    .filter_map(move |table| self.tables.get(table).map(|t| (source, t)))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    /// Filled from the key of the `tables` map.
    #[serde(skip)]
    pub name: String,
    pub increment_col: String,
    #[serde(default)]
    pub check_list: Vec<CheckCode>,
    pub tech_load_column: ColumnDef,
    pub columns: Vec<ColumnDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: String,
}

impl ColumnDef {
    pub fn new(name: &str, sql_type: &str) -> Self {
        ColumnDef {
            name: name.to_string(),
            sql_type: sql_type.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Filled from the key of the `sources` map.
    #[serde(skip)]
    pub id: String,
    pub url: String,
    pub city_name: String,
    pub tables: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    pub attempts: usize,
    pub delay_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        // One retry after ten seconds.
        RetrySettings {
            attempts: 2,
            delay_secs: 10,
        }
    }
}

/// Pipeline started once every unit of the run has succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownstreamConfig {
    pub name: String,
    pub command: Vec<String>,
}

/// The warehouse schema a batch is appended to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadTarget {
    Staging,
    DeadLetter,
}

impl LoadTarget {
    pub const ALL: [LoadTarget; 2] = [LoadTarget::Staging, LoadTarget::DeadLetter];

    pub fn schema(&self) -> &'static str {
        match self {
            LoadTarget::Staging => "stg",
            LoadTarget::DeadLetter => "dlq",
        }
    }
}

impl fmt::Display for LoadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.schema())
    }
}

fn default_pipeline_id() -> String {
    DEFAULT_PIPELINE_ID.to_string()
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from(DEFAULT_STAGING_DIR)
}

fn default_watermark_schema() -> String {
    DEFAULT_WATERMARK_SCHEMA.to_string()
}

fn default_overlap_secs() -> i64 {
    DEFAULT_OVERLAP_SECS
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
