use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Path, PathBuf},
};

pub const STAGING_FILE_EXTENSION: &str = "csv";
const RUN_TS_FORMAT: &str = "%Y%m%dT%H%M%S";

/// The step that produced an intermediate file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Extract,
    TransformValid,
    TransformInvalid,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::TransformValid => "transform_valid",
            Stage::TransformInvalid => "transform_invalid",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed reference to an intermediate file handed from one stage to the next.
///
/// The location is fully determined by the handle, so two runs never share a
/// file unless they share pipeline, table, stage, run timestamp and source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StageHandle {
    pub pipeline_id: String,
    pub table: String,
    pub stage: Stage,
    pub run_ts: DateTime<Utc>,
    pub source_id: String,
}

impl StageHandle {
    pub fn new(
        pipeline_id: &str,
        table: &str,
        stage: Stage,
        run_ts: DateTime<Utc>,
        source_id: &str,
    ) -> Self {
        StageHandle {
            pipeline_id: pipeline_id.to_string(),
            table: table.to_string(),
            stage,
            run_ts,
            source_id: source_id.to_string(),
        }
    }

    /// Handle for the same unit of work at another stage.
    pub fn with_stage(&self, stage: Stage) -> Self {
        StageHandle {
            stage,
            ..self.clone()
        }
    }

    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}_{}_{}.{}",
            self.pipeline_id,
            self.table,
            self.stage,
            self.run_ts.format(RUN_TS_FORMAT),
            self.source_id,
            STAGING_FILE_EXTENSION
        )
    }

    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }
}

impl fmt::Display for StageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}
