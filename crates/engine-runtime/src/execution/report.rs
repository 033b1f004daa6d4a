use chrono::{DateTime, Utc};
use engine_core::metrics::MetricsSnapshot;
use serde::Serialize;

/// Stage of a (source, table) unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Extract,
    Split,
    LoadStaging,
    LoadDeadLetter,
    Dedup,
}

impl StageName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Extract => "extract",
            StageName::Split => "split",
            StageName::LoadStaging => "load_stg",
            StageName::LoadDeadLetter => "load_dlq",
            StageName::Dedup => "dedup",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitStatus {
    Succeeded,
    Failed { stage: StageName, error: String },
    Cancelled { stage: StageName },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UnitCounts {
    pub extracted: usize,
    pub valid: usize,
    pub invalid: usize,
    pub loaded_stg: u64,
    pub loaded_dlq: u64,
    pub dlq_removed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub source: String,
    pub table: String,
    #[serde(flatten)]
    pub status: UnitStatus,
    pub counts: UnitCounts,
}

impl UnitReport {
    pub fn succeeded(&self) -> bool {
        self.status == UnitStatus::Succeeded
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DownstreamStatus {
    /// No downstream pipeline is configured.
    NotConfigured,
    /// At least one unit failed, so the downstream was not started.
    NotRun,
    Completed { name: String },
    Failed { name: String, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Skipped { reason: String },
    Succeeded,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub pipeline_id: String,
    pub run_id: String,
    pub run_ts: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: RunOutcome,
    pub units: Vec<UnitReport>,
    pub downstream: DownstreamStatus,
    pub metrics: MetricsSnapshot,
    pub duration_ms: u128,
}

impl RunReport {
    pub fn failed_units(&self) -> impl Iterator<Item = &UnitReport> {
        self.units.iter().filter(|u| !u.succeeded())
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Succeeded | RunOutcome::Skipped { .. })
    }
}
