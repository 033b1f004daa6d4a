use crate::metrics::Metrics;
use chrono::{DateTime, Utc};
use connectors::file::csv::staging::CsvStagingArea;
use model::{
    core::identifiers::RunId,
    records::handle::{Stage, StageHandle},
};
use tokio_util::sync::CancellationToken;

/// Everything a stage needs to know about the run it belongs to.
///
/// Cloned into every (source, table) unit; the metrics and the cancellation
/// token are shared between clones.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub pipeline_id: String,
    pub run_id: RunId,
    pub run_ts: DateTime<Utc>,
    pub staging: CsvStagingArea,
    pub metrics: Metrics,
    pub cancel: CancellationToken,
}

impl RunContext {
    pub fn new(
        pipeline_id: &str,
        run_id: RunId,
        run_ts: DateTime<Utc>,
        staging: CsvStagingArea,
    ) -> Self {
        RunContext {
            pipeline_id: pipeline_id.to_string(),
            run_id,
            run_ts,
            staging,
            metrics: Metrics::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// A scheduled run identified by its logical timestamp.
    pub fn scheduled(pipeline_id: &str, run_ts: DateTime<Utc>, staging: CsvStagingArea) -> Self {
        Self::new(pipeline_id, RunId::scheduled(run_ts), run_ts, staging)
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn handle(&self, table: &str, stage: Stage, source_id: &str) -> StageHandle {
        StageHandle::new(&self.pipeline_id, table, stage, self.run_ts, source_id)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
