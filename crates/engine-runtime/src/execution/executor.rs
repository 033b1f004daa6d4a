use crate::{
    error::PipelineError,
    execution::{
        factory::SourceConnector,
        gate::{DefaultSkipGate, SkipGate},
        report::{
            DownstreamStatus, RunOutcome, RunReport, StageName, UnitCounts, UnitReport, UnitStatus,
        },
        trigger::{DownstreamTrigger, classify_trigger_error},
        unit::{Unit, UnitStages},
    },
};
use connectors::sql::base::store::TargetStore;
use engine_config::ddl::target_columns;
use engine_core::{context::run::RunContext, error::RetryError, retry::RetryPolicy};
use engine_processing::{
    dedup::Deduplicator,
    error::StageError,
    extract::Extractor,
    load::Loader,
    retry::classify_stage_error,
    transform::{checks::CheckRegistry, split::Splitter},
    watermark::{WatermarkSnapshot, WatermarkTracker},
};
use model::{
    core::identifiers::TableRef,
    execution::pipeline::{LoadTarget, PipelineConfig},
};
use std::{collections::HashMap, sync::Arc, time::Instant};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Assembles and runs one pipeline run: skip gate, target preparation,
/// one parallel unit per (source, table), then the downstream trigger.
pub struct PipelineRunner {
    config: Arc<PipelineConfig>,
    target: Arc<dyn TargetStore>,
    sources: Arc<dyn SourceConnector>,
    registry: Arc<CheckRegistry>,
    gate: Arc<dyn SkipGate>,
    trigger: Option<Arc<dyn DownstreamTrigger>>,
}

impl PipelineRunner {
    pub fn new(
        config: Arc<PipelineConfig>,
        target: Arc<dyn TargetStore>,
        sources: Arc<dyn SourceConnector>,
    ) -> Self {
        Self {
            config,
            target,
            sources,
            registry: Arc::new(CheckRegistry::builtin()),
            gate: Arc::new(DefaultSkipGate),
            trigger: None,
        }
    }

    pub fn with_registry(mut self, registry: CheckRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn with_gate(mut self, gate: Arc<dyn SkipGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_trigger(mut self, trigger: Arc<dyn DownstreamTrigger>) -> Self {
        self.trigger = Some(trigger);
        self
    }

    fn retry_policy(&self, ctx: &RunContext) -> RetryPolicy {
        RetryPolicy::from_settings(&self.config.retry).with_metrics(ctx.metrics.clone())
    }

    pub async fn run(&self, ctx: RunContext) -> Result<RunReport, PipelineError> {
        let started = Instant::now();
        info!(
            pipeline = %self.config.pipeline_id,
            run_id = %ctx.run_id,
            "Starting pipeline run"
        );

        if let Some(reason) = self.gate.skip_reason(&self.config) {
            info!(%reason, "Skipping run");
            let outcome = RunOutcome::Skipped { reason };
            return Ok(self.report(&ctx, outcome, vec![], DownstreamStatus::NotRun, started));
        }

        self.prepare(&ctx).await?;
        let watermarks = self.read_watermarks(&ctx).await?;

        let units = self.run_units(&ctx, watermarks).await;
        if ctx.is_cancelled() {
            warn!("Shutdown requested, downstream pipeline will not be triggered");
            let outcome = RunOutcome::Cancelled;
            return Ok(self.report(&ctx, outcome, units, DownstreamStatus::NotRun, started));
        }

        let failed = units.iter().filter(|u| !u.succeeded()).count();
        if failed > 0 {
            error!(failed, total = units.len(), "Run finished with failed units");
            let outcome = RunOutcome::Failed;
            return Ok(self.report(&ctx, outcome, units, DownstreamStatus::NotRun, started));
        }

        let downstream = self.fire_downstream(&ctx).await;
        let outcome = match downstream {
            DownstreamStatus::Failed { .. } => RunOutcome::Failed,
            _ => RunOutcome::Succeeded,
        };

        info!(
            pipeline = %self.config.pipeline_id,
            units = units.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Pipeline run finished"
        );
        Ok(self.report(&ctx, outcome, units, downstream, started))
    }

    /// Creates both schemas and every table in each of them.
    async fn prepare(&self, ctx: &RunContext) -> Result<(), PipelineError> {
        let retry = self.retry_policy(ctx);

        for target in LoadTarget::ALL {
            retry
                .run(
                    "prepare",
                    &ctx.cancel,
                    || async {
                        self.target.ensure_schema(target.schema()).await?;
                        for table in self.config.tables.values() {
                            let table_ref = TableRef::new(target.schema(), &table.name);
                            self.target
                                .ensure_table(&table_ref, &target_columns(table, target))
                                .await?;
                        }
                        Ok::<_, StageError>(())
                    },
                    classify_stage_error,
                )
                .await
                .map_err(|err| match err {
                    RetryError::Cancelled => PipelineError::ShutdownRequested,
                    other => PipelineError::Prepare(other),
                })?;
        }

        info!(tables = self.config.tables.len(), "Target schemas prepared");
        Ok(())
    }

    /// Reads every table's watermark before any unit starts loading.
    async fn read_watermarks(&self, ctx: &RunContext) -> Result<WatermarkSnapshot, PipelineError> {
        let tracker = WatermarkTracker::new(self.target.clone(), &self.config.watermark_schema);
        let snapshot = self
            .retry_policy(ctx)
            .run(
                "watermarks",
                &ctx.cancel,
                || tracker.snapshot(self.config.tables.values()),
                classify_stage_error,
            )
            .await
            .map_err(|err| match err {
                RetryError::Cancelled => PipelineError::ShutdownRequested,
                other => PipelineError::Watermark(other),
            })?;

        info!(tables = snapshot.len(), "Watermarks read");
        Ok(snapshot)
    }

    async fn run_units(&self, ctx: &RunContext, watermarks: WatermarkSnapshot) -> Vec<UnitReport> {
        let stages = UnitStages {
            sources: self.sources.clone(),
            extractor: Extractor::new(Arc::new(watermarks), self.config.overlap_secs),
            splitter: Arc::new(Splitter::new(self.registry.clone())),
            loader: Loader::new(self.target.clone(), self.config.batch_size),
            deduplicator: Deduplicator::new(self.target.clone()),
            retry: self.retry_policy(ctx),
        };

        let units = self.config.units();
        let total = units.len();
        let mut keys = HashMap::with_capacity(total);
        let mut set = JoinSet::new();
        for (idx, (source, table)) in units.into_iter().enumerate() {
            info!(
                "Processing unit {}/{}: {}.{}",
                idx + 1,
                total,
                source.id,
                table.name
            );
            let unit = Unit {
                ctx: ctx.clone(),
                stages: stages.clone(),
                source: source.clone(),
                table: table.clone(),
            };
            let handle = set.spawn(unit.run());
            keys.insert(handle.id(), (source.id.clone(), table.name.clone()));
        }

        let mut reports = Vec::with_capacity(total);
        while let Some(joined) = set.join_next_with_id().await {
            match joined {
                Ok((_, report)) => reports.push(report),
                Err(err) => {
                    let (source, table) = keys.remove(&err.id()).unwrap_or_default();
                    error!(%source, %table, error = %err, "Unit task aborted");
                    ctx.metrics.increment_failed_units(1);
                    reports.push(UnitReport {
                        source,
                        table,
                        status: UnitStatus::Failed {
                            stage: StageName::Extract,
                            error: err.to_string(),
                        },
                        counts: UnitCounts::default(),
                    });
                }
            }
        }

        reports.sort_by(|a, b| (&a.source, &a.table).cmp(&(&b.source, &b.table)));
        reports
    }

    async fn fire_downstream(&self, ctx: &RunContext) -> DownstreamStatus {
        let Some(trigger) = &self.trigger else {
            return DownstreamStatus::NotConfigured;
        };
        let name = trigger.name().to_string();

        let result = self
            .retry_policy(ctx)
            .run(
                "downstream",
                &ctx.cancel,
                || trigger.trigger(&ctx.cancel),
                classify_trigger_error,
            )
            .await;

        match result {
            Ok(()) => DownstreamStatus::Completed { name },
            Err(err) => {
                error!(downstream = %name, error = %err, "Downstream pipeline failed");
                DownstreamStatus::Failed {
                    name,
                    error: err.to_string(),
                }
            }
        }
    }

    fn report(
        &self,
        ctx: &RunContext,
        outcome: RunOutcome,
        units: Vec<UnitReport>,
        downstream: DownstreamStatus,
        started: Instant,
    ) -> RunReport {
        RunReport {
            pipeline_id: self.config.pipeline_id.clone(),
            run_id: ctx.run_id.to_string(),
            run_ts: ctx.run_ts,
            outcome,
            units,
            downstream,
            metrics: ctx.metrics.snapshot(),
            duration_ms: started.elapsed().as_millis(),
        }
    }
}
