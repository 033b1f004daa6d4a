use crate::execution::{
    factory::SourceConnector,
    report::{StageName, UnitCounts, UnitReport, UnitStatus},
};
use engine_core::{context::run::RunContext, error::RetryError, retry::RetryPolicy};
use engine_processing::{
    dedup::Deduplicator, error::StageError, extract::Extractor, load::Loader,
    retry::classify_stage_error, transform::split::Splitter,
};
use model::execution::pipeline::{LoadTarget, SourceConfig, TableConfig};
use std::{future::Future, sync::Arc};
use tracing::{error, info, warn};

enum UnitFailure {
    Stage { stage: StageName, error: String },
    Cancelled { stage: StageName },
}

/// Stage components shared by every unit of a run.
#[derive(Clone)]
pub(crate) struct UnitStages {
    pub sources: Arc<dyn SourceConnector>,
    pub extractor: Extractor,
    pub splitter: Arc<Splitter>,
    pub loader: Loader,
    pub deduplicator: Deduplicator,
    pub retry: RetryPolicy,
}

/// One (source, table) sequence: extract, split, both loads, dedup.
pub(crate) struct Unit {
    pub ctx: RunContext,
    pub stages: UnitStages,
    pub source: SourceConfig,
    pub table: TableConfig,
}

impl Unit {
    pub async fn run(self) -> UnitReport {
        let mut counts = UnitCounts::default();
        let status = match self.execute(&mut counts).await {
            Ok(()) => UnitStatus::Succeeded,
            Err(UnitFailure::Stage { stage, error }) => {
                error!(
                    source = %self.source.id,
                    table = %self.table.name,
                    stage = stage.as_str(),
                    %error,
                    "Unit failed"
                );
                self.ctx.metrics.increment_failed_units(1);
                UnitStatus::Failed { stage, error }
            }
            Err(UnitFailure::Cancelled { stage }) => {
                warn!(
                    source = %self.source.id,
                    table = %self.table.name,
                    stage = stage.as_str(),
                    "Unit cancelled"
                );
                UnitStatus::Cancelled { stage }
            }
        };

        UnitReport {
            source: self.source.id.clone(),
            table: self.table.name.clone(),
            status,
            counts,
        }
    }

    async fn execute(&self, counts: &mut UnitCounts) -> Result<(), UnitFailure> {
        let Unit {
            ctx,
            stages,
            source,
            table,
        } = self;

        let extracted = self
            .stage(StageName::Extract, || async {
                let store = stages.sources.connect(source).await?;
                stages
                    .extractor
                    .extract(ctx, store.as_ref(), source, table)
                    .await
            })
            .await?;

        let split = self
            .stage(StageName::Split, || async {
                stages.splitter.split(ctx, &extracted, table, source)
            })
            .await?;
        counts.extracted = split.counts.total();
        counts.valid = split.counts.valid;
        counts.invalid = split.counts.invalid;

        // The two loads read different files and write different schemas.
        let (loaded_stg, loaded_dlq) = tokio::try_join!(
            self.stage(StageName::LoadStaging, || async {
                stages
                    .loader
                    .load(ctx, &split.valid, table, LoadTarget::Staging)
                    .await
            }),
            self.stage(StageName::LoadDeadLetter, || async {
                stages
                    .loader
                    .load(ctx, &split.invalid, table, LoadTarget::DeadLetter)
                    .await
            }),
        )?;
        counts.loaded_stg = loaded_stg;
        counts.loaded_dlq = loaded_dlq;

        let dedup = self
            .stage(StageName::Dedup, || async {
                stages.deduplicator.dedup(table).await
            })
            .await?;
        counts.dlq_removed = dedup.removed();
        ctx.metrics.increment_dlq_removed(dedup.removed() as u64);

        info!(
            source = %source.id,
            table = %table.name,
            extracted = counts.extracted,
            loaded_stg,
            loaded_dlq,
            "Unit completed"
        );
        Ok(())
    }

    async fn stage<T, F, Fut>(&self, stage: StageName, op: F) -> Result<T, UnitFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StageError>>,
    {
        if self.ctx.is_cancelled() {
            return Err(UnitFailure::Cancelled { stage });
        }

        self.stages
            .retry
            .run(stage.as_str(), &self.ctx.cancel, op, classify_stage_error)
            .await
            .map_err(|err| match err {
                RetryError::Cancelled => UnitFailure::Cancelled { stage },
                other => UnitFailure::Stage {
                    stage,
                    error: other.to_string(),
                },
            })
    }
}
