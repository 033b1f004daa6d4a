#[cfg(test)]
mod tests {
    use crate::{
        memory::{MemorySource, MemoryTarget},
        utils::{
            ORDERS, TECH_COLUMN, column, order, orders_batch, orders_table, pipeline_config,
            run_context, runner, source, ts,
        },
    };
    use async_trait::async_trait;
    use engine_core::context::run::RunContext;
    use engine_processing::{
        extract::Extractor,
        transform::{checks::CheckRegistry, split::Splitter},
        watermark::WatermarkTracker,
    };
    use engine_runtime::{
        error::TriggerError,
        execution::{
            report::{DownstreamStatus, RunOutcome, StageName, UnitStatus},
            trigger::DownstreamTrigger,
        },
    };
    use chrono::NaiveDateTime;
    use model::{
        core::{identifiers::TableRef, value::Value},
        execution::check::CheckCode,
        records::{batch::RecordBatch, handle::Stage, row::RowData},
    };
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };
    use tokio_util::sync::CancellationToken;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct RecordingTrigger {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DownstreamTrigger for RecordingTrigger {
        fn name(&self) -> &str {
            "build_marts"
        }

        async fn trigger(&self, _cancel: &CancellationToken) -> Result<(), TriggerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn three_orders() -> RecordBatch {
        orders_batch(vec![
            order(1, Some("10.5"), ts(19, 11, 0, 0)),
            order(2, None, ts(19, 11, 10, 0)),
            order(3, Some("0"), ts(19, 11, 20, 0)),
        ])
    }

    // Scenario: source table has 3 rows, one of them fails `not_null`, and the
    // warehouse has never seen the table.
    // Expected Outcome:
    // - stg.orders holds the 2 valid rows in source order;
    // - dlq.orders holds 1 row tagged `not_null`;
    // - the downstream pipeline is triggered once.
    #[traced_test]
    #[tokio::test]
    async fn tc01() {
        let dir = tempfile::tempdir().unwrap();
        let config = pipeline_config(
            dir.path(),
            orders_table(&[CheckCode::NotNull]),
            vec![source("shop_1", "Kazan")],
        );
        let ctx = run_context(&config, 12);
        let target = Arc::new(MemoryTarget::new());
        let shop = Arc::new(MemorySource::new().with_table(three_orders()));
        let trigger = Arc::new(RecordingTrigger::default());

        let report = runner(config, target.clone(), vec![("shop_1", shop.clone())])
            .with_trigger(trigger.clone())
            .run(ctx)
            .await
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::Succeeded);
        assert_eq!(report.units.len(), 1);
        assert_eq!(report.units[0].counts.extracted, 3);
        assert_eq!(report.units[0].counts.loaded_stg, 2);
        assert_eq!(report.units[0].counts.loaded_dlq, 1);

        let stg = target.rows("stg", ORDERS);
        assert_eq!(column(&stg, "id"), vec![Some("1".into()), Some("3".into())]);
        assert_eq!(column(&stg, "src_id"), vec![Some("Kazan".into()); 2]);
        assert!(stg.iter().all(|r| !r.get_value(TECH_COLUMN).is_null()));

        let dlq = target.rows("dlq", ORDERS);
        assert_eq!(dlq.len(), 1);
        assert_eq!(dlq[0].get_value("id"), Value::String("2".into()));
        assert_eq!(
            dlq[0].get_value("reject_reasons"),
            Value::String("not_null".into())
        );

        assert_eq!(shop.requests()[0].since, None);
        assert_eq!(trigger.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            report.downstream,
            DownstreamStatus::Completed {
                name: "build_marts".into()
            }
        );
        assert!(logs_contain("first load"));
    }

    // Scenario: stg.orders already holds a row at 12:00:00.
    // Expected Outcome: only source rows newer than 11:54:30 are extracted.
    #[traced_test]
    #[tokio::test]
    async fn tc02() {
        let dir = tempfile::tempdir().unwrap();
        let config = pipeline_config(
            dir.path(),
            orders_table(&[]),
            vec![source("shop_1", "Kazan")],
        );
        let ctx = run_context(&config, 13);

        let target = Arc::new(MemoryTarget::new());
        let mut loaded = order(100, Some("1"), ts(19, 12, 0, 0));
        loaded.push("src_id", Value::String("Kazan".into()));
        loaded.push("run_id", Value::String("earlier".into()));
        loaded.push(TECH_COLUMN, Value::String("2024-01-19 12:01:00".into()));
        target.seed(
            TableRef::new("stg", ORDERS),
            RecordBatch::new(
                ORDERS,
                ["id", "amount", "updated_at", "src_id", "run_id", TECH_COLUMN]
                    .map(String::from)
                    .to_vec(),
                vec![loaded],
            ),
        );

        let shop = Arc::new(MemorySource::new().with_table(orders_batch(vec![
            order(1, Some("1"), ts(19, 11, 50, 0)),
            order(2, Some("2"), ts(19, 11, 54, 30)),
            order(3, Some("3"), ts(19, 11, 55, 0)),
            order(4, Some("4"), ts(19, 12, 10, 0)),
        ])));

        let report = runner(config, target.clone(), vec![("shop_1", shop.clone())])
            .run(ctx)
            .await
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::Succeeded);
        assert_eq!(shop.requests()[0].since, Some(ts(19, 11, 54, 30)));
        assert_eq!(
            column(&target.rows("stg", ORDERS), "id"),
            vec![Some("100".into()), Some("3".into()), Some("4".into())]
        );
        assert_eq!(report.downstream, DownstreamStatus::NotConfigured);
    }

    // Scenario: dlq.orders holds 5 rows forming 3 (load time, source, reasons)
    // groups and the run rejects nothing.
    // Expected Outcome: dedup leaves the first row of each group.
    #[traced_test]
    #[tokio::test]
    async fn tc03() {
        let dir = tempfile::tempdir().unwrap();
        let config = pipeline_config(
            dir.path(),
            orders_table(&[CheckCode::NotNull]),
            vec![source("shop_1", "Kazan")],
        );
        let ctx = run_context(&config, 12);

        let dlq_row = |id: i64, src: &str, reasons: &str, at: &str| {
            let mut row = order(id, None, ts(18, 9, 0, 0));
            row.push("src_id", Value::String(src.into()));
            row.push("run_id", Value::String("earlier".into()));
            row.push("reject_reasons", Value::String(reasons.into()));
            row.push(TECH_COLUMN, Value::String(at.into()));
            row
        };
        let target = Arc::new(MemoryTarget::new());
        target.seed(
            TableRef::new("dlq", ORDERS),
            RecordBatch::new(
                ORDERS,
                ["id", "amount", "updated_at", "src_id", "run_id", "reject_reasons", TECH_COLUMN]
                    .map(String::from)
                    .to_vec(),
                vec![
                    dlq_row(1, "Kazan", "not_null", "2024-01-18 09:05:00"),
                    dlq_row(2, "Kazan", "not_null", "2024-01-18 09:05:00"),
                    dlq_row(3, "Omsk", "not_null", "2024-01-18 09:05:00"),
                    dlq_row(4, "Omsk", "not_null", "2024-01-18 09:05:00"),
                    dlq_row(5, "Kazan", "not_null", "2024-01-18 10:05:00"),
                ],
            ),
        );

        let shop = Arc::new(MemorySource::new().with_table(orders_batch(vec![order(
            9,
            Some("1"),
            ts(19, 11, 0, 0),
        )])));

        let report = runner(config, target.clone(), vec![("shop_1", shop)])
            .run(ctx)
            .await
            .unwrap();

        assert_eq!(report.units[0].counts.dlq_removed, 2);
        assert_eq!(report.metrics.dlq_duplicates_removed, 2);
        assert_eq!(
            column(&target.rows("dlq", ORDERS), "id"),
            vec![Some("1".into()), Some("3".into()), Some("5".into())]
        );
    }

    // Scenario: one of two sources is unreachable for the whole retry budget.
    // Expected Outcome: the healthy unit still loads, the run fails and the
    // downstream pipeline is not started.
    #[traced_test]
    #[tokio::test]
    async fn tc04() {
        let dir = tempfile::tempdir().unwrap();
        let config = pipeline_config(
            dir.path(),
            orders_table(&[CheckCode::NotNull]),
            vec![source("shop_1", "Kazan"), source("shop_2", "Omsk")],
        );
        let ctx = run_context(&config, 12);
        let target = Arc::new(MemoryTarget::new());
        let healthy = Arc::new(MemorySource::new().with_table(three_orders()));
        let broken = Arc::new(MemorySource::unreachable());
        let trigger = Arc::new(RecordingTrigger::default());

        let report = runner(
            config,
            target.clone(),
            vec![("shop_1", healthy), ("shop_2", broken.clone())],
        )
        .with_trigger(trigger.clone())
        .run(ctx)
        .await
        .unwrap();

        assert_eq!(report.outcome, RunOutcome::Failed);
        assert!(!report.is_success());
        assert_eq!(report.units[0].source, "shop_1");
        assert!(report.units[0].succeeded());
        assert!(matches!(
            report.units[1].status,
            UnitStatus::Failed {
                stage: StageName::Extract,
                ..
            }
        ));

        let failed: Vec<&str> = report.failed_units().map(|u| u.source.as_str()).collect();
        assert_eq!(failed, vec!["shop_2"]);

        assert_eq!(broken.requests().len(), 2);
        assert_eq!(report.metrics.retry_count, 1);
        assert_eq!(report.metrics.failed_units, 1);
        assert_eq!(target.rows("stg", ORDERS).len(), 2);
        assert_eq!(trigger.calls.load(Ordering::SeqCst), 0);
        assert_eq!(report.downstream, DownstreamStatus::NotRun);
    }

    // Scenario: the source drops the first query.
    // Expected Outcome: the retry succeeds and the run completes.
    #[traced_test]
    #[tokio::test]
    async fn tc05() {
        let dir = tempfile::tempdir().unwrap();
        let config = pipeline_config(
            dir.path(),
            orders_table(&[]),
            vec![source("shop_1", "Kazan")],
        );
        let ctx = run_context(&config, 12);
        let target = Arc::new(MemoryTarget::new());
        let shop = Arc::new(MemorySource::new().with_table(three_orders()));
        shop.fail_next(1);

        let report = runner(config, target.clone(), vec![("shop_1", shop.clone())])
            .run(ctx)
            .await
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::Succeeded);
        assert_eq!(report.metrics.retry_count, 1);
        assert_eq!(shop.requests().len(), 2);
        assert_eq!(target.rows("stg", ORDERS).len(), 3);
        assert!(logs_contain("retrying"));
    }

    // Scenario: the skip marker exists.
    // Expected Outcome: nothing is prepared, extracted or triggered.
    #[traced_test]
    #[tokio::test]
    async fn tc06() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("SKIP");
        std::fs::write(&marker, "").unwrap();

        let mut config = pipeline_config(
            dir.path(),
            orders_table(&[]),
            vec![source("shop_1", "Kazan")],
        );
        config.skip_marker = Some(marker);
        let ctx = run_context(&config, 12);
        let target = Arc::new(MemoryTarget::new());
        let shop = Arc::new(MemorySource::new().with_table(three_orders()));
        let trigger = Arc::new(RecordingTrigger::default());

        let report = runner(config, target.clone(), vec![("shop_1", shop.clone())])
            .with_trigger(trigger.clone())
            .run(ctx)
            .await
            .unwrap();

        assert!(matches!(report.outcome, RunOutcome::Skipped { .. }));
        assert!(report.is_success());
        assert!(!target.has_schema("stg"));
        assert!(shop.requests().is_empty());
        assert_eq!(trigger.calls.load(Ordering::SeqCst), 0);
    }

    // Scenario: two sources feed the same table and both reject a row.
    // Expected Outcome: both rejects survive the per-table dedup runs and the
    // prepared tables carry provenance columns.
    #[traced_test]
    #[tokio::test]
    async fn tc07() {
        let dir = tempfile::tempdir().unwrap();
        let config = pipeline_config(
            dir.path(),
            orders_table(&[CheckCode::NotNull, CheckCode::NonNegative]),
            vec![source("shop_1", "Kazan"), source("shop_2", "Omsk")],
        );
        let ctx = run_context(&config, 12);
        let target = Arc::new(MemoryTarget::new());
        let kazan = Arc::new(MemorySource::new().with_table(three_orders()));
        let omsk = Arc::new(MemorySource::new().with_table(orders_batch(vec![
            order(7, Some("-4"), ts(19, 11, 0, 0)),
            order(8, Some("4"), ts(19, 11, 0, 0)),
        ])));

        let report = runner(
            config,
            target.clone(),
            vec![("shop_1", kazan), ("shop_2", omsk)],
        )
        .run(ctx)
        .await
        .unwrap();

        assert_eq!(report.outcome, RunOutcome::Succeeded);
        assert_eq!(report.metrics.rows_extracted, 5);
        assert_eq!(report.metrics.rows_valid, 3);
        assert_eq!(report.metrics.rows_rejected, 2);

        let mut reasons: Vec<(Option<String>, Option<String>)> = target
            .rows("dlq", ORDERS)
            .iter()
            .map(|r| {
                (
                    r.get_value("src_id").to_text(),
                    r.get_value("reject_reasons").to_text(),
                )
            })
            .collect();
        reasons.sort();
        assert_eq!(
            reasons,
            vec![
                (Some("Kazan".into()), Some("not_null".into())),
                (Some("Omsk".into()), Some("non_negative".into())),
            ]
        );

        assert_eq!(
            target.columns("dlq", ORDERS),
            ["id", "amount", "updated_at", "src_id", "run_id", "reject_reasons", TECH_COLUMN]
                .map(String::from)
                .to_vec()
        );
        assert_eq!(target.rows("stg", ORDERS).len(), 3);
    }

    // Scenario: shutdown is requested before the units start.
    // Expected Outcome: units stop before extracting and the run reports
    // cancellation.
    #[traced_test]
    #[tokio::test]
    async fn tc08() {
        let dir = tempfile::tempdir().unwrap();
        let config = pipeline_config(
            dir.path(),
            orders_table(&[]),
            vec![source("shop_1", "Kazan")],
        );
        let ctx = run_context(&config, 12);
        ctx.cancel.cancel();
        let target = Arc::new(MemoryTarget::new());
        let shop = Arc::new(MemorySource::new().with_table(three_orders()));
        let trigger = Arc::new(RecordingTrigger::default());

        let report = runner(config, target.clone(), vec![("shop_1", shop.clone())])
            .with_trigger(trigger.clone())
            .run(ctx)
            .await
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert!(matches!(
            report.units[0].status,
            UnitStatus::Cancelled {
                stage: StageName::Extract
            }
        ));
        assert!(shop.requests().is_empty());
        assert_eq!(trigger.calls.load(Ordering::SeqCst), 0);
    }

    // Scenario: rows are extracted to a file and read back by the splitter
    // with no checks configured.
    // Expected Outcome: every field keeps its text form; only the provenance
    // columns are new.
    #[tokio::test]
    async fn tc09() {
        let dir = tempfile::tempdir().unwrap();
        let config = pipeline_config(
            dir.path(),
            orders_table(&[]),
            vec![source("shop_1", "Kazan")],
        );
        let table = config.table(ORDERS).unwrap().clone();
        let shop_cfg = config.source("shop_1").unwrap().clone();
        let ctx: RunContext = run_context(&config, 12);

        let rows: Vec<RowData> = vec![
            order(1, Some("semi;colon"), ts(19, 11, 0, 0)),
            order(2, Some("with \"quotes\""), ts(19, 11, 0, 1)),
            order(3, None, ts(19, 11, 0, 2)),
        ];
        let shop = MemorySource::new().with_table(orders_batch(rows.clone()));
        let target: Arc<MemoryTarget> = Arc::new(MemoryTarget::new());

        let watermarks = WatermarkTracker::new(target, "stg")
            .snapshot([&table])
            .await
            .unwrap();
        let extractor = Extractor::new(Arc::new(watermarks), 330);
        let handle = extractor.extract(&ctx, &shop, &shop_cfg, &table).await.unwrap();
        assert_eq!(handle.stage, Stage::Extract);

        let output = Splitter::new(Arc::new(CheckRegistry::builtin()))
            .split(&ctx, &handle, &table, &shop_cfg)
            .unwrap();
        let valid = ctx.staging.read(&output.valid).unwrap();

        assert_eq!(valid.columns, vec!["id", "amount", "updated_at", "src_id", "run_id"]);
        for (original, read) in rows.iter().zip(&valid.rows) {
            for field in &original.field_values {
                assert_eq!(
                    read.get_value(&field.name).to_text(),
                    field.value.to_text(),
                    "field {}",
                    field.name
                );
            }
        }
    }

    // Scenario: the source table has no `updated_at` column.
    // Expected Outcome: the unit fails at extract without retrying and nothing
    // is loaded.
    #[tokio::test]
    async fn tc10() {
        let dir = tempfile::tempdir().unwrap();
        let config = pipeline_config(
            dir.path(),
            orders_table(&[]),
            vec![source("shop_1", "Kazan")],
        );
        let ctx = run_context(&config, 12);
        let target = Arc::new(MemoryTarget::new());
        let shop = Arc::new(MemorySource::new().with_table(RecordBatch::new(
            ORDERS,
            vec!["id".into()],
            vec![RowData::new(
                ORDERS,
                vec![model::core::value::FieldValue::new("id", Value::Int(1))],
            )],
        )));

        let report = runner(config, target.clone(), vec![("shop_1", shop.clone())])
            .run(ctx)
            .await
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::Failed);
        match &report.units[0].status {
            UnitStatus::Failed { stage, error } => {
                assert_eq!(*stage, StageName::Extract);
                assert!(error.contains("updated_at"), "{error}");
            }
            other => panic!("unexpected status {other:?}"),
        }
        assert_eq!(shop.requests().len(), 1);
        assert_eq!(report.metrics.retry_count, 0);
        assert!(target.rows("stg", ORDERS).is_empty());
    }

    fn stg_order(id: i64, updated_at: NaiveDateTime, src: &str) -> RowData {
        let mut row = order(id, Some("1"), updated_at);
        row.push("src_id", Value::String(src.into()));
        row.push("run_id", Value::String("earlier".into()));
        row.push(TECH_COLUMN, Value::String("2024-01-19 10:01:00".into()));
        row
    }

    fn seed_stg(target: &MemoryTarget, rows: Vec<RowData>) {
        target.seed(
            TableRef::new("stg", ORDERS),
            RecordBatch::new(
                ORDERS,
                ["id", "amount", "updated_at", "src_id", "run_id", TECH_COLUMN]
                    .map(String::from)
                    .to_vec(),
                rows,
            ),
        );
    }

    // Scenario: stg.orders was last loaded at 10:00. Kazan now has rows at
    // 12:00 and Omsk only has rows at 11:00, more than 330s before Kazan's.
    // Expected Outcome:
    // - the watermark is read once for the table, before either unit loads;
    // - both sources are asked for rows newer than 09:54:30;
    // - every new row from both sources lands in stg.orders.
    #[traced_test]
    #[tokio::test]
    async fn tc11() {
        let dir = tempfile::tempdir().unwrap();
        let config = pipeline_config(
            dir.path(),
            orders_table(&[]),
            vec![source("shop_1", "Kazan"), source("shop_2", "Omsk")],
        );
        let ctx = run_context(&config, 12);
        let target = Arc::new(MemoryTarget::new());
        seed_stg(&target, vec![stg_order(100, ts(19, 10, 0, 0), "Kazan")]);

        let kazan = Arc::new(MemorySource::new().with_table(orders_batch(vec![
            order(1, Some("1"), ts(19, 12, 0, 0)),
            order(2, Some("2"), ts(19, 12, 5, 0)),
        ])));
        let omsk = Arc::new(MemorySource::new().with_table(orders_batch(vec![
            order(7, Some("7"), ts(19, 11, 0, 0)),
            order(8, Some("8"), ts(19, 11, 30, 0)),
        ])));

        let report = runner(
            config,
            target.clone(),
            vec![("shop_1", kazan.clone()), ("shop_2", omsk.clone())],
        )
        .run(ctx)
        .await
        .unwrap();

        assert_eq!(report.outcome, RunOutcome::Succeeded);
        assert_eq!(target.watermark_reads(), 1);
        assert_eq!(kazan.requests()[0].since, Some(ts(19, 9, 54, 30)));
        assert_eq!(omsk.requests()[0].since, Some(ts(19, 9, 54, 30)));

        let mut ids = column(&target.rows("stg", ORDERS), "id");
        ids.sort();
        assert_eq!(
            ids,
            ["1", "100", "2", "7", "8"]
                .map(|id| Some(id.to_string()))
                .to_vec()
        );
    }

    // Scenario: after the watermarks are read, another unit appends a row at
    // 12:00 to stg.orders before this extract runs.
    // Expected Outcome: the extract still uses the bound read at the start of
    // the run and keeps the 11:00 row.
    #[tokio::test]
    async fn tc12() {
        let dir = tempfile::tempdir().unwrap();
        let config = pipeline_config(
            dir.path(),
            orders_table(&[]),
            vec![source("shop_2", "Omsk")],
        );
        let table = config.table(ORDERS).unwrap().clone();
        let omsk_cfg = config.source("shop_2").unwrap().clone();
        let ctx = run_context(&config, 12);

        let target = Arc::new(MemoryTarget::new());
        seed_stg(&target, vec![stg_order(100, ts(19, 10, 0, 0), "Kazan")]);
        let watermarks = WatermarkTracker::new(target.clone(), "stg")
            .snapshot([&table])
            .await
            .unwrap();

        seed_stg(
            &target,
            vec![
                stg_order(100, ts(19, 10, 0, 0), "Kazan"),
                stg_order(1, ts(19, 12, 0, 0), "Kazan"),
            ],
        );

        let omsk = MemorySource::new().with_table(orders_batch(vec![order(
            7,
            Some("7"),
            ts(19, 11, 0, 0),
        )]));
        let extractor = Extractor::new(Arc::new(watermarks), 330);
        let handle = extractor.extract(&ctx, &omsk, &omsk_cfg, &table).await.unwrap();

        assert_eq!(omsk.requests()[0].since, Some(ts(19, 9, 54, 30)));
        assert_eq!(ctx.staging.read(&handle).unwrap().len(), 1);
    }
}
