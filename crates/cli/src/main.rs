use crate::{
    error::CliError,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use chrono::{DateTime, Utc};
use clap::Parser;
use commands::Commands;
use connectors::{
    file::csv::staging::CsvStagingArea,
    sql::{base::store::TargetStore, postgres::adapter::PgAdapter},
};
use engine_config::{env::EnvManager, loader::load_config};
use engine_core::{context::run::RunContext, retry::RetryPolicy};
use engine_processing::retry::classify_connector_error;
use engine_runtime::{
    error::PipelineError,
    execution::{
        executor::PipelineRunner, factory::PgSourceConnector, report::RunOutcome,
        trigger::CommandTrigger,
    },
    maintenance::{DEFAULT_MAX_AGE, cleanup_stale_files},
};
use model::{core::identifiers::RunId, execution::pipeline::PipelineConfig};
use std::{path::Path, sync::Arc, time::Duration};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod conn;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "stg-loader",
    version = "0.1.0",
    about = "Incremental loader of branch databases into staging"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let shutdown = ShutdownCoordinator::new(Default::default());
    shutdown.register_handlers();

    let code = match execute(cli.command, &shutdown).await {
        Ok(()) => ExitCode::Success,
        Err(CliError::ShutdownRequested | CliError::Pipeline(PipelineError::ShutdownRequested)) => {
            ExitCode::ShutdownRequested
        }
        Err(err) => {
            error!("{err}");
            ExitCode::GeneralError
        }
    };

    std::process::exit(code.as_i32());
}

async fn execute(command: Commands, shutdown: &ShutdownCoordinator) -> Result<(), CliError> {
    match command {
        Commands::Run {
            config,
            env_file,
            run_ts,
            output,
        } => {
            let config = load_pipeline_config(&config, env_file.as_deref())?;
            let (run_id, run_ts) = run_identity(run_ts.as_deref())?;
            run_pipeline(config, run_id, run_ts, output.as_deref(), shutdown).await
        }
        Commands::Cleanup { dir, max_age_mins } => {
            let max_age = max_age_mins
                .map(|mins| Duration::from_secs(mins * 60))
                .unwrap_or(DEFAULT_MAX_AGE);
            let report = cleanup_stale_files(Path::new(&dir), max_age)?;
            output::print_report(&report)?;
            if report.failed.is_empty() {
                Ok(())
            } else {
                Err(CliError::CleanupIncomplete(report.failed.len()))
            }
        }
        Commands::CheckConfig { config, env_file } => {
            let config = load_pipeline_config(&config, env_file.as_deref())?;
            info!(
                pipeline = %config.pipeline_id,
                tables = config.tables.len(),
                sources = config.sources.len(),
                units = config.units().len(),
                "Config is valid"
            );
            Ok(())
        }
        Commands::TestConn { config, env_file } => {
            let config = load_pipeline_config(&config, env_file.as_deref())?;
            conn::ping_all(&config).await
        }
    }
}

fn load_pipeline_config(
    path: &str,
    env_file: Option<&str>,
) -> Result<Arc<PipelineConfig>, CliError> {
    let mut env = EnvManager::new();
    if let Some(env_file) = env_file {
        env.load_from_file(env_file)?;
    }
    Ok(load_config(Path::new(path), &env)?)
}

/// A run with an explicit logical timestamp is a scheduled run; without one
/// it is a manual run at the current time.
fn run_identity(value: Option<&str>) -> Result<(RunId, DateTime<Utc>), CliError> {
    match value {
        None => {
            let now = Utc::now();
            Ok((RunId::manual(now), now))
        }
        Some(raw) => {
            let ts = DateTime::parse_from_rfc3339(raw)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|_| CliError::InvalidRunTs(raw.to_string()))?;
            Ok((RunId::scheduled(ts), ts))
        }
    }
}

async fn run_pipeline(
    config: Arc<PipelineConfig>,
    run_id: RunId,
    run_ts: DateTime<Utc>,
    output: Option<&str>,
    shutdown: &ShutdownCoordinator,
) -> Result<(), CliError> {
    let url = config.target.url.as_str();
    let adapter = RetryPolicy::for_database()
        .run(
            "connect target",
            &shutdown.cancel_token(),
            || PgAdapter::connect(url),
            classify_connector_error,
        )
        .await
        .map_err(|err| match err.into_inner() {
            Some(err) => CliError::Connector(err),
            None => CliError::ShutdownRequested,
        })?;
    let target: Arc<dyn TargetStore> = Arc::new(adapter);

    let mut runner = PipelineRunner::new(config.clone(), target, Arc::new(PgSourceConnector));
    if let Some(downstream) = &config.downstream {
        runner = runner.with_trigger(Arc::new(CommandTrigger::new(downstream.clone())));
    }

    let staging = CsvStagingArea::new(&config.staging_dir);
    let ctx = RunContext::new(&config.pipeline_id, run_id, run_ts, staging)
        .with_cancel(shutdown.cancel_token());

    let report = runner.run(ctx).await?;
    output::emit_report(&report, output).await?;

    for unit in report.failed_units() {
        warn!(source = %unit.source, table = %unit.table, status = ?unit.status, "Unit did not succeed");
    }

    match report.outcome {
        RunOutcome::Cancelled => Err(CliError::ShutdownRequested),
        _ if shutdown.is_shutdown_requested() => Err(CliError::ShutdownRequested),
        _ if report.is_success() => Ok(()),
        _ => Err(CliError::RunFailed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_explicit_run_ts_is_scheduled_in_utc() {
        let (run_id, ts) = run_identity(Some("2024-01-19T15:00:00+03:00")).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 1, 19, 12, 0, 0).unwrap());
        assert_eq!(run_id.as_str(), "scheduled__2024-01-19T12:00:00+00:00");
    }

    #[test]
    fn test_missing_run_ts_is_manual() {
        let (run_id, _) = run_identity(None).unwrap();
        assert!(run_id.as_str().starts_with("manual__"));
    }

    #[test]
    fn test_invalid_run_ts_is_rejected() {
        assert!(matches!(
            run_identity(Some("yesterday")),
            Err(CliError::InvalidRunTs(_))
        ));
    }

    #[test]
    fn test_cli_parses_run_command() {
        let cli = Cli::try_parse_from([
            "stg-loader",
            "run",
            "--config",
            "pipeline.json",
            "--run-ts",
            "2024-01-19T12:00:00Z",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Run { run_ts: Some(_), output: None, .. }
        ));
    }

    #[test]
    fn test_cleanup_defaults_max_age() {
        let cli = Cli::try_parse_from(["stg-loader", "cleanup", "--dir", "/tmp/stg"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Cleanup { max_age_mins: None, .. }
        ));
    }
}
