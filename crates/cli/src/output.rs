use crate::error::CliError;
use serde::Serialize;

fn generate_report_json<T: Serialize>(report: &T) -> Result<String, CliError> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub async fn write_report<T: Serialize>(report: &T, path: &str) -> Result<(), CliError> {
    let report_json = generate_report_json(report)?;
    tokio::fs::write(path, report_json).await?;
    Ok(())
}

pub fn print_report<T: Serialize>(report: &T) -> Result<(), CliError> {
    let report_json = generate_report_json(report)?;
    println!("{report_json}");
    Ok(())
}

pub async fn emit_report<T: Serialize>(report: &T, path: Option<&str>) -> Result<(), CliError> {
    match path {
        Some(path) => write_report(report, path).await,
        None => print_report(report),
    }
}
