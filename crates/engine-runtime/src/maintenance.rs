use crate::error::PipelineError;
use model::records::handle::STAGING_FILE_EXTENSION;
use serde::Serialize;
use std::{
    fs, io,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Staging files older than this are removed by the cleanup job.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(120 * 60);

#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    pub dir: PathBuf,
    pub scanned: usize,
    pub deleted: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

/// Deletes `*.csv` files anywhere under `dir` last modified more than
/// `max_age` ago. Directories are kept. A missing directory has nothing
/// to clean.
pub fn cleanup_stale_files(dir: &Path, max_age: Duration) -> Result<CleanupReport, PipelineError> {
    cleanup_stale_files_at(dir, max_age, SystemTime::now())
}

pub fn cleanup_stale_files_at(
    dir: &Path,
    max_age: Duration,
    now: SystemTime,
) -> Result<CleanupReport, PipelineError> {
    let mut report = CleanupReport {
        dir: dir.to_path_buf(),
        ..Default::default()
    };

    match fs::metadata(dir) {
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            info!(dir = %dir.display(), "Staging directory does not exist, nothing to clean");
            return Ok(report);
        }
        Err(err) => return Err(err.into()),
    }

    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = entry.map_err(io::Error::from)?;
        let path = entry.path().to_path_buf();
        let metadata = entry.metadata().map_err(io::Error::from)?;

        let is_staging_file = metadata.is_file()
            && path.extension().and_then(|ext| ext.to_str()) == Some(STAGING_FILE_EXTENSION);
        if !is_staging_file {
            continue;
        }
        report.scanned += 1;

        let age = now
            .duration_since(metadata.modified()?)
            .unwrap_or(Duration::ZERO);
        if age <= max_age {
            continue;
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), age_secs = age.as_secs(), "Deleted stale file");
                report.deleted.push(path);
            }
            // Another cleanup got there first.
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Failed to delete stale file");
                report.failed.push(path);
            }
        }
    }

    info!(
        dir = %dir.display(),
        scanned = report.scanned,
        deleted = report.deleted.len(),
        failed = report.failed.len(),
        "Stale file cleanup finished"
    );
    Ok(report)
}
