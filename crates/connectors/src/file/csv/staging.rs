use crate::file::csv::error::FileError;
use model::{
    core::value::{FieldValue, Value},
    records::{batch::RecordBatch, handle::StageHandle, row::RowData},
};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

pub const DELIMITER: u8 = b';';
/// Cell text standing for SQL NULL, as in Postgres `COPY`.
pub const NULL_SENTINEL: &str = "\\N";
const PARTIAL_SUFFIX: &str = "part";

/// Directory holding the `;`-delimited files passed between pipeline stages.
///
/// Files are written under a `.part` name and renamed once complete, so a
/// reader never observes a half-written batch.
#[derive(Debug, Clone)]
pub struct CsvStagingArea {
    dir: PathBuf,
}

impl CsvStagingArea {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        CsvStagingArea { dir: dir.into() }
    }

    pub fn path(&self, handle: &StageHandle) -> PathBuf {
        handle.path_in(&self.dir)
    }

    pub fn write(&self, handle: &StageHandle, batch: &RecordBatch) -> Result<PathBuf, FileError> {
        fs::create_dir_all(&self.dir)?;

        let path = self.path(handle);
        let partial = path.with_extension(format!(
            "{}.{PARTIAL_SUFFIX}",
            model::records::handle::STAGING_FILE_EXTENSION
        ));

        if let Err(err) = write_batch(&partial, batch) {
            let _ = fs::remove_file(&partial);
            return Err(err);
        }
        fs::rename(&partial, &path)?;

        debug!(path = %path.display(), rows = batch.len(), "Staging file written");
        Ok(path)
    }

    pub fn read(&self, handle: &StageHandle) -> Result<RecordBatch, FileError> {
        let path = self.path(handle);
        if !path.exists() {
            return Err(FileError::NotFound(path));
        }
        read_batch(&path, &handle.table)
    }
}

fn write_batch(path: &Path, batch: &RecordBatch) -> Result<(), FileError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .from_path(path)
        .map_err(|e| FileError::from_csv(path, e))?;

    writer
        .write_record(&batch.columns)
        .map_err(|e| FileError::from_csv(path, e))?;

    for row in &batch.rows {
        let cells = (0..batch.columns.len()).map(|idx| {
            row.field_values
                .get(idx)
                .map(|field| {
                    field
                        .value
                        .to_text()
                        .unwrap_or_else(|| NULL_SENTINEL.to_string())
                })
                .unwrap_or_else(|| NULL_SENTINEL.to_string())
        });
        writer
            .write_record(cells)
            .map_err(|e| FileError::from_csv(path, e))?;
    }

    writer.flush()?;
    Ok(())
}

fn read_batch(path: &Path, entity: &str) -> Result<RecordBatch, FileError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| FileError::from_csv(path, e))?;

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| FileError::from_csv(path, e))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| FileError::from_csv(path, e))?;
        if record.len() != columns.len() {
            return Err(FileError::RowWidth {
                path: path.to_path_buf(),
                row: idx + 1,
                expected: columns.len(),
                found: record.len(),
            });
        }

        let fields = columns
            .iter()
            .zip(record.iter())
            .map(|(name, cell)| {
                let value = if cell == NULL_SENTINEL {
                    Value::Null
                } else {
                    Value::String(cell.to_string())
                };
                FieldValue::new(name.clone(), value)
            })
            .collect();
        rows.push(RowData::new(entity, fields));
    }

    Ok(RecordBatch::new(entity, columns, rows))
}
