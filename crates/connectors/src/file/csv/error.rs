use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV parsing error in {path}: {source}")]
    CsvError {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("File {path} is not valid UTF-8 (record {record})")]
    Encoding { path: PathBuf, record: u64 },
    #[error("Row {row} of {path} has {found} fields, header has {expected}")]
    RowWidth {
        path: PathBuf,
        row: usize,
        expected: usize,
        found: usize,
    },
}

impl FileError {
    pub(crate) fn from_csv(path: &std::path::Path, err: csv::Error) -> Self {
        match err.kind() {
            csv::ErrorKind::Utf8 { pos, .. } => FileError::Encoding {
                path: path.to_path_buf(),
                record: pos.as_ref().map(|p| p.record()).unwrap_or_default(),
            },
            _ => FileError::CsvError {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }
}
