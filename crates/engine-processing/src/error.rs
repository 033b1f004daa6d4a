use connectors::{
    file::csv::error::FileError,
    sql::base::error::{ConnectorError, DbError},
};
use model::execution::check::CheckCode;
use thiserror::Error;

/// Failure of a single pipeline stage.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("Connection error: {0}")]
    Connector(#[from] ConnectorError),

    #[error("Staging file error: {0}")]
    File(#[from] FileError),

    #[error("No check function registered for code '{0}'")]
    UnregisteredCheck(CheckCode),

    #[error("Table '{table}' has no column '{column}'")]
    MissingColumn { table: String, column: String },

    #[error("No watermark was read for table '{0}' this run")]
    MissingWatermark(String),
}
