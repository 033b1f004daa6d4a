use thiserror::Error;
use tokio_postgres::error::SqlState;

/// All errors coming from the database/query layer.
#[derive(Debug, Error)]
pub enum DbError {
    /// Low‐level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any Postgres driver error.
    #[error("Postgres error: {0}")]
    PgError(#[from] tokio_postgres::Error),

    /// The queried relation does not exist yet.
    #[error("Table {0} does not exist")]
    UndefinedTable(String),

    /// A column value could not be decoded into a `Value`.
    #[error("Cannot decode column '{column}' of type {type_name}")]
    Decode { column: String, type_name: String },

    /// Writing rows to the database failed at the application level.
    #[error("Write error: {0}")]
    Write(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl DbError {
    /// Maps a driver error, singling out a missing relation.
    pub fn from_pg(err: tokio_postgres::Error, table: &str) -> Self {
        if err.code() == Some(&SqlState::UNDEFINED_TABLE) {
            DbError::UndefinedTable(table.to_string())
        } else {
            DbError::PgError(err)
        }
    }

    pub fn is_undefined_table(&self) -> bool {
        matches!(self, DbError::UndefinedTable(_))
    }
}

/// Errors happening during adapter or connection setup.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Invalid connection URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to connect: {0}")]
    Connection(#[from] tokio_postgres::Error),

    #[error("TLS configuration error: {0}")]
    TlsConfig(#[from] native_tls::Error),
}
