use crate::error::StageError;
use connectors::{
    file::csv::error::FileError,
    sql::base::error::{ConnectorError, DbError},
};
use engine_core::retry::RetryDisposition;
use tokio_postgres::{Error as PgError, error::SqlState};

/// Decides whether a failed stage is worth another attempt.
///
/// Staging files are only ever produced by an earlier stage of the same
/// unit, so a malformed file is not retried: reading it again gives the
/// same bytes.
pub fn classify_stage_error(err: &StageError) -> RetryDisposition {
    match err {
        StageError::Db(db_err) => classify_db_error(db_err),
        StageError::Connector(conn_err) => classify_connector_error(conn_err),
        StageError::File(file_err) => classify_file_error(file_err),
        StageError::UnregisteredCheck(_) => RetryDisposition::Stop,
        StageError::MissingColumn { .. } => RetryDisposition::Stop,
        StageError::MissingWatermark(_) => RetryDisposition::Stop,
    }
}

pub fn classify_db_error(err: &DbError) -> RetryDisposition {
    match err {
        DbError::Io(_) => RetryDisposition::Retry,
        DbError::PgError(pg_err) => classify_pg_error(pg_err),
        DbError::UndefinedTable(_) => RetryDisposition::Stop,
        DbError::Decode { .. } => RetryDisposition::Stop,
        DbError::Write(_) => RetryDisposition::Stop,
        DbError::Unknown(_) => RetryDisposition::Stop,
    }
}

pub fn classify_connector_error(err: &ConnectorError) -> RetryDisposition {
    match err {
        ConnectorError::Connection(pg_err) => {
            // A refused or dropped connection carries no SQLSTATE.
            if pg_err.code().is_none() {
                RetryDisposition::Retry
            } else {
                classify_pg_error(pg_err)
            }
        }
        ConnectorError::InvalidUrl(_) => RetryDisposition::Stop,
        ConnectorError::TlsConfig(_) => RetryDisposition::Stop,
    }
}

fn classify_file_error(err: &FileError) -> RetryDisposition {
    match err {
        FileError::IoError(_) => RetryDisposition::Retry,
        FileError::NotFound(_)
        | FileError::CsvError { .. }
        | FileError::Encoding { .. }
        | FileError::RowWidth { .. } => RetryDisposition::Stop,
    }
}

fn classify_pg_error(err: &PgError) -> RetryDisposition {
    if err.is_closed() {
        return RetryDisposition::Retry;
    }

    if let Some(code) = err.code()
        && is_retryable_pg_code(code)
    {
        return RetryDisposition::Retry;
    }

    RetryDisposition::Stop
}

fn is_retryable_pg_code(code: &SqlState) -> bool {
    matches!(
        *code,
        SqlState::T_R_SERIALIZATION_FAILURE
            | SqlState::T_R_DEADLOCK_DETECTED
            | SqlState::LOCK_NOT_AVAILABLE
            | SqlState::TOO_MANY_CONNECTIONS
            | SqlState::ADMIN_SHUTDOWN
            | SqlState::CRASH_SHUTDOWN
            | SqlState::CANNOT_CONNECT_NOW
            | SqlState::CONNECTION_FAILURE
            | SqlState::CONNECTION_DOES_NOT_EXIST
            | SqlState::SQLCLIENT_UNABLE_TO_ESTABLISH_SQLCONNECTION
            | SqlState::SQLSERVER_REJECTED_ESTABLISHMENT_OF_SQLCONNECTION
            | SqlState::CONNECTION_EXCEPTION
            | SqlState::QUERY_CANCELED
            | SqlState::OPERATOR_INTERVENTION
    )
}
