use crate::sql::base::{error::DbError, requests::IncrementRequest};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use model::{
    core::identifiers::TableRef,
    execution::pipeline::ColumnDef,
    records::{batch::RecordBatch, row::RowData},
};

/// Read-only access to a source database.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Selects every row of `request.table` whose increment column is
    /// strictly greater than `request.since`, or all rows when unbounded.
    async fn fetch_increment(&self, request: &IncrementRequest) -> Result<RecordBatch, DbError>;
}

/// Callback applied to the full contents of a table during [`TargetStore::rewrite`].
pub type RewriteFn = dyn Fn(RecordBatch) -> RecordBatch + Send + Sync;

/// Row counts before and after a table rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriteOutcome {
    pub before: usize,
    pub after: usize,
}

/// The warehouse the pipeline loads into.
#[async_trait]
pub trait TargetStore: Send + Sync {
    async fn ensure_schema(&self, schema: &str) -> Result<(), DbError>;

    async fn ensure_table(&self, table: &TableRef, columns: &[ColumnDef]) -> Result<(), DbError>;

    /// Largest value of `column`, or `None` for an empty table.
    /// A missing table is reported as [`DbError::UndefinedTable`].
    async fn max_timestamp(
        &self,
        table: &TableRef,
        column: &str,
    ) -> Result<Option<NaiveDateTime>, DbError>;

    /// Unconditionally appends `rows`; returns the number of rows written.
    async fn append_rows(
        &self,
        table: &TableRef,
        columns: &[String],
        rows: &[RowData],
    ) -> Result<u64, DbError>;

    async fn read_all(&self, table: &TableRef) -> Result<RecordBatch, DbError>;

    /// Replaces the contents of `table` with `rewrite(current contents)`.
    /// Concurrent appends to the same table wait until the rewrite commits.
    async fn rewrite(&self, table: &TableRef, rewrite: &RewriteFn)
    -> Result<RewriteOutcome, DbError>;
}
