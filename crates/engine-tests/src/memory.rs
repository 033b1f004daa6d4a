//! In-memory stand-ins for the source databases and the warehouse.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use connectors::sql::base::{
    error::DbError,
    requests::IncrementRequest,
    store::{RewriteFn, RewriteOutcome, SourceStore, TargetStore},
};
use engine_processing::error::StageError;
use engine_runtime::execution::factory::SourceConnector;
use model::{
    core::identifiers::TableRef,
    execution::pipeline::{ColumnDef, SourceConfig},
    records::{batch::RecordBatch, row::RowData},
};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    io,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

/// A source database holding whole tables in memory.
#[derive(Default)]
pub struct MemorySource {
    tables: Mutex<HashMap<String, RecordBatch>>,
    requests: Mutex<Vec<IncrementRequest>>,
    failures_left: AtomicUsize,
    always_fail: bool,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source whose every query fails with a retryable I/O error.
    pub fn unreachable() -> Self {
        Self {
            always_fail: true,
            ..Self::default()
        }
    }

    pub fn with_table(self, batch: RecordBatch) -> Self {
        self.insert(batch);
        self
    }

    pub fn insert(&self, batch: RecordBatch) {
        self.tables
            .lock()
            .unwrap()
            .insert(batch.entity.clone(), batch);
    }

    /// The next `count` queries fail with a retryable I/O error.
    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<IncrementRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceStore for MemorySource {
    async fn fetch_increment(&self, request: &IncrementRequest) -> Result<RecordBatch, DbError> {
        self.requests.lock().unwrap().push(request.clone());

        if self.always_fail
            || self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return Err(DbError::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "source connection reset",
            )));
        }

        let tables = self.tables.lock().unwrap();
        let table = tables
            .get(&request.table)
            .ok_or_else(|| DbError::UndefinedTable(request.table.clone()))?;

        let rows = table
            .rows
            .iter()
            .filter(|row| match request.since {
                None => true,
                Some(since) => row
                    .get_value(&request.increment_col)
                    .as_naive_timestamp()
                    .is_some_and(|ts| ts > since),
            })
            .cloned()
            .collect();

        Ok(RecordBatch::new(&table.entity, table.columns.clone(), rows))
    }
}

/// Hands out the registered [`MemorySource`] for each source id.
#[derive(Default)]
pub struct MemoryConnector {
    sources: HashMap<String, Arc<MemorySource>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, id: &str, source: Arc<MemorySource>) -> Self {
        self.sources.insert(id.to_string(), source);
        self
    }
}

#[async_trait]
impl SourceConnector for MemoryConnector {
    async fn connect(&self, source: &SourceConfig) -> Result<Arc<dyn SourceStore>, StageError> {
        let store = self.sources.get(&source.id).cloned().ok_or_else(|| {
            DbError::Unknown(format!("no in-memory source registered for {}", source.id))
        })?;
        Ok(store)
    }
}

/// A warehouse keeping every table as a [`RecordBatch`].
///
/// All operations on a table happen under one lock, so `rewrite` is atomic
/// with respect to concurrent appends.
#[derive(Default)]
pub struct MemoryTarget {
    schemas: Mutex<BTreeSet<String>>,
    tables: Mutex<BTreeMap<TableRef, RecordBatch>>,
    appends: AtomicUsize,
    watermark_reads: AtomicUsize,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table and fills it, bypassing the loader.
    pub fn seed(&self, table: TableRef, batch: RecordBatch) {
        self.schemas.lock().unwrap().insert(table.schema.clone());
        self.tables.lock().unwrap().insert(table, batch);
    }

    pub fn rows(&self, schema: &str, table: &str) -> Vec<RowData> {
        self.tables
            .lock()
            .unwrap()
            .get(&TableRef::new(schema, table))
            .map(|batch| batch.rows.clone())
            .unwrap_or_default()
    }

    pub fn has_schema(&self, schema: &str) -> bool {
        self.schemas.lock().unwrap().contains(schema)
    }

    pub fn has_table(&self, schema: &str, table: &str) -> bool {
        self.tables
            .lock()
            .unwrap()
            .contains_key(&TableRef::new(schema, table))
    }

    pub fn columns(&self, schema: &str, table: &str) -> Vec<String> {
        self.tables
            .lock()
            .unwrap()
            .get(&TableRef::new(schema, table))
            .map(|batch| batch.columns.clone())
            .unwrap_or_default()
    }

    pub fn append_calls(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }

    pub fn watermark_reads(&self) -> usize {
        self.watermark_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TargetStore for MemoryTarget {
    async fn ensure_schema(&self, schema: &str) -> Result<(), DbError> {
        self.schemas.lock().unwrap().insert(schema.to_string());
        Ok(())
    }

    async fn ensure_table(&self, table: &TableRef, columns: &[ColumnDef]) -> Result<(), DbError> {
        if !self.has_schema(&table.schema) {
            return Err(DbError::Unknown(format!("schema {} does not exist", table.schema)));
        }
        self.tables
            .lock()
            .unwrap()
            .entry(table.clone())
            .or_insert_with(|| {
                RecordBatch::empty(&table.name, columns.iter().map(|c| c.name.clone()).collect())
            });
        Ok(())
    }

    async fn max_timestamp(
        &self,
        table: &TableRef,
        column: &str,
    ) -> Result<Option<NaiveDateTime>, DbError> {
        self.watermark_reads.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.lock().unwrap();
        let batch = tables
            .get(table)
            .ok_or_else(|| DbError::UndefinedTable(table.to_string()))?;

        Ok(batch
            .rows
            .iter()
            .filter_map(|row| row.get_value(column).as_naive_timestamp())
            .max())
    }

    async fn append_rows(
        &self,
        table: &TableRef,
        columns: &[String],
        rows: &[RowData],
    ) -> Result<u64, DbError> {
        self.appends.fetch_add(1, Ordering::SeqCst);
        let mut tables = self.tables.lock().unwrap();
        let batch = tables
            .get_mut(table)
            .ok_or_else(|| DbError::UndefinedTable(table.to_string()))?;

        if let Some(unknown) = columns
            .iter()
            .find(|c| !batch.columns.iter().any(|known| known.eq_ignore_ascii_case(c)))
        {
            return Err(DbError::Write(format!(
                "column {unknown} does not exist in {table}"
            )));
        }

        batch.rows.extend_from_slice(rows);
        Ok(rows.len() as u64)
    }

    async fn read_all(&self, table: &TableRef) -> Result<RecordBatch, DbError> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .ok_or_else(|| DbError::UndefinedTable(table.to_string()))
    }

    async fn rewrite(
        &self,
        table: &TableRef,
        rewrite: &RewriteFn,
    ) -> Result<RewriteOutcome, DbError> {
        let mut tables = self.tables.lock().unwrap();
        let current = tables
            .remove(table)
            .ok_or_else(|| DbError::UndefinedTable(table.to_string()))?;
        let before = current.len();

        let rewritten = rewrite(current);
        let after = rewritten.len();
        tables.insert(table.clone(), rewritten);

        Ok(RewriteOutcome { before, after })
    }
}
