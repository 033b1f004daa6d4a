use crate::sql::{
    base::{
        error::{ConnectorError, DbError},
        query::generator::QueryGenerator,
        requests::IncrementRequest,
        row::{DbRow, is_decodable},
        store::{RewriteFn, RewriteOutcome, SourceStore, TargetStore},
    },
    postgres::{encoder::PgCopyValueEncoder, utils::connect_client},
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDateTime;
use futures_util::{SinkExt, pin_mut};
use model::{
    core::identifiers::TableRef,
    execution::pipeline::ColumnDef,
    records::{batch::RecordBatch, row::RowData},
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_postgres::{Client, CopyInSink, GenericClient, Row, Statement};
use tracing::{debug, warn};

/// Postgres connection used both as an extraction source and as the
/// warehouse target.
#[derive(Clone)]
pub struct PgAdapter {
    client: Arc<RwLock<Client>>,
    generator: QueryGenerator,
}

impl PgAdapter {
    pub async fn connect(url: &str) -> Result<Self, ConnectorError> {
        let client = Arc::new(RwLock::new(connect_client(url).await?));
        Ok(PgAdapter {
            client,
            generator: QueryGenerator::new(),
        })
    }

    /// Round-trips `SELECT 1`.
    pub async fn ping(&self) -> Result<(), DbError> {
        let client = self.client.read().await;
        let row = client.query_one("SELECT 1", &[]).await?;
        let val: i32 = row.get(0);
        if val != 1 {
            return Err(DbError::Unknown(format!(
                "Ping returned unexpected result: {val}"
            )));
        }
        Ok(())
    }

    /// Prepares `sql`; columns whose type has no typed decoding are
    /// re-selected as `text`.
    async fn prepare_readable<C: GenericClient + Sync>(
        &self,
        client: &C,
        sql: &str,
    ) -> Result<Statement, tokio_postgres::Error> {
        let statement = client.prepare(sql).await?;
        if statement.columns().iter().all(|c| is_decodable(c.type_())) {
            return Ok(statement);
        }

        let columns = statement
            .columns()
            .iter()
            .map(|c| (c.name(), !is_decodable(c.type_())))
            .collect::<Vec<_>>();
        for column in statement.columns().iter().filter(|c| !is_decodable(c.type_())) {
            warn!(
                column = column.name(),
                column_type = column.type_().name(),
                "Column type has no typed mapping, reading as text"
            );
        }
        let wrapped = self.generator.select_as_text(sql, &columns);
        client.prepare(&wrapped).await
    }

    async fn exec(&self, sql: &str) -> Result<(), DbError> {
        debug!(sql, "Executing statement");
        let client = self.client.read().await;
        client.batch_execute(sql).await?;
        Ok(())
    }
}

fn to_batch(entity: &str, statement: &Statement, rows: &[Row]) -> Result<RecordBatch, DbError> {
    let columns = statement
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    let rows = rows
        .iter()
        .map(|row| DbRow(row).to_row_data(entity))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RecordBatch::new(entity, columns, rows))
}

async fn send_rows(
    sink: CopyInSink<Bytes>,
    rows: &[RowData],
    width: usize,
) -> Result<u64, DbError> {
    let encoder = PgCopyValueEncoder::new();
    pin_mut!(sink);
    for row in rows {
        sink.as_mut()
            .send(Bytes::from(encoder.encode_row(row, width)))
            .await?;
    }
    let written = sink.as_mut().finish().await?;
    Ok(written)
}

#[async_trait]
impl SourceStore for PgAdapter {
    async fn fetch_increment(&self, request: &IncrementRequest) -> Result<RecordBatch, DbError> {
        let sql = self.generator.select_increment(request);
        debug!(sql, since = ?request.since, "Fetching increment");

        let client = self.client.read().await;
        let statement = self
            .prepare_readable(&*client, &sql)
            .await
            .map_err(|e| DbError::from_pg(e, &request.table))?;
        let rows = match &request.since {
            Some(since) => client.query(&statement, &[since]).await?,
            None => client.query(&statement, &[]).await?,
        };

        to_batch(&request.table, &statement, &rows)
    }
}

#[async_trait]
impl TargetStore for PgAdapter {
    async fn ensure_schema(&self, schema: &str) -> Result<(), DbError> {
        self.exec(&self.generator.create_schema(schema)).await
    }

    async fn ensure_table(&self, table: &TableRef, columns: &[ColumnDef]) -> Result<(), DbError> {
        self.exec(&self.generator.create_table(table, columns)).await
    }

    async fn max_timestamp(
        &self,
        table: &TableRef,
        column: &str,
    ) -> Result<Option<NaiveDateTime>, DbError> {
        let sql = self.generator.max_timestamp(table, column);
        let client = self.client.read().await;
        let row = client
            .query_one(&sql, &[])
            .await
            .map_err(|e| DbError::from_pg(e, &table.to_string()))?;
        Ok(row.try_get::<_, Option<NaiveDateTime>>(0)?)
    }

    async fn append_rows(
        &self,
        table: &TableRef,
        columns: &[String],
        rows: &[RowData],
    ) -> Result<u64, DbError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let statement = self.generator.copy_from_stdin(table, columns);
        debug!(statement, rows = rows.len(), "COPY append");

        // COPY takes over the connection until finished.
        let client = self.client.write().await;
        let sink: CopyInSink<Bytes> = client
            .copy_in(&statement)
            .await
            .map_err(|e| DbError::from_pg(e, &table.to_string()))?;
        send_rows(sink, rows, columns.len()).await
    }

    async fn read_all(&self, table: &TableRef) -> Result<RecordBatch, DbError> {
        let sql = self.generator.select_all(table);
        let client = self.client.read().await;
        let statement = self
            .prepare_readable(&*client, &sql)
            .await
            .map_err(|e| DbError::from_pg(e, &table.to_string()))?;
        let rows = client.query(&statement, &[]).await?;
        to_batch(&table.name, &statement, &rows)
    }

    async fn rewrite(
        &self,
        table: &TableRef,
        rewrite: &RewriteFn,
    ) -> Result<RewriteOutcome, DbError> {
        let mut client = self.client.write().await;
        let tx = client.transaction().await?;

        tx.batch_execute(&self.generator.lock_exclusive(table))
            .await
            .map_err(|e| DbError::from_pg(e, &table.to_string()))?;

        let statement = self
            .prepare_readable(&tx, &self.generator.select_all(table))
            .await?;
        let rows = tx.query(&statement, &[]).await?;
        let current = to_batch(&table.name, &statement, &rows)?;
        let before = current.len();

        let rewritten = rewrite(current);
        let after = rewritten.len();

        tx.batch_execute(&self.generator.truncate(table)).await?;
        if !rewritten.is_empty() {
            let copy = self.generator.copy_from_stdin(table, &rewritten.columns);
            let sink: CopyInSink<Bytes> = tx.copy_in(&copy).await?;
            send_rows(sink, &rewritten.rows, rewritten.columns.len()).await?;
        }
        tx.commit().await?;

        Ok(RewriteOutcome { before, after })
    }
}
