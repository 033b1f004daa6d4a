use crate::sql::base::requests::IncrementRequest;
use model::{
    core::{identifiers::TableRef, utils::quote_ident},
    execution::pipeline::ColumnDef,
};

/// Renders the Postgres statements the pipeline issues.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryGenerator;

impl QueryGenerator {
    pub fn new() -> Self {
        QueryGenerator
    }

    pub fn create_schema(&self, schema: &str) -> String {
        format!("CREATE SCHEMA IF NOT EXISTS {};", quote_ident(schema))
    }

    pub fn create_table(&self, table: &TableRef, columns: &[ColumnDef]) -> String {
        let defs = columns
            .iter()
            .map(|col| format!("{} {}", quote_ident(&col.name), col.sql_type))
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE IF NOT EXISTS {} ({defs});", table.quoted())
    }

    /// Incremental select; when bounded, `$1` carries the lower bound.
    pub fn select_increment(&self, request: &IncrementRequest) -> String {
        let table = quote_ident(&request.table);
        match request.since {
            None => format!("SELECT * FROM {table}"),
            Some(_) => format!(
                "SELECT * FROM {table} WHERE {} > $1::timestamp",
                quote_ident(&request.increment_col)
            ),
        }
    }

    pub fn select_all(&self, table: &TableRef) -> String {
        format!("SELECT * FROM {}", table.quoted())
    }

    /// Wraps `query` so that every column flagged `true` comes back as
    /// `text`, keeping its name and position.
    pub fn select_as_text(&self, query: &str, columns: &[(&str, bool)]) -> String {
        let projection = columns
            .iter()
            .map(|(name, as_text)| {
                let ident = quote_ident(name);
                if *as_text {
                    format!("{ident}::text AS {ident}")
                } else {
                    ident
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("SELECT {projection} FROM ({query}) AS src")
    }

    pub fn max_timestamp(&self, table: &TableRef, column: &str) -> String {
        format!(
            "SELECT max({})::timestamp FROM {}",
            quote_ident(column),
            table.quoted()
        )
    }

    pub fn copy_from_stdin(&self, table: &TableRef, columns: &[String]) -> String {
        let column_names = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "COPY {} ({column_names}) FROM STDIN WITH (FORMAT csv, NULL '\\N')",
            table.quoted()
        )
    }

    pub fn lock_exclusive(&self, table: &TableRef) -> String {
        format!("LOCK TABLE {} IN EXCLUSIVE MODE", table.quoted())
    }

    pub fn truncate(&self, table: &TableRef) -> String {
        format!("TRUNCATE TABLE {}", table.quoted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_create_table() {
        let sql = QueryGenerator::new().create_table(
            &TableRef::new("stg", "orders"),
            &[
                ColumnDef::new("id", "integer"),
                ColumnDef::new("updated_at", "timestamp"),
            ],
        );
        assert_eq!(
            sql,
            r#"CREATE TABLE IF NOT EXISTS "stg"."orders" ("id" integer, "updated_at" timestamp);"#
        );
    }

    #[test]
    fn test_select_increment_full_and_bounded() {
        let generator = QueryGenerator::new();
        assert_eq!(
            generator.select_increment(&IncrementRequest::full("orders", "updated_at")),
            r#"SELECT * FROM "orders""#
        );

        let since = NaiveDate::from_ymd_opt(2024, 1, 19)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(
            generator.select_increment(&IncrementRequest::since("orders", "updated_at", since)),
            r#"SELECT * FROM "orders" WHERE "updated_at" > $1::timestamp"#
        );
    }

    #[test]
    fn test_select_as_text_keeps_column_order() {
        let generator = QueryGenerator::new();
        let base = generator.select_all(&TableRef::new("stg", "shifts"));
        assert_eq!(
            generator.select_as_text(&base, &[("id", false), ("opens_at", true), ("photo", true)]),
            r#"SELECT "id", "opens_at"::text AS "opens_at", "photo"::text AS "photo" FROM (SELECT * FROM "stg"."shifts") AS src"#
        );
    }

    #[test]
    fn test_copy_from_stdin() {
        let sql = QueryGenerator::new().copy_from_stdin(
            &TableRef::new("dlq", "orders"),
            &["id".to_string(), "reject_reasons".to_string()],
        );
        assert_eq!(
            sql,
            r#"COPY "dlq"."orders" ("id", "reject_reasons") FROM STDIN WITH (FORMAT csv, NULL '\N')"#
        );
    }

    #[test]
    fn test_max_timestamp() {
        assert_eq!(
            QueryGenerator::new().max_timestamp(&TableRef::new("stg", "orders"), "updated_at"),
            r#"SELECT max("updated_at")::timestamp FROM "stg"."orders""#
        );
    }
}
