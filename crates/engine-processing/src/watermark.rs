use crate::error::StageError;
use chrono::{NaiveDateTime, TimeDelta};
use connectors::sql::base::store::TargetStore;
use model::{core::identifiers::TableRef, execution::pipeline::TableConfig};
use std::{collections::HashMap, fmt, sync::Arc};
use tracing::info;

/// Highest increment value already loaded for a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Watermark {
    /// Nothing has been loaded yet.
    Empty,
    At(NaiveDateTime),
}

impl Watermark {
    /// Exclusive lower bound for the next extract, `overlap` before the
    /// watermark. `None` means the whole table.
    pub fn lower_bound(&self, overlap: TimeDelta) -> Option<NaiveDateTime> {
        match self {
            Watermark::Empty => None,
            Watermark::At(ts) => Some(*ts - overlap),
        }
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Watermark::Empty => f.write_str("empty"),
            Watermark::At(ts) => write!(f, "{ts}"),
        }
    }
}

/// Derives watermarks from the target, reading `max(increment_col)` of
/// `{schema}.{table}`.
#[derive(Clone)]
pub struct WatermarkTracker {
    target: Arc<dyn TargetStore>,
    schema: String,
}

impl WatermarkTracker {
    pub fn new(target: Arc<dyn TargetStore>, schema: &str) -> Self {
        Self {
            target,
            schema: schema.to_string(),
        }
    }

    pub async fn current(&self, table: &TableConfig) -> Result<Watermark, StageError> {
        let table_ref = TableRef::new(&self.schema, &table.name);

        match self
            .target
            .max_timestamp(&table_ref, &table.increment_col)
            .await
        {
            Ok(Some(ts)) => Ok(Watermark::At(ts)),
            Ok(None) => {
                info!(table = %table_ref, "Target table is empty, first load");
                Ok(Watermark::Empty)
            }
            Err(err) if err.is_undefined_table() => {
                info!(table = %table_ref, "Target table does not exist yet, first load");
                Ok(Watermark::Empty)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn snapshot<'a, I>(&self, tables: I) -> Result<WatermarkSnapshot, StageError>
    where
        I: IntoIterator<Item = &'a TableConfig>,
    {
        let mut marks = HashMap::new();
        for table in tables {
            marks.insert(table.name.clone(), self.current(table).await?);
        }
        Ok(WatermarkSnapshot { marks })
    }
}

/// Watermarks of every table, read once per run before any unit loads.
/// Sibling units of a table share one lower bound, so rows a faster
/// source loads cannot move the bound of a slower one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatermarkSnapshot {
    marks: HashMap<String, Watermark>,
}

impl WatermarkSnapshot {
    pub fn get(&self, table: &str) -> Option<Watermark> {
        self.marks.get(table).copied()
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }
}

impl FromIterator<(String, Watermark)> for WatermarkSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, Watermark)>>(iter: I) -> Self {
        Self {
            marks: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_lower_bound_subtracts_overlap() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 19)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let overlap = TimeDelta::seconds(330);

        assert_eq!(Watermark::Empty.lower_bound(overlap), None);
        assert_eq!(
            Watermark::At(ts).lower_bound(overlap),
            NaiveDate::from_ymd_opt(2024, 1, 19).unwrap().and_hms_opt(11, 54, 30)
        );
    }

    #[test]
    fn test_snapshot_lookup_by_table() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 19)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let snapshot: WatermarkSnapshot = [
            ("orders".to_string(), Watermark::At(ts)),
            ("clients".to_string(), Watermark::Empty),
        ]
        .into_iter()
        .collect();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("orders"), Some(Watermark::At(ts)));
        assert_eq!(snapshot.get("clients"), Some(Watermark::Empty));
        assert_eq!(snapshot.get("payments"), None);
    }
}
