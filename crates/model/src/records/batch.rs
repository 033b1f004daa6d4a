use crate::{core::value::Value, records::row::RowData};

/// A batch of rows sharing one header.
///
/// The header is carried separately so that an empty extract still produces a
/// staging file with a header line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordBatch {
    pub entity: String,
    pub columns: Vec<String>,
    pub rows: Vec<RowData>,
}

impl RecordBatch {
    pub fn new(entity: &str, columns: Vec<String>, rows: Vec<RowData>) -> Self {
        RecordBatch {
            entity: entity.to_string(),
            columns,
            rows,
        }
    }

    pub fn empty(entity: &str, columns: Vec<String>) -> Self {
        Self::new(entity, columns, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Adds a column carrying the same value on every row.
    pub fn push_constant(&mut self, name: &str, value: Value) {
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(name, value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::FieldValue;

    #[test]
    fn test_push_constant_extends_header_and_rows() {
        let rows = vec![
            RowData::new("t", vec![FieldValue::new("id", Value::Int(1))]),
            RowData::new("t", vec![FieldValue::new("id", Value::Int(2))]),
        ];
        let mut batch = RecordBatch::new("t", vec!["id".into()], rows);
        batch.push_constant("run_id", Value::String("r1".into()));

        assert_eq!(batch.columns, vec!["id", "run_id"]);
        assert!(
            batch
                .rows
                .iter()
                .all(|r| r.get_value("run_id") == Value::String("r1".into()))
        );
    }

    #[test]
    fn test_push_constant_on_empty_batch_keeps_header() {
        let mut batch = RecordBatch::empty("t", vec!["id".into()]);
        batch.push_constant("src_id", Value::String("kazan".into()));
        assert!(batch.is_empty());
        assert_eq!(batch.columns.len(), 2);
    }
}
