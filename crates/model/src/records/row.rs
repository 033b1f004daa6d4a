use crate::core::value::{FieldValue, Value};
use serde::{Deserialize, Serialize};

/// A single record: an ordered set of named fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RowData {
    pub entity: String,
    pub field_values: Vec<FieldValue>,
}

impl RowData {
    pub fn new(entity: &str, field_values: Vec<FieldValue>) -> Self {
        RowData {
            entity: entity.to_string(),
            field_values,
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.field_values
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(field))
    }

    pub fn get_value(&self, field: &str) -> Value {
        self.get(field)
            .map(|f| f.value.clone())
            .unwrap_or(Value::Null)
    }

    /// Appends a field at the end of the record.
    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.field_values.push(FieldValue::new(name, value));
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.field_values.iter().map(|f| &f.value)
    }

    pub fn len(&self) -> usize {
        self.field_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.field_values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_is_case_insensitive() {
        let row = RowData::new(
            "orders",
            vec![FieldValue::new("Amount", Value::Int(10))],
        );
        assert_eq!(row.get_value("amount"), Value::Int(10));
        assert_eq!(row.get_value("missing"), Value::Null);
    }

    #[test]
    fn test_push_appends_in_order() {
        let mut row = RowData::new("orders", vec![FieldValue::new("id", Value::Int(1))]);
        row.push("src_id", Value::String("moscow".into()));
        let names: Vec<_> = row.field_values.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "src_id"]);
        assert_eq!(row.len(), 2);
    }
}
