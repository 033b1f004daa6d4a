use chrono::SecondsFormat;
use model::core::{
    utils::escape_csv_string,
    value::{TIMESTAMP_FORMAT, Value},
};
use model::records::row::RowData;

/// Encodes values as fields of `COPY … (FORMAT csv, NULL '\N')` input.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgCopyValueEncoder;

impl PgCopyValueEncoder {
    pub fn new() -> Self {
        Self
    }

    pub fn encode_value(&self, value: &Value) -> String {
        match value {
            Value::Null => self.encode_null(),
            Value::String(s) => escape_csv_string(s),
            Value::Json(v) => escape_csv_string(&v.to_string()),
            Value::Boolean(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::Float(v) => ryu::Buffer::new().format(*v).to_string(),
            Value::Decimal(v) => v.to_string(),
            Value::Uuid(v) => v.to_string(),
            Value::Date(d) => d.to_string(),
            Value::Timestamp(ts) => ts.to_rfc3339_opts(SecondsFormat::Micros, true),
            Value::TimestampNaive(ts) => ts.format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    pub fn encode_null(&self) -> String {
        "\\N".to_string()
    }

    /// One newline-terminated COPY line holding the first `width` fields of `row`.
    /// Missing trailing fields are sent as NULL.
    pub fn encode_row(&self, row: &RowData, width: usize) -> String {
        let mut line = String::new();
        for idx in 0..width {
            if idx > 0 {
                line.push(',');
            }
            match row.field_values.get(idx) {
                Some(field) => line.push_str(&self.encode_value(&field.value)),
                None => line.push_str(&self.encode_null()),
            }
        }
        line.push('\n');
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use model::core::value::FieldValue;

    #[test]
    fn test_encode_scalars() {
        let encoder = PgCopyValueEncoder::new();
        assert_eq!(encoder.encode_value(&Value::Null), "\\N");
        assert_eq!(encoder.encode_value(&Value::Int(-4)), "-4");
        assert_eq!(encoder.encode_value(&Value::Float(1.5)), "1.5");
        assert_eq!(
            encoder.encode_value(&Value::String("a,\"b\"".into())),
            "\"a,\"\"b\"\"\""
        );
    }

    #[test]
    fn test_encode_naive_timestamp() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 19)
            .unwrap()
            .and_hms_opt(12, 0, 1)
            .unwrap();
        assert_eq!(
            PgCopyValueEncoder::new().encode_value(&Value::TimestampNaive(ts)),
            "2024-01-19 12:00:01"
        );
    }

    #[test]
    fn test_encode_row_pads_missing_fields_with_null() {
        let row = RowData::new(
            "orders",
            vec![
                FieldValue::new("id", Value::Int(7)),
                FieldValue::new("name", Value::String("x".into())),
            ],
        );
        assert_eq!(PgCopyValueEncoder::new().encode_row(&row, 3), "7,\"x\",\\N\n");
    }
}
