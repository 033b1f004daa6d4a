use crate::sql::base::error::DbError;
use core::fmt;
use model::{
    core::value::{FieldValue, Value},
    records::row::RowData,
};
use rust_decimal::Decimal;
use std::fmt::Formatter;
use tokio_postgres::{
    Row as PgRow,
    types::{FromSql, Json as PgJson, Type},
};
use tracing::warn;

/// Whether a column of type `ty` decodes to a typed `Value` without a cast.
pub fn is_decodable(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::INT2
            | Type::INT4
            | Type::INT8
            | Type::FLOAT4
            | Type::FLOAT8
            | Type::NUMERIC
            | Type::BOOL
            | Type::JSON
            | Type::JSONB
            | Type::UUID
            | Type::DATE
            | Type::TIMESTAMP
            | Type::TIMESTAMPTZ
    ) || <String as FromSql>::accepts(ty)
}

/// Borrowed driver row, converted into the engine's `RowData`.
pub struct DbRow<'a>(pub &'a PgRow);

impl DbRow<'_> {
    pub fn to_row_data(&self, table: &str) -> Result<RowData, DbError> {
        let fields = self
            .0
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                let value = self.get_value(idx, column.type_(), column.name())?;
                Ok(FieldValue::new(column.name(), value))
            })
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(RowData::new(table, fields))
    }

    fn get_value(&self, idx: usize, ty: &Type, name: &str) -> Result<Value, DbError> {
        let row = self.0;
        let decode_err = |_| DbError::Decode {
            column: name.to_string(),
            type_name: ty.name().to_string(),
        };

        let value = match *ty {
            Type::INT2 => row
                .try_get::<_, Option<i16>>(idx)
                .map_err(decode_err)?
                .map(|v| Value::Int(v as i64)),
            Type::INT4 => row
                .try_get::<_, Option<i32>>(idx)
                .map_err(decode_err)?
                .map(|v| Value::Int(v as i64)),
            Type::INT8 => row
                .try_get::<_, Option<i64>>(idx)
                .map_err(decode_err)?
                .map(Value::Int),
            Type::FLOAT4 => row
                .try_get::<_, Option<f32>>(idx)
                .map_err(decode_err)?
                .map(|v| Value::Float(v as f64)),
            Type::FLOAT8 => row
                .try_get::<_, Option<f64>>(idx)
                .map_err(decode_err)?
                .map(Value::Float),
            Type::NUMERIC => row
                .try_get::<_, Option<Decimal>>(idx)
                .map_err(decode_err)?
                .map(Value::Decimal),
            Type::BOOL => row
                .try_get::<_, Option<bool>>(idx)
                .map_err(decode_err)?
                .map(Value::Boolean),
            Type::JSON | Type::JSONB => row
                .try_get::<_, Option<PgJson<serde_json::Value>>>(idx)
                .map_err(decode_err)?
                .map(|json| Value::Json(json.0)),
            Type::UUID => row
                .try_get::<_, Option<uuid::Uuid>>(idx)
                .map_err(decode_err)?
                .map(Value::Uuid),
            Type::DATE => row
                .try_get::<_, Option<chrono::NaiveDate>>(idx)
                .map_err(decode_err)?
                .map(Value::Date),
            Type::TIMESTAMP => row
                .try_get::<_, Option<chrono::NaiveDateTime>>(idx)
                .map_err(decode_err)?
                .map(Value::TimestampNaive),
            Type::TIMESTAMPTZ => row
                .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)
                .map_err(decode_err)?
                .map(Value::Timestamp),
            Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => row
                .try_get::<_, Option<String>>(idx)
                .map_err(decode_err)?
                .map(Value::String),
            _ => {
                warn!(column = name, column_type = ty.name(), "Unsupported column type, reading as text");
                row.try_get::<_, Option<String>>(idx)
                    .map_err(decode_err)?
                    .map(Value::String)
            }
        };

        Ok(value.unwrap_or(Value::Null))
    }
}

impl fmt::Debug for DbRow<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}
