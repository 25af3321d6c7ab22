//! Row mapping traits and runtime value extraction.

use crate::error::{SqlError, SqlResult};
use crate::value::Value;
use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use tokio_postgres::types::Type;

/// Trait for converting a database row into a Rust struct.
///
/// # Example
///
/// ```ignore
/// struct Person {
///     id: i64,
///     name: String,
/// }
///
/// impl FromRow for Person {
///     fn from_row(row: &Row) -> SqlResult<Self> {
///         Ok(Person {
///             id: row.try_get_column("id")?,
///             name: row.try_get_column("name")?,
///         })
///     }
/// }
/// ```
pub trait FromRow: Sized {
    /// Convert a database row into Self
    fn from_row(row: &Row) -> SqlResult<Self>;
}

/// Extension trait for Row to provide typed access
pub trait RowExt {
    /// Try to get a column value, returning [`SqlError::Decode`] on failure
    fn try_get_column<T>(&self, column: &str) -> SqlResult<T>
    where
        T: for<'a> tokio_postgres::types::FromSql<'a>;
}

impl RowExt for Row {
    fn try_get_column<T>(&self, column: &str) -> SqlResult<T>
    where
        T: for<'a> tokio_postgres::types::FromSql<'a>,
    {
        self.try_get(column)
            .map_err(|e| SqlError::decode(column, e.to_string()))
    }
}

/// Extract the column at `idx` as a runtime [`Value`], dispatching on the
/// column's reported Postgres type. NULL becomes [`Value::Null`].
pub(crate) fn value_at(row: &Row, idx: usize) -> SqlResult<Value> {
    let column = &row.columns()[idx];
    let name = column.name();
    let ty = column.type_();

    fn get<'a, T>(row: &'a Row, idx: usize, name: &str) -> SqlResult<Option<T>>
    where
        T: tokio_postgres::types::FromSql<'a>,
    {
        row.try_get(idx).map_err(|e| SqlError::decode(name, e.to_string()))
    }

    let value = if *ty == Type::BOOL {
        get::<bool>(row, idx, name)?.map(Value::Bool)
    } else if *ty == Type::INT2 {
        get::<i16>(row, idx, name)?.map(Value::I16)
    } else if *ty == Type::INT4 {
        get::<i32>(row, idx, name)?.map(Value::I32)
    } else if *ty == Type::INT8 {
        get::<i64>(row, idx, name)?.map(Value::I64)
    } else if *ty == Type::FLOAT4 {
        get::<f32>(row, idx, name)?.map(Value::F32)
    } else if *ty == Type::FLOAT8 {
        get::<f64>(row, idx, name)?.map(Value::F64)
    } else if *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR {
        get::<String>(row, idx, name)?.map(Value::Text)
    } else if *ty == Type::BYTEA {
        get::<Vec<u8>>(row, idx, name)?.map(Value::Bytes)
    } else if *ty == Type::TIMESTAMPTZ {
        get::<DateTime<Utc>>(row, idx, name)?.map(Value::Timestamp)
    } else if *ty == Type::UUID {
        get::<uuid::Uuid>(row, idx, name)?.map(Value::Uuid)
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        get::<serde_json::Value>(row, idx, name)?.map(Value::Json)
    } else {
        return Err(SqlError::decode(
            name,
            format!("unsupported column type {ty}"),
        ));
    };

    Ok(value.unwrap_or(Value::Null))
}
