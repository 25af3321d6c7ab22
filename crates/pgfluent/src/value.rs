//! Runtime scalar values for statement parameters.
//!
//! [`Value`] is the parameter currency of every builder: field and predicate
//! methods bind `impl Into<Value>`, and the save reconciler reads probe
//! results back as `Value`s so new field values can be compared against the
//! current row.

use chrono::{DateTime, Utc};
use tokio_postgres::types::{IsNull, ToSql, Type};
use uuid::Uuid;

/// A runtime SQL scalar.
///
/// Equality is NULL-aware and numeric-width-tolerant: `Null` compares equal
/// only to `Null`, and integers (or floats) of different widths compare by
/// value. A probe snapshot read from an INTEGER column therefore matches the
/// same number supplied as an `i64`, which is exactly the comparison the
/// save reconciler needs when deciding whether an update would change a row.
#[derive(Debug, Clone)]
pub enum Value {
    /// NULL
    Null,
    /// BOOLEAN
    Bool(bool),
    /// SMALLINT
    I16(i16),
    /// INTEGER
    I32(i32),
    /// BIGINT
    I64(i64),
    /// REAL
    F32(f32),
    /// DOUBLE PRECISION
    F64(f64),
    /// TEXT, VARCHAR, etc.
    Text(String),
    /// BYTEA
    Bytes(Vec<u8>),
    /// TIMESTAMPTZ
    Timestamp(DateTime<Utc>),
    /// UUID
    Uuid(Uuid),
    /// JSON / JSONB
    Json(serde_json::Value),
}

impl Value {
    /// Returns true if this is a NULL value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The contained integer widened to BIGINT, if this holds an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            Value::I32(v) => Some(i64::from(*v)),
            Value::I16(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// The contained float widened to DOUBLE PRECISION, if this holds a float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            Value::F32(v) => Some(f64::from(*v)),
            _ => None,
        }
    }

    /// The contained text, if that is what this value holds.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    /// The contained UUID, if that is what this value holds.
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Value::Uuid(v) => Some(*v),
            _ => None,
        }
    }

    /// The contained timestamp, if that is what this value holds.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(v) => Some(*v),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (
                Value::I16(_) | Value::I32(_) | Value::I64(_),
                Value::I16(_) | Value::I32(_) | Value::I64(_),
            ) => self.as_i64() == other.as_i64(),
            (Value::F32(_) | Value::F64(_), Value::F32(_) | Value::F64(_)) => {
                self.as_f64() == other.as_f64()
            }
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Uuid(a), Value::Uuid(b)) => a == b,
            (Value::Json(a), Value::Json(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::I16(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl ToSql for Value {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut bytes::BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql(ty, out),
            Value::I16(v) => v.to_sql(ty, out),
            Value::I32(v) => v.to_sql(ty, out),
            Value::I64(v) => v.to_sql(ty, out),
            Value::F32(v) => v.to_sql(ty, out),
            Value::F64(v) => v.to_sql(ty, out),
            Value::Text(v) => v.to_sql(ty, out),
            Value::Bytes(v) => v.to_sql(ty, out),
            Value::Timestamp(v) => v.to_sql(ty, out),
            Value::Uuid(v) => v.to_sql(ty, out),
            Value::Json(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::BOOL
                | Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::TEXT
                | Type::VARCHAR
                | Type::BPCHAR
                | Type::BYTEA
                | Type::TIMESTAMPTZ
                | Type::UUID
                | Type::JSON
                | Type::JSONB
        )
    }

    tokio_postgres::types::to_sql_checked!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_equals_null() {
        assert_eq!(Value::Null, Value::Null);
        assert_ne!(Value::Null, Value::Text("x".into()));
    }

    #[test]
    fn option_none_becomes_null() {
        let v: Value = Option::<i64>::None.into();
        assert!(v.is_null());
        let v: Value = Some(42i64).into();
        assert_eq!(v, Value::I64(42));
    }

    #[test]
    fn integer_widths_compare_by_value() {
        assert_eq!(Value::I32(1), Value::I64(1));
        assert_eq!(Value::I16(1), Value::I32(1));
        assert_ne!(Value::I32(1), Value::I64(2));
        assert_ne!(Value::I64(1), Value::F64(1.0));
    }

    #[test]
    fn float_widths_compare_by_value() {
        assert_eq!(Value::F32(1.5), Value::F64(1.5));
        assert_ne!(Value::F32(1.5), Value::F64(1.25));
    }

    #[test]
    fn text_accessor() {
        assert_eq!(Value::Text("abc".into()).as_str(), Some("abc"));
        assert_eq!(Value::I64(1).as_str(), None);
    }
}
