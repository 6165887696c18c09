//! Dynamically-typed values for bound parameters and decoded columns.
//!
//! [`Value`] is a closed set of kinds. Binding goes through `ToSql`, decoding
//! through `FromSql`; nothing in between converts one kind into another.

use crate::error::{OrmError, OrmResult};
use bytes::BytesMut;
use serde::Serialize;
use std::error::Error;
use std::fmt;
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type, to_sql_checked};
use uuid::Uuid;

type BoxError = Box<dyn Error + Sync + Send>;

/// A tagged dynamic value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL
    Null,
    /// text / varchar / bpchar / name
    Text(String),
    /// int2 / int4 / int8
    Int(i64),
    /// float4 / float8
    Real(f64),
    /// boolean
    Bool(bool),
    /// uuid
    Uuid(Uuid),
}

impl Value {
    /// Short kind name, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Text(_) => "text",
            Value::Int(_) => "integer",
            Value::Real(_) => "real",
            Value::Bool(_) => "boolean",
            Value::Uuid(_) => "uuid",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Value::Uuid(u) => Some(*u),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Text(s) => write!(f, "'{s}'"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Uuid(u) => write!(f, "{u}"),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Int(v.into())
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Real(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Build a `Vec<Value>` from heterogeneous expressions.
///
/// ```ignore
/// let values = pgdal::values!["alice", 42, true];
/// ```
#[macro_export]
macro_rules! values {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($v:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::from($v)),+]
    };
}

/// Conversion out of a [`Value`] for typed row access.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> OrmResult<Self>;
}

fn mismatch(expected: &str, got: &Value) -> OrmError {
    OrmError::decode("<value>", format!("expected {expected}, got {}", got.kind()))
}

impl FromValue for Value {
    fn from_value(value: &Value) -> OrmResult<Self> {
        Ok(value.clone())
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> OrmResult<Self> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| mismatch("text", value))
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> OrmResult<Self> {
        value.as_i64().ok_or_else(|| mismatch("integer", value))
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> OrmResult<Self> {
        let wide = i64::from_value(value)?;
        i32::try_from(wide)
            .map_err(|_| OrmError::decode("<value>", format!("{wide} does not fit in i32")))
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> OrmResult<Self> {
        value.as_f64().ok_or_else(|| mismatch("real", value))
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> OrmResult<Self> {
        value.as_bool().ok_or_else(|| mismatch("boolean", value))
    }
}

impl FromValue for Uuid {
    fn from_value(value: &Value) -> OrmResult<Self> {
        value.as_uuid().ok_or_else(|| mismatch("uuid", value))
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> OrmResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

// Binding delegates to the native impl for the server-side parameter type,
// narrowing integers and reals where the column is smaller.
fn bind_as<T: ToSql>(value: T, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if !T::accepts(ty) {
        return Err(format!(
            "cannot bind {} to a parameter of type {ty}",
            std::any::type_name::<T>()
        )
        .into());
    }
    value.to_sql(ty, out)
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Text(s) => bind_as(s.as_str(), ty, out),
            Value::Int(i) => {
                if *ty == Type::INT2 {
                    bind_as(i16::try_from(*i)?, ty, out)
                } else if *ty == Type::INT4 {
                    bind_as(i32::try_from(*i)?, ty, out)
                } else {
                    bind_as(*i, ty, out)
                }
            }
            Value::Real(r) => {
                if *ty == Type::FLOAT4 {
                    let narrow = *r as f32;
                    if r.is_finite() && narrow.is_infinite() {
                        return Err(format!("{r} does not fit in float4").into());
                    }
                    bind_as(narrow, ty, out)
                } else {
                    bind_as(*r, ty, out)
                }
            }
            Value::Bool(b) => bind_as(*b, ty, out),
            Value::Uuid(u) => bind_as(*u, ty, out),
        }
    }

    // Every kind can be NULL, so acceptance is decided per value in `to_sql`.
    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

impl<'a> FromSql<'a> for Value {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        if *ty == Type::BOOL {
            Ok(Value::Bool(bool::from_sql(ty, raw)?))
        } else if *ty == Type::INT2 {
            Ok(Value::Int(i16::from_sql(ty, raw)?.into()))
        } else if *ty == Type::INT4 {
            Ok(Value::Int(i32::from_sql(ty, raw)?.into()))
        } else if *ty == Type::INT8 {
            Ok(Value::Int(i64::from_sql(ty, raw)?))
        } else if *ty == Type::FLOAT4 {
            Ok(Value::Real(f32::from_sql(ty, raw)?.into()))
        } else if *ty == Type::FLOAT8 {
            Ok(Value::Real(f64::from_sql(ty, raw)?))
        } else if *ty == Type::UUID {
            Ok(Value::Uuid(Uuid::from_sql(ty, raw)?))
        } else if <String as FromSql>::accepts(ty) {
            Ok(Value::Text(String::from_sql(ty, raw)?))
        } else {
            Err(format!("unsupported column type {ty}").into())
        }
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, BoxError> {
        Ok(Value::Null)
    }

    fn accepts(ty: &Type) -> bool {
        [
            Type::BOOL,
            Type::INT2,
            Type::INT4,
            Type::INT8,
            Type::FLOAT4,
            Type::FLOAT8,
            Type::UUID,
        ]
        .contains(ty)
            || <String as FromSql>::accepts(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_none_is_null() {
        assert_eq!(Value::from(None::<&str>), Value::Null);
        assert_eq!(Value::from(Some(7_i32)), Value::Int(7));
    }

    #[test]
    fn values_macro_converts_each_item() {
        let id = Uuid::nil();
        let values = values!["alice", 3, 1.5, false, id];
        assert_eq!(
            values,
            vec![
                Value::Text("alice".into()),
                Value::Int(3),
                Value::Real(1.5),
                Value::Bool(false),
                Value::Uuid(id),
            ]
        );
        assert!(values![].is_empty());
    }

    #[test]
    fn from_value_rejects_other_kinds() {
        assert!(String::from_value(&Value::Int(1)).is_err());
        assert!(i64::from_value(&Value::Text("1".into())).is_err());
        assert!(i32::from_value(&Value::Int(i64::MAX)).is_err());
        assert_eq!(Option::<String>::from_value(&Value::Null).unwrap(), None);
    }

    #[test]
    fn kind_mismatch_is_a_decode_error() {
        let err = bool::from_value(&Value::Text("yes".into())).unwrap_err();
        assert!(matches!(err, OrmError::Decode { .. }));
        assert!(!err.is_malformed_input());
    }

    #[test]
    fn bind_narrows_to_int4() {
        let mut buf = BytesMut::new();
        let is_null = Value::Int(42).to_sql(&Type::INT4, &mut buf).unwrap();
        assert!(matches!(is_null, IsNull::No));
        assert_eq!(&buf[..], &42_i32.to_be_bytes());
    }

    #[test]
    fn bind_rejects_overflowing_int2() {
        let mut buf = BytesMut::new();
        assert!(Value::Int(70_000).to_sql(&Type::INT2, &mut buf).is_err());
    }

    #[test]
    fn bind_rejects_overflowing_float4() {
        let mut buf = BytesMut::new();
        assert!(Value::Real(1e300).to_sql(&Type::FLOAT4, &mut buf).is_err());
        assert!(Value::Real(-1e300).to_sql(&Type::FLOAT4, &mut buf).is_err());

        Value::Real(1.5).to_sql(&Type::FLOAT4, &mut buf).unwrap();
        assert_eq!(&buf[..], &1.5_f32.to_be_bytes());
        buf.clear();
        Value::Real(f64::INFINITY).to_sql(&Type::FLOAT4, &mut buf).unwrap();
        assert_eq!(&buf[..], &f32::INFINITY.to_be_bytes());
    }

    #[test]
    fn bind_rejects_text_for_uuid_column() {
        let mut buf = BytesMut::new();
        assert!(Value::from("nope").to_sql(&Type::UUID, &mut buf).is_err());
    }

    #[test]
    fn null_binds_to_any_type() {
        let mut buf = BytesMut::new();
        let is_null = Value::Null.to_sql(&Type::UUID, &mut buf).unwrap();
        assert!(matches!(is_null, IsNull::Yes));
    }

    #[test]
    fn decode_int4_and_text() {
        let v = Value::from_sql(&Type::INT4, &9_i32.to_be_bytes()).unwrap();
        assert_eq!(v, Value::Int(9));
        let v = Value::from_sql(&Type::TEXT, b"smith").unwrap();
        assert_eq!(v, Value::Text("smith".into()));
        assert!(!<Value as FromSql>::accepts(&Type::TIMESTAMPTZ));
    }

    #[test]
    fn serializes_untagged() {
        let json = serde_json::to_string(&values!["a", 1, None::<i64>]).unwrap();
        assert_eq!(json, r#"["a",1,null]"#);
    }
}
