//! Conversions between Rust types and driver values

use crate::{ConversionError, Value, ValueKind};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use uuid::Uuid;

/// A Rust type that can be bound to a procedure parameter or a result column.
///
/// Conversions are strict: `from_value` only accepts values of `KIND` (and
/// NULL for nullable types). Widening and narrowing between kinds is decided
/// once when result columns are compiled, never guessed at runtime.
pub trait SqlType: Sized + Send + Sync + 'static {
    /// The value kind this type is stored as
    const KIND: ValueKind;

    /// Whether NULL is a valid value of this type
    const NULLABLE: bool = false;

    fn into_value(self) -> Value;

    fn from_value(value: Value) -> Result<Self, ConversionError>;
}

macro_rules! impl_sql_type {
    ($ty:ty, $kind:ident) => {
        impl SqlType for $ty {
            const KIND: ValueKind = ValueKind::$kind;

            fn into_value(self) -> Value {
                Value::$kind(self)
            }

            fn from_value(value: Value) -> Result<Self, ConversionError> {
                match value {
                    Value::$kind(v) => Ok(v),
                    other => Err(ConversionError::mismatch(ValueKind::$kind.name(), &other)),
                }
            }
        }
    };
}

impl_sql_type!(bool, Bool);
impl_sql_type!(i8, Int8);
impl_sql_type!(i16, Int16);
impl_sql_type!(i32, Int32);
impl_sql_type!(i64, Int64);
impl_sql_type!(f32, Float32);
impl_sql_type!(f64, Float64);
impl_sql_type!(String, String);
impl_sql_type!(Vec<u8>, Bytes);
impl_sql_type!(Uuid, Uuid);
impl_sql_type!(NaiveDate, Date);
impl_sql_type!(NaiveTime, Time);
impl_sql_type!(NaiveDateTime, DateTime);
impl_sql_type!(DateTime<Utc>, DateTimeUtc);
impl_sql_type!(serde_json::Value, Json);

impl<T: SqlType> SqlType for Option<T> {
    const KIND: ValueKind = T::KIND;
    const NULLABLE: bool = true;

    fn into_value(self) -> Value {
        match self {
            Some(v) => v.into_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}
