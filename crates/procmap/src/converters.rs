//! Explicit column converters and JSON columns

use procmap_core::{ConversionError, SqlType, TypeInfo, Value, ValueKind};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

type ConvertFn = Arc<dyn Fn(Value) -> Result<Value, ConversionError> + Send + Sync>;

/// A typed conversion from the raw column type `Col` to the property type
/// `Prop`, checked against the declared property when the result compiles
#[derive(Clone)]
pub struct ColumnConverter {
    input: ValueKind,
    output: TypeInfo,
    output_kind: ValueKind,
    output_nullable: bool,
    convert: ConvertFn,
}

impl ColumnConverter {
    pub fn new<Col: SqlType, Prop: SqlType>(f: fn(Col) -> Prop) -> Self {
        Self::from_fn::<Col, Prop>(Arc::new(move |value: Value| {
            Ok(f(Col::from_value(value)?).into_value())
        }))
    }

    pub fn try_new<Col: SqlType, Prop: SqlType>(
        f: fn(Col) -> Result<Prop, ConversionError>,
    ) -> Self {
        Self::from_fn::<Col, Prop>(Arc::new(move |value: Value| {
            Ok(f(Col::from_value(value)?)?.into_value())
        }))
    }

    fn from_fn<Col: SqlType, Prop: SqlType>(convert: ConvertFn) -> Self {
        Self {
            input: Col::KIND,
            output: TypeInfo::of::<Prop>(),
            output_kind: Prop::KIND,
            output_nullable: Prop::NULLABLE,
            convert,
        }
    }

    /// Kind of the raw column value the converter reads
    pub fn input_kind(&self) -> ValueKind {
        self.input
    }

    pub fn output_type(&self) -> TypeInfo {
        self.output
    }

    pub fn convert(&self, value: Value) -> Result<Value, ConversionError> {
        (self.convert)(value)
    }

    /// Whether the converted value can be decoded into the property. A
    /// converter producing `T` also feeds an `Option<T>` property.
    pub(crate) fn fits(&self, property: TypeInfo, kind: ValueKind, accepts_null: bool) -> bool {
        self.output == property || (accepts_null && !self.output_nullable && self.output_kind == kind)
    }
}

impl fmt::Debug for ColumnConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnConverter")
            .field("input", &self.input)
            .field("output", &self.output)
            .finish()
    }
}

/// A property stored as a JSON document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Json<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for Json<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T> SqlType for Json<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    const KIND: ValueKind = ValueKind::Json;

    fn into_value(self) -> Value {
        match serde_json::to_value(&self.0) {
            Ok(json) => Value::Json(json),
            Err(e) => {
                tracing::warn!(error = %e, "value cannot be represented as JSON, binding NULL");
                Value::Null
            }
        }
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Json(json) => serde_json::from_value(json).map(Json).map_err(|e| {
                ConversionError::Parse {
                    value: "<json>".to_string(),
                    target: ValueKind::Json,
                    message: e.to_string(),
                }
            }),
            other => Err(ConversionError::mismatch(ValueKind::Json.name(), &other)),
        }
    }
}

/// Converter for text columns holding JSON documents
pub fn json_text<T>() -> ColumnConverter
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    ColumnConverter::try_new::<String, Json<T>>(parse_json::<T>)
}

fn parse_json<T: DeserializeOwned>(text: String) -> Result<Json<T>, ConversionError> {
    serde_json::from_str(&text)
        .map(Json)
        .map_err(|e| ConversionError::Parse {
            value: text,
            target: ValueKind::Json,
            message: e.to_string(),
        })
}
