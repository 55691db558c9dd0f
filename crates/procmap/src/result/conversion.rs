//! Automatic conversions between raw column kinds and property kinds

use chrono::{TimeZone, Utc};
use procmap_core::{ConversionError, Value, ValueKind};

/// Converts a non-NULL raw value into the given target kind
pub(crate) type Conversion = fn(Value, ValueKind) -> Result<Value, ConversionError>;

/// Look up the automatic conversion from `from` to `to`. Identical kinds need
/// no conversion and are not listed.
pub(crate) fn automatic(from: ValueKind, to: ValueKind) -> Option<Conversion> {
    let conversion: Conversion = match (from, to) {
        (f, t) if f.is_integer() && t.is_integer() => integer_to_integer,
        (f, t) if f.is_integer() && t.is_float() => integer_to_float,
        (f, t) if f.is_float() && t.is_float() => float_to_float,
        (ValueKind::Bool, t) if t.is_integer() => bool_to_integer,
        (f, ValueKind::Bool) if f.is_integer() => integer_to_bool,
        (ValueKind::Decimal, ValueKind::String) => decimal_to_string,
        (ValueKind::String, ValueKind::Decimal) => string_to_decimal,
        (ValueKind::Decimal, t) if t.is_float() => decimal_to_float,
        (ValueKind::Uuid, ValueKind::String) => uuid_to_string,
        (ValueKind::String, ValueKind::Uuid) => string_to_uuid,
        (ValueKind::String, ValueKind::Json) => string_to_json,
        (ValueKind::Json, ValueKind::String) => json_to_string,
        (ValueKind::DateTime, ValueKind::DateTimeUtc) => datetime_to_utc,
        (ValueKind::DateTimeUtc, ValueKind::DateTime) => utc_to_datetime,
        (ValueKind::DateTime | ValueKind::DateTimeUtc, ValueKind::Date) => datetime_to_date,
        _ => return None,
    };
    Some(conversion)
}

fn integer_to_integer(value: Value, to: ValueKind) -> Result<Value, ConversionError> {
    let wide = value
        .as_i64()
        .ok_or_else(|| ConversionError::mismatch("integer", &value))?;
    let out_of_range = || ConversionError::OutOfRange {
        value: wide.to_string(),
        target: to,
    };

    match to {
        ValueKind::Int8 => i8::try_from(wide).map(Value::Int8).map_err(|_| out_of_range()),
        ValueKind::Int16 => i16::try_from(wide).map(Value::Int16).map_err(|_| out_of_range()),
        ValueKind::Int32 => i32::try_from(wide).map(Value::Int32).map_err(|_| out_of_range()),
        ValueKind::Int64 => Ok(Value::Int64(wide)),
        _ => Err(ConversionError::mismatch(to.name(), &value)),
    }
}

/// Largest magnitudes up to which every integer is exactly representable
const F32_EXACT_INTEGER: u64 = 1 << f32::MANTISSA_DIGITS;
const F64_EXACT_INTEGER: u64 = 1 << f64::MANTISSA_DIGITS;

fn out_of_range(value: &Value, to: ValueKind) -> ConversionError {
    ConversionError::OutOfRange {
        value: value.to_string(),
        target: to,
    }
}

/// Finite values must stay finite after narrowing.
fn to_float(v: f64, to: ValueKind, value: &Value) -> Result<Value, ConversionError> {
    match to {
        ValueKind::Float32 => {
            let narrowed = v as f32;
            if v.is_finite() && !narrowed.is_finite() {
                return Err(out_of_range(value, to));
            }
            Ok(Value::Float32(narrowed))
        }
        ValueKind::Float64 => Ok(Value::Float64(v)),
        _ => Err(ConversionError::mismatch(to.name(), value)),
    }
}

fn integer_to_float(value: Value, to: ValueKind) -> Result<Value, ConversionError> {
    let wide = value
        .as_i64()
        .ok_or_else(|| ConversionError::mismatch("integer", &value))?;
    let exact = match to {
        ValueKind::Float32 => F32_EXACT_INTEGER,
        _ => F64_EXACT_INTEGER,
    };
    if wide.unsigned_abs() > exact {
        return Err(out_of_range(&value, to));
    }
    to_float(wide as f64, to, &value)
}

fn float_to_float(value: Value, to: ValueKind) -> Result<Value, ConversionError> {
    let v = value
        .as_f64()
        .ok_or_else(|| ConversionError::mismatch("float", &value))?;
    to_float(v, to, &value)
}

fn bool_to_integer(value: Value, to: ValueKind) -> Result<Value, ConversionError> {
    match value {
        Value::Bool(b) => integer_to_integer(Value::Int64(i64::from(b)), to),
        other => Err(ConversionError::mismatch("bool", &other)),
    }
}

fn integer_to_bool(value: Value, _to: ValueKind) -> Result<Value, ConversionError> {
    value
        .as_i64()
        .map(|v| Value::Bool(v != 0))
        .ok_or_else(|| ConversionError::mismatch("integer", &value))
}

fn decimal_to_string(value: Value, _to: ValueKind) -> Result<Value, ConversionError> {
    match value {
        Value::Decimal(s) => Ok(Value::String(s)),
        other => Err(ConversionError::mismatch("decimal", &other)),
    }
}

/// `[+-]digits[.digits]`, with at least one digit on either side of the point
fn is_decimal_literal(text: &str) -> bool {
    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    !(whole.is_empty() && fraction.is_empty()) && all_digits(whole) && all_digits(fraction)
}

fn string_to_decimal(value: Value, to: ValueKind) -> Result<Value, ConversionError> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if is_decimal_literal(trimmed) {
                Ok(Value::Decimal(trimmed.to_string()))
            } else {
                Err(ConversionError::Parse {
                    value: s.clone(),
                    target: to,
                    message: "not a decimal number".to_string(),
                })
            }
        }
        other => Err(ConversionError::mismatch("string", &other)),
    }
}

fn decimal_to_float(value: Value, to: ValueKind) -> Result<Value, ConversionError> {
    let Value::Decimal(s) = &value else {
        return Err(ConversionError::mismatch("decimal", &value));
    };
    let v = s.parse::<f64>().map_err(|e| ConversionError::Parse {
        value: s.clone(),
        target: to,
        message: e.to_string(),
    })?;
    if !v.is_finite() {
        return Err(out_of_range(&value, to));
    }
    to_float(v, to, &value)
}

fn uuid_to_string(value: Value, _to: ValueKind) -> Result<Value, ConversionError> {
    match value {
        Value::Uuid(u) => Ok(Value::String(u.to_string())),
        other => Err(ConversionError::mismatch("uuid", &other)),
    }
}

fn string_to_uuid(value: Value, to: ValueKind) -> Result<Value, ConversionError> {
    match value {
        Value::String(s) => uuid::Uuid::parse_str(s.trim())
            .map(Value::Uuid)
            .map_err(|e| ConversionError::Parse {
                value: s,
                target: to,
                message: e.to_string(),
            }),
        other => Err(ConversionError::mismatch("string", &other)),
    }
}

fn string_to_json(value: Value, to: ValueKind) -> Result<Value, ConversionError> {
    match value {
        Value::String(s) => match serde_json::from_str(&s) {
            Ok(json) => Ok(Value::Json(json)),
            Err(e) => Err(ConversionError::Parse {
                value: s,
                target: to,
                message: e.to_string(),
            }),
        },
        other => Err(ConversionError::mismatch("string", &other)),
    }
}

fn json_to_string(value: Value, _to: ValueKind) -> Result<Value, ConversionError> {
    match value {
        Value::Json(json) => Ok(Value::String(json.to_string())),
        other => Err(ConversionError::mismatch("json", &other)),
    }
}

fn datetime_to_utc(value: Value, _to: ValueKind) -> Result<Value, ConversionError> {
    match value {
        Value::DateTime(naive) => Ok(Value::DateTimeUtc(Utc.from_utc_datetime(&naive))),
        other => Err(ConversionError::mismatch("datetime", &other)),
    }
}

fn utc_to_datetime(value: Value, _to: ValueKind) -> Result<Value, ConversionError> {
    match value {
        Value::DateTimeUtc(utc) => Ok(Value::DateTime(utc.naive_utc())),
        other => Err(ConversionError::mismatch("datetime_utc", &other)),
    }
}

fn datetime_to_date(value: Value, _to: ValueKind) -> Result<Value, ConversionError> {
    match value {
        Value::DateTime(naive) => Ok(Value::Date(naive.date())),
        Value::DateTimeUtc(utc) => Ok(Value::Date(utc.date_naive())),
        other => Err(ConversionError::mismatch("datetime", &other)),
    }
}
