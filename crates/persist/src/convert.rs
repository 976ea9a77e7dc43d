//! Storage type enumeration and the value conversion table.
//!
//! Records hold plain Rust values; statements bind [`sea_query::Value`]s; the
//! session speaks [`DataType`]. Conversions between the three live here so that
//! every coercion the crate performs is listed in one place.

use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sea_query::{Value, Values};

use crate::types::{DataType, Row};

/// Closed set of storage types a property may declare or convert to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StorageType {
    /// Not declared; values are bound as produced by the record.
    #[default]
    Unknown,
    /// Boolean.
    Boolean,
    /// 16-bit integer, bound as a 32-bit integer.
    SmallInt,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInt,
    /// 32-bit unsigned integer.
    UnsignedInteger,
    /// 64-bit unsigned integer.
    UnsignedBigInt,
    /// Single precision float.
    Float,
    /// Double precision float.
    Double,
    /// Variable length text.
    Varchar,
    /// Binary data.
    Binary,
    /// Calendar date.
    Date,
    /// Time of day.
    Time,
    /// Date and time.
    Timestamp,
}

impl StorageType {
    /// `NULL` of the session type this storage type binds as.
    #[must_use]
    pub const fn null(self) -> DataType {
        match self {
            Self::Boolean => DataType::Boolean(None),
            Self::SmallInt | Self::Integer => DataType::Int32(None),
            Self::BigInt => DataType::Int64(None),
            Self::UnsignedInteger => DataType::Uint32(None),
            Self::UnsignedBigInt => DataType::Uint64(None),
            Self::Float => DataType::Float(None),
            Self::Double => DataType::Double(None),
            Self::Binary => DataType::Binary(None),
            Self::Date => DataType::Date(None),
            Self::Time => DataType::Time(None),
            Self::Timestamp => DataType::Timestamp(None),
            Self::Unknown | Self::Varchar => DataType::Str(None),
        }
    }
}

/// Converts a value to the representation of `target`.
///
/// `NULL` stays `NULL`. [`StorageType::Unknown`] leaves the value untouched.
///
/// # Errors
///
/// Returns an error when the value has no representation in `target`.
pub fn convert(value: DataType, target: StorageType) -> Result<DataType> {
    if value.is_null() {
        return Ok(target.null());
    }

    let converted = match target {
        StorageType::Unknown => value,
        StorageType::Boolean => DataType::Boolean(Some(bool::from_data_type(&value)?)),
        StorageType::SmallInt => DataType::Int32(Some(i32::from(i16::from_data_type(&value)?))),
        StorageType::Integer => DataType::Int32(Some(i32::from_data_type(&value)?)),
        StorageType::BigInt => DataType::Int64(Some(i64::from_data_type(&value)?)),
        StorageType::UnsignedInteger => DataType::Uint32(Some(u32::from_data_type(&value)?)),
        StorageType::UnsignedBigInt => DataType::Uint64(Some(u64::from_data_type(&value)?)),
        StorageType::Float => DataType::Float(Some(f32::from_data_type(&value)?)),
        StorageType::Double => DataType::Double(Some(f64::from_data_type(&value)?)),
        StorageType::Varchar => DataType::Str(Some(
            to_text(&value).ok_or_else(|| anyhow!("cannot represent {value:?} as text"))?,
        )),
        StorageType::Binary => DataType::Binary(Some(Vec::<u8>::from_data_type(&value)?)),
        StorageType::Date => DataType::Date(Some(NaiveDate::from_data_type(&value)?.to_string())),
        StorageType::Time => DataType::Time(Some(NaiveTime::from_data_type(&value)?.to_string())),
        StorageType::Timestamp => {
            DataType::Timestamp(Some(DateTime::<Utc>::from_data_type(&value)?.to_rfc3339()))
        }
    };
    Ok(converted)
}

/// Trait for types that can be extracted from session values.
///
/// Numeric conversions are lenient: any integer variant converts to any integer
/// type it fits in, and text is parsed. This lets payload values (which arrive as
/// 64-bit integers or doubles) populate narrower record fields.
pub trait FetchValue: Sized {
    /// Convert a single session value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is `NULL` or cannot be converted to the target type.
    fn from_data_type(value: &DataType) -> Result<Self>;

    /// Fetch a value from a row by column name.
    ///
    /// # Errors
    ///
    /// Returns an error if the column is missing or the value cannot be converted to the target type.
    fn fetch(row: &Row, col: &str) -> Result<Self> {
        let value = row.get(col).ok_or_else(|| anyhow!("missing column '{col}'"))?;
        Self::from_data_type(value)
    }
}

macro_rules! fetch_integer {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FetchValue for $ty {
                #[allow(clippy::useless_conversion)]
                fn from_data_type(value: &DataType) -> Result<Self> {
                    let converted = match value {
                        DataType::Boolean(Some(v)) => Some(Self::from(*v)),
                        DataType::Int32(Some(v)) => Self::try_from(*v).ok(),
                        DataType::Int64(Some(v)) => Self::try_from(*v).ok(),
                        DataType::Uint32(Some(v)) => Self::try_from(*v).ok(),
                        DataType::Uint64(Some(v)) => Self::try_from(*v).ok(),
                        DataType::Str(Some(raw)) => raw.trim().parse().ok(),
                        _ => None,
                    };
                    converted.ok_or_else(|| {
                        anyhow!("expected {} compatible data type, found {value:?}", stringify!($ty))
                    })
                }
            }
        )*
    };
}

fetch_integer!(i16, i32, i64, u32, u64);

impl FetchValue for bool {
    fn from_data_type(value: &DataType) -> Result<Self> {
        match value {
            DataType::Boolean(Some(v)) => Ok(*v),
            DataType::Int32(Some(v)) => Ok(*v != 0),
            DataType::Int64(Some(v)) => Ok(*v != 0),
            DataType::Uint32(Some(v)) => Ok(*v != 0),
            DataType::Uint64(Some(v)) => Ok(*v != 0),
            DataType::Str(Some(raw)) => match raw.trim() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => bail!("expected boolean data type, found text '{raw}'"),
            },
            _ => bail!("expected boolean data type, found {value:?}"),
        }
    }
}

impl FetchValue for f64 {
    #[allow(clippy::cast_precision_loss)]
    fn from_data_type(value: &DataType) -> Result<Self> {
        match value {
            DataType::Float(Some(v)) => Ok(Self::from(*v)),
            DataType::Double(Some(v)) => Ok(*v),
            DataType::Int32(Some(v)) => Ok(Self::from(*v)),
            DataType::Int64(Some(v)) => Ok(*v as Self),
            DataType::Uint32(Some(v)) => Ok(Self::from(*v)),
            DataType::Uint64(Some(v)) => Ok(*v as Self),
            DataType::Str(Some(raw)) => {
                raw.trim().parse().map_err(|e| anyhow!("expected double data type: {e}"))
            }
            _ => bail!("expected double data type, found {value:?}"),
        }
    }
}

impl FetchValue for f32 {
    #[allow(clippy::cast_possible_truncation)]
    fn from_data_type(value: &DataType) -> Result<Self> {
        match value {
            DataType::Float(Some(v)) => Ok(*v),
            _ => f64::from_data_type(value).map(|v| v as Self),
        }
    }
}

impl FetchValue for String {
    fn from_data_type(value: &DataType) -> Result<Self> {
        match value {
            DataType::Str(Some(raw))
            | DataType::Date(Some(raw))
            | DataType::Time(Some(raw))
            | DataType::Timestamp(Some(raw)) => Ok(raw.clone()),
            _ => bail!("expected string data type, found {value:?}"),
        }
    }
}

impl FetchValue for Vec<u8> {
    fn from_data_type(value: &DataType) -> Result<Self> {
        match value {
            DataType::Binary(Some(bytes)) => Ok(bytes.clone()),
            DataType::Str(Some(raw)) => Ok(raw.as_bytes().to_vec()),
            _ => bail!("expected binary data type, found {value:?}"),
        }
    }
}

impl FetchValue for NaiveDate {
    fn from_data_type(value: &DataType) -> Result<Self> {
        match value {
            DataType::Date(Some(raw)) | DataType::Str(Some(raw)) => {
                Self::parse_from_str(raw, "%Y-%m-%d")
                    .map_err(|_e| anyhow!("unsupported date: {raw}; expected \"%Y-%m-%d\" format"))
            }
            DataType::Timestamp(Some(_)) => Ok(NaiveDateTime::from_data_type(value)?.date()),
            _ => bail!("expected date data type, found {value:?}"),
        }
    }
}

impl FetchValue for NaiveTime {
    fn from_data_type(value: &DataType) -> Result<Self> {
        match value {
            DataType::Time(Some(raw)) | DataType::Str(Some(raw)) => {
                Self::parse_from_str(raw, "%H:%M:%S%.f")
                    .map_err(|_e| anyhow!("unsupported time: {raw}; expected \"%H:%M:%S%.f\" format"))
            }
            _ => bail!("expected time data type, found {value:?}"),
        }
    }
}

impl FetchValue for NaiveDateTime {
    fn from_data_type(value: &DataType) -> Result<Self> {
        Ok(DateTime::<Utc>::from_data_type(value)?.naive_utc())
    }
}

impl FetchValue for DateTime<Utc> {
    fn from_data_type(value: &DataType) -> Result<Self> {
        match value {
            DataType::Timestamp(Some(raw)) | DataType::Str(Some(raw)) => {
                if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
                    return Ok(parsed.with_timezone(&Utc));
                }
                for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
                    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
                        return Ok(Self::from_naive_utc_and_offset(parsed, Utc));
                    }
                }
                bail!(
                    "unsupported timestamp: {raw}; expected RFC3339 or \"%Y-%m-%d %H:%M:%S%.f\" format"
                )
            }
            _ => bail!("expected timestamp data type, found {value:?}"),
        }
    }
}

impl FetchValue for serde_json::Value {
    fn from_data_type(value: &DataType) -> Result<Self> {
        match value {
            DataType::Str(Some(raw)) => Ok(serde_json::from_str(raw)?),
            DataType::Binary(Some(bytes)) => Ok(serde_json::from_slice(bytes)?),
            _ => bail!("expected json compatible data type, found {value:?}"),
        }
    }
}

impl<T: FetchValue> FetchValue for Option<T> {
    fn from_data_type(value: &DataType) -> Result<Self> {
        if value.is_null() { Ok(None) } else { T::from_data_type(value).map(Some) }
    }

    fn fetch(row: &Row, col: &str) -> Result<Self> {
        row.get(col).map_or(Ok(None), Self::from_data_type)
    }
}

/// Textual form of a non-null value.
#[must_use]
pub fn to_text(value: &DataType) -> Option<String> {
    match value {
        DataType::Boolean(Some(v)) => Some(v.to_string()),
        DataType::Int32(Some(v)) => Some(v.to_string()),
        DataType::Int64(Some(v)) => Some(v.to_string()),
        DataType::Uint32(Some(v)) => Some(v.to_string()),
        DataType::Uint64(Some(v)) => Some(v.to_string()),
        DataType::Float(Some(v)) => Some(v.to_string()),
        DataType::Double(Some(v)) => Some(v.to_string()),
        DataType::Str(Some(v))
        | DataType::Date(Some(v))
        | DataType::Time(Some(v))
        | DataType::Timestamp(Some(v)) => Some(v.clone()),
        DataType::Binary(Some(bytes)) => String::from_utf8(bytes.clone()).ok(),
        _ => None,
    }
}

// Outbound conversion
pub(crate) fn values_to_data_types(values: Values) -> Result<Vec<DataType>> {
    values.into_iter().map(value_to_data_type).collect()
}

pub(crate) fn value_to_data_type(value: Value) -> Result<DataType> {
    let data_type = match value {
        Value::Bool(v) => DataType::Boolean(v),
        Value::TinyInt(v) => DataType::Int32(v.map(i32::from)),
        Value::SmallInt(v) => DataType::Int32(v.map(i32::from)),
        Value::Int(v) => DataType::Int32(v),
        Value::BigInt(v) => DataType::Int64(v),
        Value::TinyUnsigned(v) => DataType::Uint32(v.map(u32::from)),
        Value::SmallUnsigned(v) => DataType::Uint32(v.map(u32::from)),
        Value::Unsigned(v) => DataType::Uint32(v),
        Value::BigUnsigned(v) => DataType::Uint64(v),
        Value::Float(v) => DataType::Float(v),
        Value::Double(v) => DataType::Double(v),
        Value::String(v) => DataType::Str(v.map(|value| *value)),
        Value::ChronoDate(v) => DataType::Date(v.map(|value| value.to_string())),
        Value::ChronoTime(v) => DataType::Time(v.map(|value| value.to_string())),
        Value::ChronoDateTime(v) => DataType::Timestamp(v.map(|value| value.to_string())),
        Value::ChronoDateTimeUtc(v) => DataType::Timestamp(v.map(|value| value.to_rfc3339())),
        Value::Char(v) => DataType::Str(v.map(|ch| ch.to_string())),
        Value::Bytes(v) => DataType::Binary(v.map(|bytes| *bytes)),
        _ => {
            bail!("unsupported values require explicit conversion before building the query")
        }
    };
    Ok(data_type)
}

pub(crate) fn data_type_to_value(value: DataType) -> Value {
    match value {
        DataType::Boolean(v) => Value::Bool(v),
        DataType::Int32(v) => Value::Int(v),
        DataType::Int64(v) => Value::BigInt(v),
        DataType::Uint32(v) => Value::Unsigned(v),
        DataType::Uint64(v) => Value::BigUnsigned(v),
        DataType::Float(v) => Value::Float(v),
        DataType::Double(v) => Value::Double(v),
        DataType::Binary(v) => Value::Bytes(v.map(Box::new)),
        DataType::Str(v) | DataType::Date(v) | DataType::Time(v) | DataType::Timestamp(v) => {
            Value::String(v.map(Box::new))
        }
    }
}

/// Applies a declared conversion to a bound value.
pub(crate) fn bind_value(value: Value, conversion: Option<StorageType>) -> Result<Value> {
    match conversion {
        Some(target) => Ok(data_type_to_value(convert(value_to_data_type(value)?, target)?)),
        None => Ok(value),
    }
}

pub(crate) fn is_null_value(value: &Value) -> bool {
    value_to_data_type(value.clone()).is_ok_and(|value| value.is_null())
}

/// Session value for a JSON payload value. Arrays and objects bind as JSON text.
#[must_use]
pub fn json_to_data_type(value: &serde_json::Value) -> DataType {
    match value {
        serde_json::Value::Null => DataType::Str(None),
        serde_json::Value::Bool(v) => DataType::Boolean(Some(*v)),
        serde_json::Value::Number(n) => n.as_i64().map_or_else(
            || {
                n.as_u64().map_or_else(
                    || DataType::Double(n.as_f64()),
                    |v| DataType::Uint64(Some(v)),
                )
            },
            |v| DataType::Int64(Some(v)),
        ),
        serde_json::Value::String(v) => DataType::Str(Some(v.clone())),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
            DataType::Str(Some(value.to_string()))
        }
    }
}

/// JSON form of a session value.
#[must_use]
pub fn data_type_to_json(value: &DataType) -> serde_json::Value {
    use serde_json::Value as Json;

    match value {
        DataType::Boolean(Some(v)) => Json::from(*v),
        DataType::Int32(Some(v)) => Json::from(*v),
        DataType::Int64(Some(v)) => Json::from(*v),
        DataType::Uint32(Some(v)) => Json::from(*v),
        DataType::Uint64(Some(v)) => Json::from(*v),
        DataType::Float(Some(v)) => Json::from(*v),
        DataType::Double(Some(v)) => Json::from(*v),
        DataType::Str(Some(v))
        | DataType::Date(Some(v))
        | DataType::Time(Some(v))
        | DataType::Timestamp(Some(v)) => Json::from(v.as_str()),
        DataType::Binary(Some(bytes)) => Json::from(bytes.clone()),
        _ => Json::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_to_data_type_numeric() {
        let val = value_to_data_type(Value::Bool(Some(true))).unwrap();
        assert!(matches!(val, DataType::Boolean(Some(true))));

        let val = value_to_data_type(Value::SmallInt(Some(1000))).unwrap();
        assert!(matches!(val, DataType::Int32(Some(1000))));

        let val = value_to_data_type(Value::BigInt(Some(999))).unwrap();
        assert!(matches!(val, DataType::Int64(Some(999))));

        let val = value_to_data_type(Value::SmallUnsigned(Some(500))).unwrap();
        assert!(matches!(val, DataType::Uint32(Some(500))));

        let val = value_to_data_type(Value::Double(Some(std::f64::consts::E))).unwrap();
        assert!(
            matches!(val, DataType::Double(Some(v)) if (v - std::f64::consts::E).abs() < 0.001)
        );
    }

    #[test]
    fn value_to_data_type_temporal() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let val = value_to_data_type(Value::ChronoDate(Some(Box::new(date)))).unwrap();
        assert_eq!(val, DataType::Date(Some("2024-01-15".to_string())));

        let dt_utc: DateTime<Utc> = "2024-01-15T10:30:45Z".parse().unwrap();
        let val = value_to_data_type(Value::ChronoDateTimeUtc(Some(Box::new(dt_utc)))).unwrap();
        let DataType::Timestamp(Some(raw)) = val else {
            panic!("expected timestamp");
        };
        assert!(raw.starts_with("2024-01-15T10:30:45"));
    }

    #[test]
    fn null_values_are_detected() {
        assert!(is_null_value(&Value::Int(None)));
        assert!(is_null_value(&Value::String(None)));
        assert!(!is_null_value(&Value::Int(Some(0))));
        assert!(!is_null_value(&Value::String(Some(Box::new(String::new())))));
    }

    #[test]
    fn lenient_numeric_fetch() {
        assert_eq!(i32::from_data_type(&DataType::Int64(Some(42))).unwrap(), 42);
        assert_eq!(i64::from_data_type(&DataType::Str(Some(" 7 ".into()))).unwrap(), 7);
        assert_eq!(u32::from_data_type(&DataType::Int32(Some(3))).unwrap(), 3);
        let double = f64::from_data_type(&DataType::Int64(Some(20))).unwrap();
        assert!((double - 20.0).abs() < f64::EPSILON);
        assert!(bool::from_data_type(&DataType::Int64(Some(1))).unwrap());

        // out of range and nulls are rejected
        i32::from_data_type(&DataType::Int64(Some(i64::MAX))).unwrap_err();
        u32::from_data_type(&DataType::Int32(Some(-1))).unwrap_err();
        i64::from_data_type(&DataType::Int64(None)).unwrap_err();
        String::from_data_type(&DataType::Int32(Some(42))).unwrap_err();
    }

    #[test]
    fn option_fetch_handles_missing_and_null() {
        let row = Row {
            index: "0".into(),
            fields: vec![crate::types::Field {
                name: "nickname".into(),
                value: DataType::Str(None),
            }],
        };
        assert_eq!(Option::<String>::fetch(&row, "nickname").unwrap(), None);
        assert_eq!(Option::<String>::fetch(&row, "absent").unwrap(), None);
        String::fetch(&row, "absent").unwrap_err();
    }

    #[test]
    fn timestamp_formats() {
        let raw = DataType::Timestamp(Some("2024-01-15 10:30:45".into()));
        let parsed = DateTime::<Utc>::from_data_type(&raw).unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-01-15T10:30:45+00:00");

        let err = DateTime::<Utc>::from_data_type(&DataType::Timestamp(Some("invalid".into())))
            .unwrap_err();
        assert!(err.to_string().contains("unsupported timestamp"));
    }

    #[test]
    fn conversion_table() {
        assert_eq!(
            convert(DataType::Int64(Some(5)), StorageType::Varchar).unwrap(),
            DataType::Str(Some("5".into()))
        );
        assert_eq!(
            convert(DataType::Str(Some("12".into())), StorageType::Integer).unwrap(),
            DataType::Int32(Some(12))
        );
        assert_eq!(
            convert(DataType::Int64(None), StorageType::Double).unwrap(),
            DataType::Double(None)
        );
        assert_eq!(
            convert(DataType::Str(Some("x".into())), StorageType::Unknown).unwrap(),
            DataType::Str(Some("x".into()))
        );
        convert(DataType::Str(Some("abc".into())), StorageType::BigInt).unwrap_err();
    }

    #[test]
    fn json_round_trip_of_scalars() {
        assert_eq!(json_to_data_type(&serde_json::json!(12.5)), DataType::Double(Some(12.5)));
        assert_eq!(json_to_data_type(&serde_json::json!(3)), DataType::Int64(Some(3)));
        assert_eq!(json_to_data_type(&serde_json::json!(null)), DataType::Str(None));
        assert_eq!(data_type_to_json(&DataType::Int64(Some(3))), serde_json::json!(3));
        assert_eq!(data_type_to_json(&DataType::Str(None)), serde_json::Value::Null);
    }
}
