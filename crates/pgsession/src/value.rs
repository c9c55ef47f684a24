//! Scalar values exchanged with Postgres, and the ordered [`DataMap`] used for column/value pairs.

use crate::error::{SessionError, SessionResult};
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;
use std::error::Error;
use std::fmt;
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, IsNull, Kind, ToSql, Type};
use uuid::Uuid;

/// A single column value, used both as a bound parameter and as a decoded result column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// `numeric`, with the `rust_decimal` feature.
    #[cfg(feature = "rust_decimal")]
    Numeric(rust_decimal::Decimal),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Time(NaiveTime),
    Json(serde_json::Value),
    Uuid(Uuid),
    Bytes(Vec<u8>),
}

impl Value {
    /// Short type name, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            #[cfg(feature = "rust_decimal")]
            Value::Numeric(_) => "numeric",
            Value::Text(_) => "text",
            Value::Date(_) => "date",
            Value::Timestamp(_) => "timestamp",
            Value::TimestampTz(_) => "timestamptz",
            Value::Time(_) => "time",
            Value::Json(_) => "json",
            Value::Uuid(_) => "uuid",
            Value::Bytes(_) => "bytes",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

impl_from_value! {
    bool => Bool,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u16 => Int,
    u32 => Int,
    f32 => Float,
    f64 => Float,
    String => Text,
    &str => Text,
    NaiveDate => Date,
    NaiveDateTime => Timestamp,
    DateTime<Utc> => TimestampTz,
    NaiveTime => Time,
    serde_json::Value => Json,
    Uuid => Uuid,
    Vec<u8> => Bytes,
}

#[cfg(feature = "rust_decimal")]
impl From<rust_decimal::Decimal> for Value {
    fn from(v: rust_decimal::Decimal) -> Self {
        Value::Numeric(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

fn mismatch(value: &Value, ty: &Type) -> Box<dyn Error + Sync + Send> {
    format!("cannot bind {} value to parameter of type {}", value.kind(), ty).into()
}

fn parse_timestamp(v: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(v, format).ok())
}

/// Read text as a value of the parameter's type, so strings bind to typed columns.
fn parse_text(v: &str, ty: &Type) -> Option<Value> {
    let v = v.trim();
    match *ty {
        Type::INT2 | Type::INT4 | Type::INT8 | Type::OID => v.parse().ok().map(Value::Int),
        Type::FLOAT4 | Type::FLOAT8 => v.parse().ok().map(Value::Float),
        #[cfg(feature = "rust_decimal")]
        Type::NUMERIC => v.parse().ok().map(Value::Numeric),
        Type::BOOL => match v.to_ascii_lowercase().as_str() {
            "t" | "true" | "y" | "yes" | "on" | "1" => Some(Value::Bool(true)),
            "f" | "false" | "n" | "no" | "off" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        Type::DATE => NaiveDate::parse_from_str(v, "%Y-%m-%d").ok().map(Value::Date),
        Type::TIMESTAMP => parse_timestamp(v).map(Value::Timestamp),
        Type::TIMESTAMPTZ => DateTime::parse_from_rfc3339(v)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
            .or_else(|| parse_timestamp(v).map(|ts| ts.and_utc()))
            .map(Value::TimestampTz),
        Type::TIME => NaiveTime::parse_from_str(v, "%H:%M:%S%.f").ok().map(Value::Time),
        Type::UUID => Uuid::parse_str(v).ok().map(Value::Uuid),
        _ => None,
    }
}

impl ToSql for Value {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql(ty, out),
            Value::Int(v) => match *ty {
                Type::INT2 => i16::try_from(*v)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*v)?.to_sql(ty, out),
                Type::INT8 => v.to_sql(ty, out),
                Type::OID => u32::try_from(*v)?.to_sql(ty, out),
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                Type::FLOAT8 => (*v as f64).to_sql(ty, out),
                #[cfg(feature = "rust_decimal")]
                Type::NUMERIC => rust_decimal::Decimal::from(*v).to_sql(ty, out),
                Type::TEXT | Type::VARCHAR | Type::BPCHAR => v.to_string().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            Value::Float(v) => match *ty {
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                Type::FLOAT8 => v.to_sql(ty, out),
                #[cfg(feature = "rust_decimal")]
                Type::NUMERIC => rust_decimal::Decimal::try_from(*v)?.to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            #[cfg(feature = "rust_decimal")]
            Value::Numeric(v) => {
                use rust_decimal::prelude::ToPrimitive;
                match *ty {
                    Type::NUMERIC => v.to_sql(ty, out),
                    Type::FLOAT4 => v.to_f32().ok_or_else(|| mismatch(self, ty))?.to_sql(ty, out),
                    Type::FLOAT8 => v.to_f64().ok_or_else(|| mismatch(self, ty))?.to_sql(ty, out),
                    Type::TEXT | Type::VARCHAR => v.to_string().to_sql(ty, out),
                    _ => Err(mismatch(self, ty)),
                }
            }
            Value::Text(v) => match *ty {
                Type::JSON | Type::JSONB => {
                    serde_json::from_str::<serde_json::Value>(v)?.to_sql(ty, out)
                }
                _ if <&str as ToSql>::accepts(ty) => v.as_str().to_sql(ty, out),
                _ => match parse_text(v, ty) {
                    Some(parsed) => parsed.to_sql(ty, out),
                    None => Err(mismatch(self, ty)),
                },
            },
            Value::Date(v) => match *ty {
                Type::DATE => v.to_sql(ty, out),
                Type::TIMESTAMP => v.and_time(chrono::NaiveTime::MIN).to_sql(ty, out),
                Type::TIMESTAMPTZ => v.and_time(chrono::NaiveTime::MIN).and_utc().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            Value::Timestamp(v) => match *ty {
                Type::TIMESTAMP => v.to_sql(ty, out),
                Type::TIMESTAMPTZ => v.and_utc().to_sql(ty, out),
                Type::DATE => v.date().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            Value::TimestampTz(v) => match *ty {
                Type::TIMESTAMPTZ => v.to_sql(ty, out),
                Type::TIMESTAMP => v.naive_utc().to_sql(ty, out),
                Type::DATE => v.date_naive().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            Value::Time(v) => match *ty {
                Type::TIME => v.to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            Value::Json(v) => match *ty {
                Type::JSON | Type::JSONB => v.to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            Value::Uuid(v) => match *ty {
                Type::UUID => v.to_sql(ty, out),
                Type::TEXT | Type::VARCHAR => v.to_string().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            Value::Bytes(v) => match *ty {
                Type::BYTEA => v.to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
        }
    }

    // Coercion is decided per type in `to_sql`.
    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

/// `interval`, exposed as an ISO 8601 duration such as `P1Y2M3DT4H5M6.5S`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Interval {
    months: i32,
    days: i32,
    micros: i64,
}

impl<'a> FromSql<'a> for Interval {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        let raw: &[u8; 16] = raw.try_into().map_err(|_| "invalid interval length")?;
        let (micros, rest) = raw.split_at(8);
        let (days, months) = rest.split_at(4);
        Ok(Interval {
            micros: i64::from_be_bytes(micros.try_into()?),
            days: i32::from_be_bytes(days.try_into()?),
            months: i32::from_be_bytes(months.try_into()?),
        })
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::INTERVAL
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.months == 0 && self.days == 0 && self.micros == 0 {
            return f.write_str("PT0S");
        }
        f.write_str("P")?;
        let (years, months) = (self.months / 12, self.months % 12);
        if years != 0 {
            write!(f, "{years}Y")?;
        }
        if months != 0 {
            write!(f, "{months}M")?;
        }
        if self.days != 0 {
            write!(f, "{}D", self.days)?;
        }
        if self.micros == 0 {
            return Ok(());
        }

        let sign = if self.micros < 0 { "-" } else { "" };
        let abs = self.micros.unsigned_abs();
        let (hours, minutes) = (abs / 3_600_000_000, abs / 60_000_000 % 60);
        let (seconds, fraction) = (abs / 1_000_000 % 60, abs % 1_000_000);
        f.write_str("T")?;
        if hours != 0 {
            write!(f, "{sign}{hours}H")?;
        }
        if minutes != 0 {
            write!(f, "{sign}{minutes}M")?;
        }
        if fraction != 0 {
            let fraction = format!("{fraction:06}");
            write!(f, "{sign}{seconds}.{}S", fraction.trim_end_matches('0'))?;
        } else if seconds != 0 {
            write!(f, "{sign}{seconds}S")?;
        }
        Ok(())
    }
}

/// Decode column `idx` of `row` into a [`Value`], dispatching on the column's Postgres type.
///
/// Arrays of supported element types decode to [`Value::Json`] arrays and `interval` to
/// ISO 8601 text. Types with no [`Value`] form decode to [`Value::Null`] with a warning, so
/// one exotic column does not fail the whole result set.
pub(crate) fn decode_column(row: &Row, idx: usize) -> SessionResult<Value> {
    fn get<'a, T>(row: &'a Row, idx: usize) -> Result<Value, tokio_postgres::Error>
    where
        T: FromSql<'a> + Into<Value>,
    {
        row.try_get::<_, Option<T>>(idx).map(Value::from)
    }

    let column = &row.columns()[idx];
    let decoded = match *column.type_() {
        Type::BOOL => get::<bool>(row, idx),
        Type::INT2 => get::<i16>(row, idx),
        Type::INT4 => get::<i32>(row, idx),
        Type::INT8 => get::<i64>(row, idx),
        Type::OID => get::<u32>(row, idx),
        Type::FLOAT4 => get::<f32>(row, idx),
        Type::FLOAT8 => get::<f64>(row, idx),
        #[cfg(feature = "rust_decimal")]
        Type::NUMERIC => get::<rust_decimal::Decimal>(row, idx),
        Type::DATE => get::<NaiveDate>(row, idx),
        Type::TIMESTAMP => get::<NaiveDateTime>(row, idx),
        Type::TIMESTAMPTZ => get::<DateTime<Utc>>(row, idx),
        Type::TIME => get::<NaiveTime>(row, idx),
        Type::INTERVAL => row
            .try_get::<_, Option<Interval>>(idx)
            .map(|v| v.map_or(Value::Null, |i| Value::Text(i.to_string()))),
        Type::JSON | Type::JSONB => get::<serde_json::Value>(row, idx),
        Type::UUID => get::<Uuid>(row, idx),
        Type::BYTEA => get::<Vec<u8>>(row, idx),
        _ => match column.type_().kind() {
            Kind::Array(member) => match decode_array(row, idx, member) {
                Some(decoded) => decoded,
                None => Ok(unsupported(column)),
            },
            _ if <String as FromSql>::accepts(column.type_()) => get::<String>(row, idx),
            _ => Ok(unsupported(column)),
        },
    };
    decoded.map_err(|e| SessionError::decode(column.name(), e.to_string()))
}

/// One-dimensional arrays whose element type has a JSON form; `None` for any other element.
fn decode_array(
    row: &Row,
    idx: usize,
    member: &Type,
) -> Option<Result<Value, tokio_postgres::Error>> {
    fn items<'a, T>(row: &'a Row, idx: usize) -> Option<Result<Value, tokio_postgres::Error>>
    where
        T: FromSql<'a> + Serialize,
    {
        let decoded = row.try_get::<_, Option<Vec<Option<T>>>>(idx).map(|items| {
            items.map_or(Value::Null, |items| {
                Value::Json(serde_json::to_value(items).unwrap_or_default())
            })
        });
        Some(decoded)
    }

    match *member {
        Type::BOOL => items::<bool>(row, idx),
        Type::INT2 => items::<i16>(row, idx),
        Type::INT4 => items::<i32>(row, idx),
        Type::INT8 => items::<i64>(row, idx),
        Type::OID => items::<u32>(row, idx),
        Type::FLOAT4 => items::<f32>(row, idx),
        Type::FLOAT8 => items::<f64>(row, idx),
        #[cfg(feature = "rust_decimal")]
        Type::NUMERIC => items::<rust_decimal::Decimal>(row, idx),
        Type::DATE => items::<NaiveDate>(row, idx),
        Type::TIMESTAMP => items::<NaiveDateTime>(row, idx),
        Type::TIMESTAMPTZ => items::<DateTime<Utc>>(row, idx),
        Type::TIME => items::<NaiveTime>(row, idx),
        Type::JSON | Type::JSONB => items::<serde_json::Value>(row, idx),
        Type::UUID => items::<Uuid>(row, idx),
        _ if <String as FromSql>::accepts(member) => items::<String>(row, idx),
        _ => None,
    }
}

fn unsupported(column: &tokio_postgres::Column) -> Value {
    #[cfg(feature = "tracing")]
    tracing::warn!(
        target: "pgsession",
        column = column.name(),
        column_type = %column.type_(),
        "no value mapping for column type, decoded as null"
    );
    #[cfg(not(feature = "tracing"))]
    let _ = column;
    Value::Null
}

/// An ordered mapping from column name to [`Value`].
///
/// Iteration order is insertion order; it decides the column order of emitted SQL and must
/// line up with the positional parameters. Inserting an existing key replaces its value in
/// place, so the column keeps its original position.
///
/// ```ignore
/// use pgsession::DataMap;
///
/// let data = DataMap::new().with("name", "alice").with("age", 31);
/// assert_eq!(data.keys().collect::<Vec<_>>(), ["name", "age"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(into = "serde_json::Map<String, serde_json::Value>")]
pub struct DataMap {
    entries: Vec<(String, Value)>,
}

impl DataMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a column value, returning the previous value.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let column = column.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == column) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((column, value));
                None
            }
        }
    }

    /// Builder form of [`DataMap::insert`].
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == column)
            .map(|(_, v)| v)
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        let pos = self.entries.iter().position(|(k, _)| k == column)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn contains_key(&self, column: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == column)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl ExactSizeIterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl ExactSizeIterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn into_values(self) -> Vec<Value> {
        self.entries.into_iter().map(|(_, v)| v).collect()
    }

    /// True when both maps hold the same columns in the same order.
    pub fn same_columns(&self, other: &DataMap) -> bool {
        self.len() == other.len() && self.keys().zip(other.keys()).all(|(a, b)| a == b)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for DataMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = DataMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl IntoIterator for DataMap {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl From<DataMap> for serde_json::Map<String, serde_json::Value> {
    fn from(map: DataMap) -> Self {
        map.into_iter()
            .map(|(k, v)| {
                let json = serde_json::to_value(&v).unwrap_or(serde_json::Value::Null);
                (k, json)
            })
            .collect()
    }
}
