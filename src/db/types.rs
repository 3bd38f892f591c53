//! Database-agnostic type mappings.
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Database-specific decoders extract a [`Value`] for that category
//!
//! Statements run through the simple-query (text) protocol, so every sqlx
//! decoder can fall back to the column's textual form when the typed decode
//! fails. SQL Server and Oracle rows carry their own type tags and are mapped
//! directly.

use crate::models::{Dialect, Row as ResultRow, Value};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::{Column, ColumnIndex, Decode, Row, Type, TypeInfo};
use tracing::{debug, error};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    UnsignedInteger,
    Float,
    Decimal,
    Boolean,
    Date,
    Time,
    DateTime,
    DateTimeTz,
    Binary,
    Json,
    Text,
}

/// Classify a driver-reported type name into a logical category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    let lower = type_name.trim().to_lowercase();

    if lower.ends_with("[]") {
        return TypeCategory::Text;
    }

    if let Some(base) = lower.strip_suffix(" unsigned") {
        return match categorize_type(base) {
            TypeCategory::Integer => TypeCategory::UnsignedInteger,
            other => other,
        };
    }

    match lower.as_str() {
        "decimal" | "numeric" => TypeCategory::Decimal,
        "bool" | "boolean" => TypeCategory::Boolean,
        "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" | "int2" | "int4"
        | "int8" | "serial" | "bigserial" | "year" => TypeCategory::Integer,
        "float" | "double" | "real" | "float4" | "float8" | "double precision" => {
            TypeCategory::Float
        }
        "date" => TypeCategory::Date,
        "time" => TypeCategory::Time,
        // MySQL TIMESTAMP is returned in session time without an offset
        "datetime" | "timestamp" => TypeCategory::DateTime,
        "timestamptz" => TypeCategory::DateTimeTz,
        "json" | "jsonb" => TypeCategory::Json,
        "blob" | "tinyblob" | "mediumblob" | "longblob" | "binary" | "varbinary" | "bytea" => {
            TypeCategory::Binary
        }
        _ => TypeCategory::Text,
    }
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Wrapper type for raw DECIMAL/NUMERIC values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

// =============================================================================
// Row Decoding
// =============================================================================

/// Trait for converting driver rows into ordered result rows.
pub trait DecodeRow {
    fn decode_row(&self) -> ResultRow;
}

impl DecodeRow for MySqlRow {
    fn decode_row(&self) -> ResultRow {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name());
                (col.name().to_string(), mysql::decode_column(self, idx, category))
            })
            .collect()
    }
}

impl DecodeRow for PgRow {
    fn decode_row(&self) -> ResultRow {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name());
                (col.name().to_string(), postgres::decode_column(self, idx, category))
            })
            .collect()
    }
}

impl DecodeRow for ::oracle::Row {
    fn decode_row(&self) -> ResultRow {
        self.column_info()
            .iter()
            .enumerate()
            .map(|(idx, info)| {
                (
                    info.name().to_string(),
                    oracle::decode_column(self, idx, info.oracle_type()),
                )
            })
            .collect()
    }
}

/// Convert an owned TDS row; its cells are consumed in column order.
pub fn decode_tds_row(row: tiberius::Row) -> ResultRow {
    let names: Vec<String> = row
        .columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect();
    names
        .into_iter()
        .zip(row.into_iter().map(sqlserver::decode_column))
        .collect()
}

// =============================================================================
// Common Helper Functions
// =============================================================================

/// Decode a typed value, falling back to the column's text form on mismatch.
fn typed_or_text<'r, R, T>(row: &'r R, idx: usize, wrap: impl FnOnce(T) -> Value) -> Value
where
    R: Row,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database>,
    String: Decode<'r, R::Database>,
{
    match row.try_get::<Option<T>, _>(idx) {
        Ok(Some(v)) => wrap(v),
        Ok(None) => Value::Null,
        Err(e) => {
            debug!(column = idx, error = %e, "Typed decode failed, using text form");
            text_value(row, idx)
        }
    }
}

/// The column's textual form as sent by the server.
fn text_value<'r, R>(row: &'r R, idx: usize) -> Value
where
    R: Row,
    usize: ColumnIndex<R>,
    String: Decode<'r, R::Database>,
{
    match row.try_get_unchecked::<Option<String>, _>(idx) {
        Ok(Some(s)) => Value::Text(s),
        Ok(None) => Value::Null,
        Err(e) => {
            error!(column = idx, error = %e, "Failed to decode column");
            Value::Null
        }
    }
}

/// Reinterpret a text fallback as an integer where possible.
fn integer_from_text(value: Value) -> Value {
    match value {
        Value::Text(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .or_else(|_| s.trim().parse::<u64>().map(Value::UInt))
            .unwrap_or(Value::Text(s)),
        other => other,
    }
}

fn float_from_text(value: Value) -> Value {
    match value {
        Value::Text(s) => s.trim().parse::<f64>().map(Value::Float).unwrap_or(Value::Text(s)),
        other => other,
    }
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================

mod mysql {
    use super::*;

    pub fn decode_column(row: &MySqlRow, idx: usize, category: TypeCategory) -> Value {
        match category {
            TypeCategory::Decimal => typed_or_text(row, idx, |v: RawDecimal| Value::Decimal(v.0)),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::UnsignedInteger => decode_unsigned(row, idx),
            TypeCategory::Boolean => typed_or_text(row, idx, Value::Bool),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Date => typed_or_text(row, idx, |v: NaiveDate| Value::Date(v)),
            TypeCategory::Time => typed_or_text(row, idx, |v: NaiveTime| Value::Time(v)),
            TypeCategory::DateTime => typed_or_text(row, idx, |v: NaiveDateTime| Value::DateTime(v)),
            TypeCategory::DateTimeTz => {
                typed_or_text(row, idx, |v: DateTime<Utc>| Value::DateTimeUtc(v))
            }
            TypeCategory::Binary => typed_or_text(row, idx, Value::Bytes),
            TypeCategory::Json => typed_or_text(row, idx, Value::Json),
            TypeCategory::Text => text_value(row, idx),
        }
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> Value {
        if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            return v.map(Value::Int).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
            return v.map(|v| Value::Int(v.into())).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
            return v.map(|v| Value::Int(v.into())).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<i8>, _>(idx) {
            return v.map(|v| Value::Int(v.into())).unwrap_or(Value::Null);
        }
        integer_from_text(text_value(row, idx))
    }

    fn decode_unsigned(row: &MySqlRow, idx: usize) -> Value {
        if let Ok(v) = row.try_get::<Option<u64>, _>(idx) {
            return v.map(Value::UInt).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<u32>, _>(idx) {
            return v.map(|v| Value::UInt(v.into())).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<u16>, _>(idx) {
            return v.map(|v| Value::UInt(v.into())).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<u8>, _>(idx) {
            return v.map(|v| Value::UInt(v.into())).unwrap_or(Value::Null);
        }
        integer_from_text(text_value(row, idx))
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> Value {
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return v.map(Value::Float).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<f32>, _>(idx) {
            return v.map(|v| Value::Float(v.into())).unwrap_or(Value::Null);
        }
        float_from_text(text_value(row, idx))
    }
}

mod postgres {
    use super::*;

    pub fn decode_column(row: &PgRow, idx: usize, category: TypeCategory) -> Value {
        match category {
            TypeCategory::Decimal => typed_or_text(row, idx, |v: RawDecimal| Value::Decimal(v.0)),
            TypeCategory::Integer | TypeCategory::UnsignedInteger => decode_integer(row, idx),
            TypeCategory::Boolean => typed_or_text(row, idx, Value::Bool),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Date => typed_or_text(row, idx, |v: NaiveDate| Value::Date(v)),
            TypeCategory::Time => typed_or_text(row, idx, |v: NaiveTime| Value::Time(v)),
            TypeCategory::DateTime => typed_or_text(row, idx, |v: NaiveDateTime| Value::DateTime(v)),
            TypeCategory::DateTimeTz => {
                typed_or_text(row, idx, |v: DateTime<Utc>| Value::DateTimeUtc(v))
            }
            TypeCategory::Binary => typed_or_text(row, idx, Value::Bytes),
            TypeCategory::Json => typed_or_text(row, idx, Value::Json),
            TypeCategory::Text => text_value(row, idx),
        }
    }

    fn decode_integer(row: &PgRow, idx: usize) -> Value {
        if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            return v.map(Value::Int).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
            return v.map(|v| Value::Int(v.into())).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
            return v.map(|v| Value::Int(v.into())).unwrap_or(Value::Null);
        }
        integer_from_text(text_value(row, idx))
    }

    fn decode_float(row: &PgRow, idx: usize) -> Value {
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return v.map(Value::Float).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<f32>, _>(idx) {
            return v.map(|v| Value::Float(v.into())).unwrap_or(Value::Null);
        }
        float_from_text(text_value(row, idx))
    }
}

mod sqlserver {
    use super::*;
    use tiberius::{ColumnData, FromSqlOwned};

    fn temporal<T: FromSqlOwned>(data: ColumnData<'static>, wrap: impl FnOnce(T) -> Value) -> Value {
        match T::from_sql_owned(data) {
            Ok(Some(v)) => wrap(v),
            Ok(None) => Value::Null,
            Err(e) => {
                error!(error = %e, "Failed to decode temporal column");
                Value::Null
            }
        }
    }

    pub fn decode_column(data: ColumnData<'static>) -> Value {
        match data {
            ColumnData::U8(v) => v.map(|v| Value::Int(v.into())).unwrap_or(Value::Null),
            ColumnData::I16(v) => v.map(|v| Value::Int(v.into())).unwrap_or(Value::Null),
            ColumnData::I32(v) => v.map(|v| Value::Int(v.into())).unwrap_or(Value::Null),
            ColumnData::I64(v) => v.map(Value::Int).unwrap_or(Value::Null),
            ColumnData::F32(v) => v.map(|v| Value::Float(v.into())).unwrap_or(Value::Null),
            ColumnData::F64(v) => v.map(Value::Float).unwrap_or(Value::Null),
            ColumnData::Bit(v) => v.map(Value::Bool).unwrap_or(Value::Null),
            ColumnData::String(v) => v.map(|s| Value::Text(s.into_owned())).unwrap_or(Value::Null),
            ColumnData::Guid(v) => v.map(|g| Value::Text(g.to_string())).unwrap_or(Value::Null),
            ColumnData::Binary(v) => v.map(|b| Value::Bytes(b.into_owned())).unwrap_or(Value::Null),
            ColumnData::Numeric(v) => v
                .map(|n| Value::Decimal(n.to_string()))
                .unwrap_or(Value::Null),
            ColumnData::Xml(v) => v
                .map(|x| Value::Text(x.into_owned().into_string()))
                .unwrap_or(Value::Null),
            data @ (ColumnData::DateTime(_)
            | ColumnData::SmallDateTime(_)
            | ColumnData::DateTime2(_)) => temporal(data, |v: NaiveDateTime| Value::DateTime(v)),
            data @ ColumnData::Date(_) => temporal(data, |v: NaiveDate| Value::Date(v)),
            data @ ColumnData::Time(_) => temporal(data, |v: NaiveTime| Value::Time(v)),
            data @ ColumnData::DateTimeOffset(_) => {
                temporal(data, |v: DateTime<Utc>| Value::DateTimeUtc(v))
            }
            #[allow(unreachable_patterns)]
            other => {
                debug!(data = ?other, "Unmapped TDS column type, using debug form");
                Value::Text(format!("{:?}", other))
            }
        }
    }
}

mod oracle {
    use super::*;
    use ::oracle::Row as OracleRow;
    use ::oracle::sql_type::{FromSql, OracleType};

    fn typed<T: FromSql>(row: &OracleRow, idx: usize, wrap: impl FnOnce(T) -> Value) -> Value {
        match row.get::<usize, Option<T>>(idx) {
            Ok(Some(v)) => wrap(v),
            Ok(None) => Value::Null,
            Err(e) => {
                debug!(column = idx, error = %e, "Typed decode failed, using text form");
                text(row, idx)
            }
        }
    }

    fn text(row: &OracleRow, idx: usize) -> Value {
        match row.get::<usize, Option<String>>(idx) {
            Ok(Some(s)) => Value::Text(s),
            Ok(None) => Value::Null,
            Err(e) => {
                error!(column = idx, error = %e, "Failed to decode column");
                Value::Null
            }
        }
    }

    pub fn decode_column(row: &OracleRow, idx: usize, ty: &OracleType) -> Value {
        match ty {
            OracleType::Number(_, scale) => {
                let scale = *scale;
                typed(row, idx, |s: String| number_value(s, scale))
            }
            OracleType::Int64 => typed(row, idx, Value::Int),
            OracleType::UInt64 => typed(row, idx, Value::UInt),
            OracleType::Float(_) | OracleType::BinaryFloat | OracleType::BinaryDouble => {
                typed(row, idx, Value::Float)
            }
            OracleType::Boolean => typed(row, idx, Value::Bool),
            OracleType::Date | OracleType::Timestamp(_) => {
                typed(row, idx, |v: NaiveDateTime| Value::DateTime(v))
            }
            OracleType::TimestampTZ(_) | OracleType::TimestampLTZ(_) => {
                typed(row, idx, |v: DateTime<FixedOffset>| {
                    Value::DateTimeUtc(v.with_timezone(&Utc))
                })
            }
            OracleType::Raw(_) | OracleType::LongRaw | OracleType::BLOB => {
                typed(row, idx, Value::Bytes)
            }
            _ => text(row, idx),
        }
    }
}

/// Oracle NUMBER text: whole numbers of integer-scaled columns become
/// integers, everything else stays exact.
///
/// Unconstrained NUMBER reports scale -127.
pub fn number_value(text: String, scale: i8) -> Value {
    if scale <= 0 {
        if let Ok(v) = text.trim().parse::<i64>() {
            return Value::Int(v);
        }
    }
    Value::Decimal(text)
}

// =============================================================================
// Type Normalization
// =============================================================================

/// Normalize a catalog-declared column type to a consistent uppercase spelling.
///
/// PostgreSQL's `format_type` output is folded onto the common short names
/// (`character varying(50)` becomes `VARCHAR(50)`, time-zone qualifiers are
/// dropped) and precision lists are written as `(p, s)`.
pub fn normalize_type_name(declared: &str, dialect: Dialect) -> String {
    let mut name = declared.trim().to_uppercase();

    if dialect.is_postgres_family() {
        for suffix in [" WITHOUT TIME ZONE", " WITH TIME ZONE"] {
            if let Some(stripped) = name.strip_suffix(suffix) {
                name = stripped.to_string();
            }
        }
        for (long, short) in [
            ("CHARACTER VARYING", "VARCHAR"),
            ("CHARACTER", "CHAR"),
            ("BIT VARYING", "VARBIT"),
        ] {
            // Fold whole words only; `characteristic` is a user type
            let Some(rest) = name.strip_prefix(long) else {
                continue;
            };
            if rest.is_empty() || rest.starts_with(['(', '[', ' ']) {
                name = format!("{}{}", short, rest);
                break;
            }
        }
    }

    match (name.find('('), name.find(')')) {
        (Some(open), Some(close)) if open < close => {
            let args = name[open + 1..close]
                .split(',')
                .map(str::trim)
                .collect::<Vec<_>>()
                .join(", ");
            format!("{}({}){}", &name[..open], args, &name[close + 1..])
        }
        _ => name,
    }
}
