//! Typed cell values moved from MySQL to PostgreSQL and on into the report.

use std::borrow::Cow;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Type hint carried by a NULL so an all-NULL column still gets a target type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlNullType {
    Bool,
    I16,
    I32,
    I64,
    F32,
    F64,
    String,
    Bytes,
    Uuid,
    Decimal,
    DateTime,
    DateTimeOffset,
    Date,
    Time,
}

impl SqlNullType {
    /// PostgreSQL column type used when a table is created from data.
    ///
    /// Integers widen to BIGINT and floats to DOUBLE PRECISION so that later
    /// chunks with larger values still fit.
    #[must_use]
    pub fn pg_type(self) -> &'static str {
        match self {
            SqlNullType::Bool => "BOOLEAN",
            SqlNullType::I16 | SqlNullType::I32 | SqlNullType::I64 => "BIGINT",
            SqlNullType::F32 | SqlNullType::F64 => "DOUBLE PRECISION",
            SqlNullType::String => "TEXT",
            SqlNullType::Bytes => "BYTEA",
            SqlNullType::Uuid => "UUID",
            SqlNullType::Decimal => "NUMERIC",
            SqlNullType::DateTime => "TIMESTAMP",
            SqlNullType::DateTimeOffset => "TIMESTAMPTZ",
            SqlNullType::Date => "DATE",
            SqlNullType::Time => "TIME",
        }
    }

    fn is_integer(self) -> bool {
        matches!(self, SqlNullType::I16 | SqlNullType::I32 | SqlNullType::I64)
    }

    fn is_float(self) -> bool {
        matches!(self, SqlNullType::F32 | SqlNullType::F64)
    }

    /// Combine the types of two values seen in the same column.
    ///
    /// Equal kinds keep their type, integers mixed with floats become F64 and
    /// anything else degrades to String.
    #[must_use]
    pub fn unify(self, other: SqlNullType) -> SqlNullType {
        if self.pg_type() == other.pg_type() {
            return self;
        }
        let numeric = |t: SqlNullType| t.is_integer() || t.is_float();
        if numeric(self) && numeric(other) {
            return SqlNullType::F64;
        }
        SqlNullType::String
    }
}

/// A single cell value.
///
/// Text and bytes use `Cow` so drivers can hand out borrowed data; rows kept
/// beyond a read are converted with [`SqlValue::into_owned`].
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue<'a> {
    /// NULL with a type hint.
    Null(SqlNullType),
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Text(Cow<'a, str>),
    Bytes(Cow<'a, [u8]>),
    Uuid(Uuid),
    /// Exact numeric (DECIMAL/NUMERIC).
    Decimal(Decimal),
    /// Timestamp without time zone.
    DateTime(NaiveDateTime),
    /// Timestamp with time zone offset.
    DateTimeOffset(DateTime<FixedOffset>),
    Date(NaiveDate),
    Time(NaiveTime),
}

/// One row of owned values.
pub type Row = Vec<SqlValue<'static>>;

impl<'a> SqlValue<'a> {
    /// Convert to a fully owned value with `'static` lifetime.
    #[must_use]
    pub fn into_owned(self) -> SqlValue<'static> {
        match self {
            SqlValue::Null(t) => SqlValue::Null(t),
            SqlValue::Bool(v) => SqlValue::Bool(v),
            SqlValue::I16(v) => SqlValue::I16(v),
            SqlValue::I32(v) => SqlValue::I32(v),
            SqlValue::I64(v) => SqlValue::I64(v),
            SqlValue::F32(v) => SqlValue::F32(v),
            SqlValue::F64(v) => SqlValue::F64(v),
            SqlValue::Text(v) => SqlValue::Text(Cow::Owned(v.into_owned())),
            SqlValue::Bytes(v) => SqlValue::Bytes(Cow::Owned(v.into_owned())),
            SqlValue::Uuid(v) => SqlValue::Uuid(v),
            SqlValue::Decimal(v) => SqlValue::Decimal(v),
            SqlValue::DateTime(v) => SqlValue::DateTime(v),
            SqlValue::DateTimeOffset(v) => SqlValue::DateTimeOffset(v),
            SqlValue::Date(v) => SqlValue::Date(v),
            SqlValue::Time(v) => SqlValue::Time(v),
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null(_))
    }

    /// The value's type, or the hint for a NULL.
    #[must_use]
    pub fn null_type(&self) -> SqlNullType {
        match self {
            SqlValue::Null(t) => *t,
            SqlValue::Bool(_) => SqlNullType::Bool,
            SqlValue::I16(_) => SqlNullType::I16,
            SqlValue::I32(_) => SqlNullType::I32,
            SqlValue::I64(_) => SqlNullType::I64,
            SqlValue::F32(_) => SqlNullType::F32,
            SqlValue::F64(_) => SqlNullType::F64,
            SqlValue::Text(_) => SqlNullType::String,
            SqlValue::Bytes(_) => SqlNullType::Bytes,
            SqlValue::Uuid(_) => SqlNullType::Uuid,
            SqlValue::Decimal(_) => SqlNullType::Decimal,
            SqlValue::DateTime(_) => SqlNullType::DateTime,
            SqlValue::DateTimeOffset(_) => SqlNullType::DateTimeOffset,
            SqlValue::Date(_) => SqlNullType::Date,
            SqlValue::Time(_) => SqlNullType::Time,
        }
    }

    /// Owned text value.
    #[must_use]
    pub fn text_owned(s: impl Into<String>) -> SqlValue<'static> {
        SqlValue::Text(Cow::Owned(s.into()))
    }
}

/// Infer one PostgreSQL type per column from a chunk of rows.
///
/// Non-NULL values decide the type. A column holding only NULLs uses the
/// first NULL's hint. A column with no rows at all is TEXT.
#[must_use]
pub fn infer_column_types(column_count: usize, rows: &[Row]) -> Vec<&'static str> {
    (0..column_count)
        .map(|idx| {
            let mut seen: Option<SqlNullType> = None;
            let mut null_hint: Option<SqlNullType> = None;
            for value in rows.iter().filter_map(|row| row.get(idx)) {
                match value {
                    SqlValue::Null(hint) => {
                        null_hint.get_or_insert(*hint);
                    }
                    other => {
                        let t = other.null_type();
                        seen = Some(match seen {
                            Some(prev) => prev.unify(t),
                            None => t,
                        });
                    }
                }
            }
            seen.or(null_hint).unwrap_or(SqlNullType::String).pg_type()
        })
        .collect()
}
