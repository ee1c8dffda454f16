//! Table discovery and row streaming from MySQL.

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use rust_decimal::Decimal;
use sqlx::mysql::types::MySqlTime;
use sqlx::mysql::MySqlRow;
use sqlx::{Column, Row as _, TypeInfo, ValueRef};
use tracing::debug;

use super::handle::{statement_error, MysqlHandle};
use crate::core::identifier::quote_mysql;
use crate::core::{Row, SourceReader, SourceRow, SqlNullType, SqlValue, TableDescriptor};
use crate::error::{MigrateError, Result};

/// Tables and views of the current database with their columns.
///
/// Names are cast to CHAR because some server versions report them as
/// binary strings.
const LIST_TABLES_SQL: &str = r#"
    SELECT
        CAST(c.TABLE_NAME AS CHAR(255)) AS TABLE_NAME,
        CAST(c.COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME
    FROM INFORMATION_SCHEMA.COLUMNS c
    JOIN INFORMATION_SCHEMA.TABLES t
        ON t.TABLE_SCHEMA = c.TABLE_SCHEMA AND t.TABLE_NAME = c.TABLE_NAME
    WHERE c.TABLE_SCHEMA = DATABASE()
      AND t.TABLE_TYPE IN ('BASE TABLE', 'VIEW')
    ORDER BY c.TABLE_NAME, c.ORDINAL_POSITION
"#;

#[async_trait]
impl SourceReader for MysqlHandle {
    async fn list_tables(&mut self) -> Result<Vec<TableDescriptor>> {
        self.require_database()?;

        let rows: Vec<(String, String)> = sqlx::query_as(LIST_TABLES_SQL)
            .fetch_all(&mut self.conn)
            .await
            .map_err(statement_error)?;

        let tables = group_columns(rows);
        debug!("Discovered {} source tables", tables.len());
        Ok(tables)
    }

    fn select_all_sql(&self, table: &TableDescriptor) -> Result<String> {
        Ok(format!("SELECT * FROM {}", quote_mysql(&table.name)?))
    }

    fn fetch_rows<'a>(&'a mut self, sql: &'a str) -> BoxStream<'a, Result<SourceRow>> {
        if let Err(e) = self.require_database() {
            return stream::once(async move { Err(e) }).boxed();
        }

        let mut header: Option<Arc<[String]>> = None;
        sqlx::query(sql)
            .fetch(&mut self.conn)
            .map(move |row| -> Result<SourceRow> {
                let row = row.map_err(statement_error)?;
                let columns = header
                    .get_or_insert_with(|| {
                        row.columns().iter().map(|c| c.name().to_string()).collect()
                    })
                    .clone();
                Ok(SourceRow {
                    columns,
                    values: row_to_values(&row)?,
                })
            })
            .boxed()
    }
}

/// Fold `(table, column)` pairs, already ordered by table, into descriptors.
fn group_columns(rows: Vec<(String, String)>) -> Vec<TableDescriptor> {
    let mut tables: Vec<TableDescriptor> = Vec::new();
    for (table, column) in rows {
        match tables.last_mut() {
            Some(last) if last.name == table => last.columns.push(column),
            _ => tables.push(TableDescriptor::new(table, vec![column])),
        }
    }
    tables
}

/// How a column is decoded, picked from the type name sqlx reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    SmallInt,
    Int,
    BigInt,
    Unsigned,
    Float,
    Double,
    Decimal,
    Text,
    Binary,
    Date,
    DateTime,
    Duration,
    Year,
    Bit,
    Other,
}

fn column_kind(type_name: &str) -> ColumnKind {
    match type_name {
        // sqlx reports every TINYINT(1) as BOOLEAN, whatever values it holds.
        "BOOLEAN" | "TINYINT" | "SMALLINT" => ColumnKind::SmallInt,
        "MEDIUMINT" | "INT" => ColumnKind::Int,
        "BIGINT" => ColumnKind::BigInt,
        t if t.ends_with(" UNSIGNED") => ColumnKind::Unsigned,
        "FLOAT" => ColumnKind::Float,
        "DOUBLE" => ColumnKind::Double,
        "DECIMAL" => ColumnKind::Decimal,
        "CHAR" | "VARCHAR" | "TINYTEXT" | "TEXT" | "MEDIUMTEXT" | "LONGTEXT" => ColumnKind::Text,
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
            ColumnKind::Binary
        }
        "DATE" => ColumnKind::Date,
        "DATETIME" | "TIMESTAMP" => ColumnKind::DateTime,
        "TIME" => ColumnKind::Duration,
        "YEAR" => ColumnKind::Year,
        "BIT" => ColumnKind::Bit,
        // ENUM, SET, JSON, GEOMETRY and anything newer
        _ => ColumnKind::Other,
    }
}

/// Decode every column of a row.
///
/// Unrecognized types are read as raw bytes and kept as text when they are
/// valid UTF-8.
fn row_to_values(row: &MySqlRow) -> Result<Row> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let kind = column_kind(col.type_info().name());
            let is_null = row.try_get_raw(i).map(|v| v.is_null()).unwrap_or(true);
            if is_null {
                return Ok(SqlValue::Null(null_type_for(kind)));
            }
            decode_value(row, i, kind).map_err(|e| {
                MigrateError::statement(None, format!("decoding column '{}': {}", col.name(), e))
            })
        })
        .collect()
}

fn decode_value(
    row: &MySqlRow,
    i: usize,
    kind: ColumnKind,
) -> std::result::Result<SqlValue<'static>, sqlx::Error> {
    let value = match kind {
        // A BOOLEAN column may be UNSIGNED, which the signed decode rejects.
        ColumnKind::SmallInt => match row.try_get::<i64, _>(i) {
            Ok(v) => SqlValue::I16(v as i16),
            Err(_) => SqlValue::I16(i16::from(row.try_get::<u8, _>(i)?)),
        },
        ColumnKind::Int => SqlValue::I32(row.try_get::<i64, _>(i)? as i32),
        ColumnKind::BigInt => SqlValue::I64(row.try_get::<i64, _>(i)?),
        ColumnKind::Unsigned => {
            let v = row.try_get::<u64, _>(i)?;
            match i64::try_from(v) {
                Ok(v) => SqlValue::I64(v),
                Err(_) => SqlValue::Decimal(Decimal::from(v)),
            }
        }
        ColumnKind::Float => SqlValue::F32(row.try_get::<f32, _>(i)?),
        ColumnKind::Double => SqlValue::F64(row.try_get::<f64, _>(i)?),
        ColumnKind::Decimal => SqlValue::Decimal(row.try_get::<Decimal, _>(i)?),
        ColumnKind::Text => SqlValue::Text(Cow::Owned(row.try_get::<String, _>(i)?)),
        ColumnKind::Binary => SqlValue::Bytes(Cow::Owned(row.try_get::<Vec<u8>, _>(i)?)),
        // Zero dates ('0000-00-00') have no chrono equivalent and become NULL.
        ColumnKind::Date => row
            .try_get::<chrono::NaiveDate, _>(i)
            .map(SqlValue::Date)
            .unwrap_or(SqlValue::Null(SqlNullType::Date)),
        ColumnKind::DateTime => row
            .try_get::<chrono::NaiveDateTime, _>(i)
            .map(SqlValue::DateTime)
            .unwrap_or(SqlValue::Null(SqlNullType::DateTime)),
        ColumnKind::Duration => {
            SqlValue::Text(Cow::Owned(format_duration(&row.try_get::<MySqlTime, _>(i)?)))
        }
        ColumnKind::Year => SqlValue::I32(i32::from(row.try_get_unchecked::<u16, _>(i)?)),
        ColumnKind::Bit => {
            let bytes = row.try_get_unchecked::<Vec<u8>, _>(i)?;
            let v = bytes.iter().fold(0i64, |acc, b| (acc << 8) | i64::from(*b));
            SqlValue::I64(v)
        }
        ColumnKind::Other => {
            let bytes = row.try_get_unchecked::<Vec<u8>, _>(i)?;
            match String::from_utf8(bytes) {
                Ok(s) => SqlValue::Text(Cow::Owned(s)),
                Err(e) => SqlValue::Bytes(Cow::Owned(e.into_bytes())),
            }
        }
    };
    Ok(value)
}

/// Render a MySQL TIME as `[-]HH:MM:SS[.ffffff]`.
///
/// TIME is a signed duration up to 838:59:59, so it is carried as text
/// rather than as a time of day.
fn format_duration(t: &MySqlTime) -> String {
    let sign = if t.is_negative() { "-" } else { "" };
    let mut out = format!(
        "{}{:02}:{:02}:{:02}",
        sign,
        t.hours(),
        t.minutes(),
        t.seconds()
    );
    if t.microseconds() != 0 {
        out.push_str(&format!(".{:06}", t.microseconds()));
    }
    out
}

/// NULL type hint for a column kind.
fn null_type_for(kind: ColumnKind) -> SqlNullType {
    match kind {
        ColumnKind::SmallInt => SqlNullType::I16,
        ColumnKind::Int | ColumnKind::Year => SqlNullType::I32,
        ColumnKind::BigInt | ColumnKind::Unsigned | ColumnKind::Bit => SqlNullType::I64,
        ColumnKind::Float => SqlNullType::F32,
        ColumnKind::Double => SqlNullType::F64,
        ColumnKind::Decimal => SqlNullType::Decimal,
        ColumnKind::Binary => SqlNullType::Bytes,
        ColumnKind::Date => SqlNullType::Date,
        ColumnKind::DateTime => SqlNullType::DateTime,
        ColumnKind::Text | ColumnKind::Duration | ColumnKind::Other => SqlNullType::String,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::mysql::types::MySqlTimeSign;

    #[test]
    fn test_group_columns_keeps_order() {
        let rows = vec![
            ("orders".to_string(), "id".to_string()),
            ("orders".to_string(), "total_amount".to_string()),
            ("users".to_string(), "id".to_string()),
            ("users".to_string(), "first_name".to_string()),
        ];
        let tables = group_columns(rows);
        assert_eq!(
            tables,
            vec![
                TableDescriptor::new("orders", vec!["id".into(), "total_amount".into()]),
                TableDescriptor::new("users", vec!["id".into(), "first_name".into()]),
            ]
        );
    }

    #[test]
    fn test_group_columns_empty() {
        assert!(group_columns(Vec::new()).is_empty());
    }

    #[test]
    fn test_column_kind_mapping() {
        assert_eq!(column_kind("BOOLEAN"), ColumnKind::SmallInt);
        assert_eq!(column_kind("TINYINT"), ColumnKind::SmallInt);
        assert_eq!(column_kind("INT"), ColumnKind::Int);
        assert_eq!(column_kind("TINYINT UNSIGNED"), ColumnKind::Unsigned);
        assert_eq!(column_kind("BIGINT UNSIGNED"), ColumnKind::Unsigned);
        assert_eq!(column_kind("VARCHAR"), ColumnKind::Text);
        assert_eq!(column_kind("LONGBLOB"), ColumnKind::Binary);
        assert_eq!(column_kind("TIME"), ColumnKind::Duration);
        assert_eq!(column_kind("JSON"), ColumnKind::Other);
    }

    #[test]
    fn test_tinyint_one_is_not_boolean() {
        // Values like 2 or 255 in a TINYINT(1) must survive as integers.
        assert_eq!(null_type_for(column_kind("BOOLEAN")), SqlNullType::I16);
        assert_ne!(null_type_for(column_kind("BOOLEAN")), SqlNullType::Bool);
    }

    #[test]
    fn test_null_type_for() {
        assert_eq!(null_type_for(column_kind("INT")), SqlNullType::I32);
        assert_eq!(null_type_for(column_kind("INT UNSIGNED")), SqlNullType::I64);
        assert_eq!(null_type_for(column_kind("DATETIME")), SqlNullType::DateTime);
        assert_eq!(null_type_for(column_kind("LONGBLOB")), SqlNullType::Bytes);
        assert_eq!(null_type_for(column_kind("TIME")), SqlNullType::String);
        assert_eq!(null_type_for(column_kind("JSON")), SqlNullType::String);
    }

    #[test]
    fn test_format_duration_covers_full_time_range() {
        let t = |sign, h, m, s, us| MySqlTime::new(sign, h, m, s, us).unwrap();
        assert_eq!(format_duration(&t(MySqlTimeSign::Positive, 8, 5, 0, 0)), "08:05:00");
        assert_eq!(format_duration(&t(MySqlTimeSign::Positive, 25, 0, 0, 0)), "25:00:00");
        assert_eq!(
            format_duration(&t(MySqlTimeSign::Negative, 838, 59, 59, 0)),
            "-838:59:59"
        );
        assert_eq!(
            format_duration(&t(MySqlTimeSign::Positive, 0, 0, 1, 500)),
            "00:00:01.000500"
        );
    }
}
