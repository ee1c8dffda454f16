//! Schema-on-write and COPY-based appends.

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use futures::SinkExt;
use tracing::{debug, info};

use super::handle::PostgresHandle;
use crate::core::identifier::{qualify_pg, quote_pg};
use crate::core::value::infer_column_types;
use crate::core::{Row, SqlValue, TargetWriter};
use crate::error::{MigrateError, Result};

impl PostgresHandle {
    /// Check whether `table` exists in the target schema.
    pub async fn table_exists(&mut self, table: &str) -> Result<bool> {
        self.require_database()?;
        let sql = r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema::text = $1 AND table_name::text = $2
            )
        "#;
        let row = self
            .client
            .query_one(sql, &[&self.schema, &table])
            .await
            .map_err(|e| MigrateError::transfer(table, format!("checking table: {}", e)))?;
        Ok(row.get::<_, bool>(0))
    }
}

#[async_trait]
impl TargetWriter for PostgresHandle {
    async fn create_or_append(
        &mut self,
        table: &str,
        columns: &[String],
        rows: Vec<Row>,
    ) -> Result<u64> {
        self.require_database()?;
        let qualified = qualify_pg(&self.schema, table)?;

        if !self.table_exists(table).await? {
            let types = infer_column_types(columns.len(), &rows);
            let ddl = create_table_sql(&qualified, columns, &types)?;
            self.client
                .batch_execute(&ddl)
                .await
                .map_err(|e| MigrateError::transfer(table, format!("creating table: {}", e)))?;
            info!("Created table {} with {} columns", qualified, columns.len());
        }

        if rows.is_empty() {
            return Ok(0);
        }

        let data = encode_copy_text(table, columns.len(), &rows)?;
        let copy_sql = copy_in_sql(&qualified, columns)?;

        let sink = self
            .client
            .copy_in(copy_sql.as_str())
            .await
            .map_err(|e| MigrateError::transfer(table, format!("COPY init: {}", e)))?;
        tokio::pin!(sink);
        sink.send(data.freeze())
            .await
            .map_err(|e| MigrateError::transfer(table, format!("COPY send: {}", e)))?;
        let written = sink
            .finish()
            .await
            .map_err(|e| MigrateError::transfer(table, format!("COPY finish: {}", e)))?;

        debug!("Appended {} rows to {}", written, qualified);
        Ok(written)
    }
}

fn create_table_sql(qualified: &str, columns: &[String], types: &[&str]) -> Result<String> {
    let defs = columns
        .iter()
        .zip(types)
        .map(|(col, ty)| Ok(format!("{} {}", quote_pg(col)?, ty)))
        .collect::<Result<Vec<_>>>()?;
    Ok(format!("CREATE TABLE {} ({})", qualified, defs.join(", ")))
}

fn copy_in_sql(qualified: &str, columns: &[String]) -> Result<String> {
    let cols = columns
        .iter()
        .map(|c| quote_pg(c))
        .collect::<Result<Vec<_>>>()?;
    Ok(format!(
        "COPY {} ({}) FROM STDIN",
        qualified,
        cols.join(", ")
    ))
}

/// Encode rows as COPY text: tab-separated fields, newline-terminated rows.
fn encode_copy_text(table: &str, width: usize, rows: &[Row]) -> Result<BytesMut> {
    let mut buf = BytesMut::with_capacity(rows.len() * 64);
    for (idx, row) in rows.iter().enumerate() {
        if row.len() != width {
            return Err(MigrateError::transfer(
                table,
                format!("row {} has {} values, expected {}", idx, row.len(), width),
            ));
        }
        for (i, value) in row.iter().enumerate() {
            if i > 0 {
                buf.put_u8(b'\t');
            }
            buf.put_slice(value_to_text(value).as_bytes());
        }
        buf.put_u8(b'\n');
    }
    Ok(buf)
}

/// Render one value in COPY text format.
fn value_to_text(value: &SqlValue<'_>) -> String {
    match value {
        SqlValue::Null(_) => "\\N".to_string(),
        SqlValue::Bool(b) => if *b { "t" } else { "f" }.to_string(),
        SqlValue::I16(i) => i.to_string(),
        SqlValue::I32(i) => i.to_string(),
        SqlValue::I64(i) => i.to_string(),
        SqlValue::F32(f) => float_to_text(*f),
        SqlValue::F64(f) => float_to_text(*f),
        SqlValue::Text(s) => escape_copy_text(s),
        SqlValue::Bytes(b) => format!("\\\\x{}", hex::encode(b.as_ref())),
        SqlValue::Uuid(u) => u.to_string(),
        SqlValue::Decimal(d) => d.to_string(),
        SqlValue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
        SqlValue::DateTimeOffset(dto) => dto.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string(),
        SqlValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        SqlValue::Time(t) => t.format("%H:%M:%S%.f").to_string(),
    }
}

/// Shortest text that round-trips in the value's own width.
fn float_to_text<F>(f: F) -> String
where
    F: Into<f64> + ToString + Copy,
{
    let wide: f64 = f.into();
    if wide.is_nan() {
        "NaN".to_string()
    } else if wide.is_infinite() {
        if wide > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        f.to_string()
    }
}

fn escape_copy_text(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '\t' => result.push_str("\\t"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SqlNullType;
    use chrono::NaiveDate;
    use std::borrow::Cow;

    #[test]
    fn test_value_to_text() {
        assert_eq!(value_to_text(&SqlValue::Null(SqlNullType::I32)), "\\N");
        assert_eq!(value_to_text(&SqlValue::Bool(true)), "t");
        assert_eq!(value_to_text(&SqlValue::I64(-7)), "-7");
        assert_eq!(
            value_to_text(&SqlValue::Bytes(Cow::Owned(vec![0xde, 0xad]))),
            "\\\\xdead"
        );
        let d = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(value_to_text(&SqlValue::Date(d)), "2024-02-29");
        let dt = d.and_hms_opt(13, 5, 9).unwrap();
        assert_eq!(value_to_text(&SqlValue::DateTime(dt)), "2024-02-29 13:05:09");
    }

    #[test]
    fn test_special_floats() {
        assert_eq!(value_to_text(&SqlValue::F64(f64::NAN)), "NaN");
        assert_eq!(value_to_text(&SqlValue::F64(f64::INFINITY)), "Infinity");
        assert_eq!(value_to_text(&SqlValue::F32(f32::NEG_INFINITY)), "-Infinity");
        assert_eq!(value_to_text(&SqlValue::F64(2.5)), "2.5");
    }

    #[test]
    fn test_f32_keeps_single_precision_text() {
        assert_eq!(value_to_text(&SqlValue::F32(0.1)), "0.1");
        assert_eq!(value_to_text(&SqlValue::F32(f32::NAN)), "NaN");
        assert_eq!(value_to_text(&SqlValue::F64(0.1)), "0.1");
    }

    #[test]
    fn test_escape_copy_text() {
        assert_eq!(escape_copy_text("a\tb\nc\\d\re"), "a\\tb\\nc\\\\d\\re");
        assert_eq!(escape_copy_text("plain"), "plain");
    }

    #[test]
    fn test_encode_copy_text() {
        let rows: Vec<Row> = vec![
            vec![SqlValue::I32(1), SqlValue::text_owned("Ann")],
            vec![SqlValue::I32(2), SqlValue::Null(SqlNullType::String)],
        ];
        let buf = encode_copy_text("users", 2, &rows).unwrap();
        assert_eq!(&buf[..], b"1\tAnn\n2\t\\N\n");
    }

    #[test]
    fn test_encode_copy_text_rejects_ragged_rows() {
        let rows: Vec<Row> = vec![vec![SqlValue::I32(1)]];
        let err = encode_copy_text("users", 2, &rows).unwrap_err();
        assert!(matches!(err, MigrateError::Transfer { .. }));
    }

    #[test]
    fn test_create_table_sql() {
        let sql = create_table_sql(
            "\"public\".\"users\"",
            &["id".to_string(), "firstName".to_string()],
            &["BIGINT", "TEXT"],
        )
        .unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE \"public\".\"users\" (\"id\" BIGINT, \"firstName\" TEXT)"
        );
    }

    #[test]
    fn test_copy_in_sql() {
        let sql = copy_in_sql("\"public\".\"users\"", &["id".to_string(), "firstName".to_string()])
            .unwrap();
        assert_eq!(
            sql,
            "COPY \"public\".\"users\" (\"id\", \"firstName\") FROM STDIN"
        );
    }
}
