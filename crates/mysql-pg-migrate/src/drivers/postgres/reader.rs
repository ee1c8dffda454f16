//! Reading target tables back for the report.

use std::borrow::Cow;

use async_trait::async_trait;
use tracing::debug;

use super::handle::PostgresHandle;
use crate::core::identifier::qualify_pg;
use crate::core::{ReportSource, Row, SqlNullType, SqlValue, TableData};
use crate::error::{MigrateError, Result};

#[async_trait]
impl ReportSource for PostgresHandle {
    async fn list_tables(&mut self) -> Result<Vec<String>> {
        self.require_database()?;
        let sql = r#"
            SELECT table_name::text
            FROM information_schema.tables
            WHERE table_schema::text = $1
            ORDER BY table_name
        "#;
        let rows = self
            .client
            .query(sql, &[&self.schema])
            .await
            .map_err(|e| MigrateError::Export(format!("listing tables: {}", e)))?;
        Ok(rows.iter().map(|r| r.get::<_, String>(0)).collect())
    }

    async fn fetch_table(&mut self, table: &str) -> Result<TableData> {
        self.require_database()?;
        let export_err = |e: tokio_postgres::Error| {
            MigrateError::Export(format!("reading table {}: {}", table, e))
        };

        let sql = format!("SELECT * FROM {}", qualify_pg(&self.schema, table)?);
        let stmt = self.client.prepare(&sql).await.map_err(export_err)?;
        let columns: Vec<String> = stmt.columns().iter().map(|c| c.name().to_string()).collect();
        let type_names: Vec<String> = stmt
            .columns()
            .iter()
            .map(|c| c.type_().name().to_string())
            .collect();

        let pg_rows = self.client.query(&stmt, &[]).await.map_err(export_err)?;
        let rows = pg_rows
            .iter()
            .map(|row| {
                type_names
                    .iter()
                    .enumerate()
                    .map(|(idx, ty)| convert_pg_value(row, idx, ty).map_err(export_err))
                    .collect::<Result<Row>>()
            })
            .collect::<Result<Vec<Row>>>()?;

        debug!("Read {} rows from {}", rows.len(), table);
        Ok(TableData { columns, rows })
    }
}

/// Decode one column by its PostgreSQL type name.
fn convert_pg_value(
    row: &tokio_postgres::Row,
    idx: usize,
    type_name: &str,
) -> std::result::Result<SqlValue<'static>, tokio_postgres::Error> {
    let value = match type_name {
        "bool" => row
            .try_get::<_, Option<bool>>(idx)?
            .map_or(SqlValue::Null(SqlNullType::Bool), SqlValue::Bool),
        "int2" => row
            .try_get::<_, Option<i16>>(idx)?
            .map_or(SqlValue::Null(SqlNullType::I16), SqlValue::I16),
        "int4" => row
            .try_get::<_, Option<i32>>(idx)?
            .map_or(SqlValue::Null(SqlNullType::I32), SqlValue::I32),
        "int8" => row
            .try_get::<_, Option<i64>>(idx)?
            .map_or(SqlValue::Null(SqlNullType::I64), SqlValue::I64),
        "float4" => row
            .try_get::<_, Option<f32>>(idx)?
            .map_or(SqlValue::Null(SqlNullType::F32), SqlValue::F32),
        "float8" => row
            .try_get::<_, Option<f64>>(idx)?
            .map_or(SqlValue::Null(SqlNullType::F64), SqlValue::F64),
        "numeric" => row
            .try_get::<_, Option<rust_decimal::Decimal>>(idx)?
            .map_or(SqlValue::Null(SqlNullType::Decimal), SqlValue::Decimal),
        "uuid" => row
            .try_get::<_, Option<uuid::Uuid>>(idx)?
            .map_or(SqlValue::Null(SqlNullType::Uuid), SqlValue::Uuid),
        "timestamp" => row
            .try_get::<_, Option<chrono::NaiveDateTime>>(idx)?
            .map_or(SqlValue::Null(SqlNullType::DateTime), SqlValue::DateTime),
        "timestamptz" => row
            .try_get::<_, Option<chrono::DateTime<chrono::FixedOffset>>>(idx)?
            .map_or(
                SqlValue::Null(SqlNullType::DateTimeOffset),
                SqlValue::DateTimeOffset,
            ),
        "date" => row
            .try_get::<_, Option<chrono::NaiveDate>>(idx)?
            .map_or(SqlValue::Null(SqlNullType::Date), SqlValue::Date),
        "time" => row
            .try_get::<_, Option<chrono::NaiveTime>>(idx)?
            .map_or(SqlValue::Null(SqlNullType::Time), SqlValue::Time),
        "bytea" => row
            .try_get::<_, Option<Vec<u8>>>(idx)?
            .map_or(SqlValue::Null(SqlNullType::Bytes), |b| {
                SqlValue::Bytes(Cow::Owned(b))
            }),
        "json" | "jsonb" => row
            .try_get::<_, Option<serde_json::Value>>(idx)?
            .map_or(SqlValue::Null(SqlNullType::String), |v| {
                SqlValue::Text(Cow::Owned(v.to_string()))
            }),
        _ => row
            .try_get::<_, Option<String>>(idx)?
            .map_or(SqlValue::Null(SqlNullType::String), |s| {
                SqlValue::Text(Cow::Owned(s))
            }),
    };
    Ok(value)
}
