//! Streaming table copy from source to target.
//!
//! Each table is read through one server-side cursor and written in chunks
//! of at most `chunk_size` rows, so memory holds a single chunk at a time.
//! Tables are copied one after another in discovery order and chunks are
//! appended in the order they were read.

use std::time::{Duration, Instant};

use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, info};

use crate::core::{ColumnNameMapping, RowChunk, SourceReader, TableDescriptor, TargetWriter};
use crate::error::{MigrateError, Result};

/// Per-table copy statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableCopyStats {
    pub table: String,
    pub rows: u64,
    pub chunks: usize,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

/// Statistics for a whole copy run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CopyStats {
    pub tables: Vec<TableCopyStats>,
}

impl CopyStats {
    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|t| t.rows).sum()
    }

    pub fn total_chunks(&self) -> usize {
        self.tables.iter().map(|t| t.chunks).sum()
    }
}

/// Copies every source table into the target.
#[derive(Debug, Clone)]
pub struct StreamingCopier {
    chunk_size: usize,
}

impl StreamingCopier {
    /// A `chunk_size` of zero is treated as one.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Copy all tables the source lists.
    ///
    /// # Errors
    ///
    /// The first failure aborts the run as a Transfer error naming the table.
    /// Chunks appended before the failure stay in the target.
    pub async fn copy_all<S, W>(&self, source: &mut S, target: &mut W) -> Result<CopyStats>
    where
        S: SourceReader + ?Sized,
        W: TargetWriter + ?Sized,
    {
        let tables = source.list_tables().await?;
        info!("Copying {} tables (chunk size {})", tables.len(), self.chunk_size);

        let mut stats = CopyStats::default();
        for table in &tables {
            let table_stats = self
                .copy_table(source, target, table)
                .await
                .map_err(|e| e.into_transfer(&table.name))?;
            stats.tables.push(table_stats);
        }

        info!(
            "Copied {} rows across {} tables in {} chunks",
            stats.total_rows(),
            stats.tables.len(),
            stats.total_chunks()
        );
        Ok(stats)
    }

    /// Copy one table.
    pub async fn copy_table<S, W>(
        &self,
        source: &mut S,
        target: &mut W,
        table: &TableDescriptor,
    ) -> Result<TableCopyStats>
    where
        S: SourceReader + ?Sized,
        W: TargetWriter + ?Sized,
    {
        let start = Instant::now();
        let mut stats = TableCopyStats {
            table: table.name.clone(),
            ..Default::default()
        };
        let mut mapping: Option<ColumnNameMapping> = None;
        let mut chunk: Option<RowChunk> = None;

        let sql = source.select_all_sql(table)?;
        let mut rows = source.fetch_rows(&sql);

        while let Some(row) = rows.next().await {
            let row = row?;
            let current =
                chunk.get_or_insert_with(|| RowChunk::new(row.columns.clone(), self.chunk_size));
            if current.header != row.columns {
                return Err(MigrateError::transfer(
                    &table.name,
                    "result-set header changed mid-stream",
                ));
            }
            current.rows.push(row.values);

            if current.len() >= self.chunk_size {
                if let Some(full) = chunk.take() {
                    self.append(target, &table.name, &mut mapping, full, &mut stats)
                        .await?;
                }
            }
        }
        drop(rows);

        if let Some(rest) = chunk.take() {
            self.append(target, &table.name, &mut mapping, rest, &mut stats)
                .await?;
        }

        if stats.chunks == 0 {
            // Empty tables still get created, with descriptor columns.
            let mapping = ColumnNameMapping::from_header(&table.name, &table.columns)?;
            target
                .create_or_append(&table.name, mapping.normalized(), Vec::new())
                .await?;
            debug!("{}: source is empty, created target table only", table.name);
        }

        stats.duration = start.elapsed();
        info!(
            "{}: {} rows in {} chunks ({:?})",
            table.name, stats.rows, stats.chunks, stats.duration
        );
        Ok(stats)
    }

    async fn append<W>(
        &self,
        target: &mut W,
        table: &str,
        mapping: &mut Option<ColumnNameMapping>,
        chunk: RowChunk,
        stats: &mut TableCopyStats,
    ) -> Result<()>
    where
        W: TargetWriter + ?Sized,
    {
        let mapping = match mapping.take() {
            Some(m) => {
                m.ensure_header(table, &chunk.header)?;
                mapping.insert(m)
            }
            None => mapping.insert(ColumnNameMapping::from_header(table, &chunk.header)?),
        };

        debug!(
            "{}: chunk {} with {} rows, columns {:?}",
            table,
            stats.chunks + 1,
            chunk.len(),
            mapping.normalized()
        );
        let written = target
            .create_or_append(table, mapping.normalized(), chunk.rows)
            .await?;
        stats.rows += written;
        stats.chunks += 1;
        Ok(())
    }
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Row, SourceRow, SqlValue};
    use async_trait::async_trait;
    use futures::stream::{self, BoxStream};
    use std::collections::HashMap;
    use std::sync::Arc;

    struct MockSource {
        tables: Vec<TableDescriptor>,
        rows: HashMap<String, Vec<Result<SourceRow>>>,
    }

    impl MockSource {
        fn new() -> Self {
            Self {
                tables: Vec::new(),
                rows: HashMap::new(),
            }
        }

        fn with_table(mut self, name: &str, columns: &[&str], rows: Vec<Row>) -> Self {
            let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
            let header: Arc<[String]> = columns.clone().into();
            let rows = rows
                .into_iter()
                .map(|values| {
                    Ok(SourceRow {
                        columns: header.clone(),
                        values,
                    })
                })
                .collect();
            self.rows.insert(format!("SELECT * FROM {}", name), rows);
            self.tables.push(TableDescriptor::new(name, columns));
            self
        }

        fn push_row(&mut self, table: &str, row: Result<SourceRow>) {
            if let Some(rows) = self.rows.get_mut(&format!("SELECT * FROM {}", table)) {
                rows.push(row);
            }
        }
    }

    #[async_trait]
    impl SourceReader for MockSource {
        async fn list_tables(&mut self) -> Result<Vec<TableDescriptor>> {
            Ok(self.tables.clone())
        }

        fn select_all_sql(&self, table: &TableDescriptor) -> Result<String> {
            Ok(format!("SELECT * FROM {}", table.name))
        }

        fn fetch_rows<'a>(&'a mut self, sql: &'a str) -> BoxStream<'a, Result<SourceRow>> {
            let rows = self.rows.remove(sql).unwrap_or_default();
            stream::iter(rows).boxed()
        }
    }

    #[derive(Default)]
    struct MockTarget {
        appends: Vec<(String, Vec<String>, Vec<Row>)>,
    }

    impl MockTarget {
        fn rows_for(&self, table: &str) -> Vec<Row> {
            self.appends
                .iter()
                .filter(|(t, _, _)| t == table)
                .flat_map(|(_, _, rows)| rows.clone())
                .collect()
        }
    }

    #[async_trait]
    impl TargetWriter for MockTarget {
        async fn create_or_append(
            &mut self,
            table: &str,
            columns: &[String],
            rows: Vec<Row>,
        ) -> Result<u64> {
            let n = rows.len() as u64;
            self.appends
                .push((table.to_string(), columns.to_vec(), rows));
            Ok(n)
        }
    }

    fn numbered_rows(n: i64) -> Vec<Row> {
        (0..n)
            .map(|i| vec![SqlValue::I64(i), SqlValue::text_owned(format!("user{}", i))])
            .collect()
    }

    #[tokio::test]
    async fn test_chunks_preserve_order_and_size() {
        let source_rows = numbered_rows(250);
        let mut source =
            MockSource::new().with_table("orders", &["id", "customer_name"], source_rows.clone());
        let mut target = MockTarget::default();

        let stats = StreamingCopier::new(100)
            .copy_all(&mut source, &mut target)
            .await
            .unwrap();

        let sizes: Vec<usize> = target.appends.iter().map(|(_, _, r)| r.len()).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
        assert_eq!(target.rows_for("orders"), source_rows);
        assert_eq!(stats.total_rows(), 250);
        assert_eq!(stats.tables[0].chunks, 3);
    }

    #[tokio::test]
    async fn test_chunk_count_is_ceiling() {
        for (rows, size, expected) in [(1, 100, 1), (100, 100, 1), (101, 100, 2), (7, 3, 3)] {
            let mut source = MockSource::new().with_table("t", &["id", "name"], numbered_rows(rows));
            let mut target = MockTarget::default();
            let stats = StreamingCopier::new(size)
                .copy_all(&mut source, &mut target)
                .await
                .unwrap();
            assert_eq!(stats.total_chunks(), expected, "rows={} size={}", rows, size);
        }
    }

    #[tokio::test]
    async fn test_columns_are_normalized() {
        let mut source = MockSource::new().with_table(
            "users",
            &["id", "first_name", "user id"],
            vec![vec![
                SqlValue::I64(1),
                SqlValue::text_owned("Ann"),
                SqlValue::I64(9),
            ]],
        );
        let mut target = MockTarget::default();
        StreamingCopier::new(100)
            .copy_all(&mut source, &mut target)
            .await
            .unwrap();

        assert_eq!(target.appends[0].1, vec!["id", "firstName", "userId"]);
    }

    #[tokio::test]
    async fn test_empty_table_is_still_created() {
        let mut source = MockSource::new().with_table("audit_log", &["log_id", "note"], vec![]);
        let mut target = MockTarget::default();
        let stats = StreamingCopier::new(100)
            .copy_all(&mut source, &mut target)
            .await
            .unwrap();

        assert_eq!(target.appends.len(), 1);
        let (table, columns, rows) = &target.appends[0];
        assert_eq!(table, "audit_log");
        assert_eq!(columns, &vec!["logId".to_string(), "note".to_string()]);
        assert!(rows.is_empty());
        assert_eq!(stats.tables[0].chunks, 0);
        assert_eq!(stats.tables[0].rows, 0);
    }

    #[tokio::test]
    async fn test_name_collision_fails_before_any_write() {
        let mut source = MockSource::new().with_table(
            "users",
            &["first_name", "firstName"],
            numbered_rows(3),
        );
        let mut target = MockTarget::default();
        let err = StreamingCopier::new(100)
            .copy_all(&mut source, &mut target)
            .await
            .unwrap_err();

        assert!(matches!(err, MigrateError::Transfer { ref table, .. } if table == "users"));
        assert!(target.appends.is_empty());
    }

    #[tokio::test]
    async fn test_mid_table_failure_keeps_earlier_chunks() {
        let mut source = MockSource::new().with_table("orders", &["id", "name"], numbered_rows(5));
        source.push_row(
            "orders",
            Err(MigrateError::statement(Some(2013), "Lost connection")),
        );
        let mut target = MockTarget::default();

        let err = StreamingCopier::new(2)
            .copy_all(&mut source, &mut target)
            .await
            .unwrap_err();

        match err {
            MigrateError::Transfer { table, message } => {
                assert_eq!(table, "orders");
                assert!(message.contains("Lost connection"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(target.rows_for("orders").len(), 4);
    }

    #[tokio::test]
    async fn test_header_change_is_error() {
        let mut source = MockSource::new().with_table("t", &["a", "b"], numbered_rows(1));
        source.push_row(
            "t",
            Ok(SourceRow {
                columns: vec!["a".to_string(), "c".to_string()].into(),
                values: vec![SqlValue::I64(2), SqlValue::I64(3)],
            }),
        );
        let mut target = MockTarget::default();
        let err = StreamingCopier::new(100)
            .copy_all(&mut source, &mut target)
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::Transfer { .. }));
    }

    #[tokio::test]
    async fn test_tables_copied_in_discovery_order() {
        let mut source = MockSource::new()
            .with_table("customers", &["id", "name"], numbered_rows(2))
            .with_table("orders", &["id", "name"], numbered_rows(3));
        let mut target = MockTarget::default();
        let stats = StreamingCopier::new(100)
            .copy_all(&mut source, &mut target)
            .await
            .unwrap();

        let order: Vec<&str> = stats.tables.iter().map(|t| t.table.as_str()).collect();
        assert_eq!(order, vec!["customers", "orders"]);
        assert_eq!(target.rows_for("orders").len(), 3);
    }

    #[test]
    fn test_zero_chunk_size_clamped() {
        assert_eq!(StreamingCopier::new(0).chunk_size(), 1);
    }
}
