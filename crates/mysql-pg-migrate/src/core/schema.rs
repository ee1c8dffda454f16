//! Table and row metadata types.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::value::Row;

/// A source table and its raw column identifiers in ordinal order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<String>,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }
}

/// A row as it comes off the source cursor, together with the result-set
/// header it was read under.
///
/// The header is shared by every row of one cursor.
#[derive(Debug, Clone)]
pub struct SourceRow {
    pub columns: Arc<[String]>,
    pub values: Row,
}

/// A bounded run of consecutive rows from one table.
#[derive(Debug, Clone)]
pub struct RowChunk {
    /// Header of the cursor the rows were read from.
    pub header: Arc<[String]>,
    pub rows: Vec<Row>,
}

impl RowChunk {
    pub fn new(header: Arc<[String]>, capacity: usize) -> Self {
        Self {
            header,
            rows: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A fully materialized target table, read for the report.
#[derive(Debug, Clone, Default)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}
