//! Engine-independent types and traits.
//!
//! - [`value`]: typed cell values and column type inference
//! - [`schema`]: table descriptors, rows and chunks
//! - [`naming`]: column identifier normalization
//! - [`identifier`]: identifier validation and quoting
//! - [`traits`]: the seams the pipeline stages are written against

pub mod identifier;
pub mod naming;
pub mod schema;
pub mod traits;
pub mod value;

pub use naming::{normalize, ColumnNameMapping};
pub use schema::{RowChunk, SourceRow, TableData, TableDescriptor};
pub use traits::{ReportSource, ScriptExecutor, SourceReader, TargetWriter};
pub use value::{Row, SqlNullType, SqlValue};
