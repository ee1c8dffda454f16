//! PostgreSQL driver.
//!
//! A [`PostgresHandle`] wraps one tokio-postgres client. It creates and
//! appends to target tables through text-format COPY, and reads them back for
//! the report.

mod handle;
mod reader;
mod writer;

pub use handle::PostgresHandle;
