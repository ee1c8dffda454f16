//! MySQL driver.
//!
//! A [`MysqlHandle`] wraps one sqlx connection. It executes dump statements
//! and streams source tables for the copier.
//!
//! Supported servers: MySQL 5.7+, 8.0+ and MariaDB 10.2+.

mod handle;
mod reader;

pub use handle::MysqlHandle;
