//! Helpers shared by the MySQL and PostgreSQL drivers.

pub mod tls;

pub use tls::{parse_mysql_ssl_mode, SslMode, TlsBuilder};
