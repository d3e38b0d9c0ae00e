//! MySQL/MariaDB source driver.
//!
//! - [`MysqlReader`]: schema introspection and lazy row streaming over SQLx
//!
//! # Supported Versions
//!
//! - MySQL 5.7+, 8.0+
//! - MariaDB 10.2+

mod reader;

pub use reader::MysqlReader;
