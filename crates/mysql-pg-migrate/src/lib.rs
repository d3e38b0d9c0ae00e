//! # mysql-pg-migrate
//!
//! MySQL/MariaDB to PostgreSQL schema and data migration library.
//!
//! The library reads a source database's schema and rows and produces what
//! PostgreSQL needs to recreate them:
//!
//! - **Schema translation**: column types, defaults, sequences for
//!   auto-increment columns, comments, indexes, foreign keys and triggers
//! - **Bulk data** in PostgreSQL COPY text format
//! - **Two sinks**: a live PostgreSQL database or a SQL script for `psql`
//!
//! ## Example
//!
//! ```rust,no_run
//! use mysql_pg_migrate::{Config, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> mysql_pg_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::new(config).await?;
//!     let result = orchestrator.run(CancellationToken::new(), false).await?;
//!     println!("Migrated {} rows", result.rows_transferred);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod copy;
pub mod core;
pub mod ddl;
pub mod drivers;
pub mod error;
pub mod orchestrator;
pub mod parser;
pub mod typemap;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, PostgresConfig, SourceConfig, TargetConfig};
pub use copy::RowTranscoder;
pub use crate::core::{CanonicalType, Column, SourceReader, SqlValue, Table, TargetWriter};
pub use ddl::{DdlOptions, PgDdlGenerator};
pub use error::{MigrateError, Result};
pub use orchestrator::{HealthCheckResult, MigrationResult, Orchestrator};
