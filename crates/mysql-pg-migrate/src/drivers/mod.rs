//! Database driver implementations.
//!
//! - [`mysql`]: MySQL/MariaDB source reader
//! - [`postgres`]: live PostgreSQL target
//! - [`file`]: SQL script target
//!
//! The two targets are wrapped in [`TargetImpl`], an enum that forwards the
//! `TargetWriter` operations with a match instead of a vtable.

pub mod file;
pub mod mysql;
pub mod postgres;

pub use file::FileWriter;
pub use mysql::MysqlReader;
pub use postgres::{PostgresWriter, SslMode};

use async_trait::async_trait;

use crate::config::TargetConfig;
use crate::core::schema::Table;
use crate::core::traits::TargetWriter;
use crate::error::{MigrateError, Result};

/// Enum-based static dispatch for target sinks.
pub enum TargetImpl {
    File(FileWriter),
    Postgres(PostgresWriter),
}

impl TargetImpl {
    /// Open the sink selected by the target configuration.
    pub async fn connect(config: &TargetConfig) -> Result<Self> {
        match (&config.file, &config.postgres) {
            (Some(path), None) => Ok(Self::File(FileWriter::new(path))),
            (None, Some(pg)) => Ok(Self::Postgres(PostgresWriter::new(pg).await?)),
            _ => Err(MigrateError::Config(
                "exactly one of target.file or target.postgres is required".into(),
            )),
        }
    }
}

#[async_trait]
impl TargetWriter for TargetImpl {
    async fn execute(&mut self, statements: &[String]) -> Result<()> {
        match self {
            Self::File(w) => w.execute(statements).await,
            Self::Postgres(w) => w.execute(statements).await,
        }
    }

    async fn begin_copy(&mut self, table: &Table) -> Result<()> {
        match self {
            Self::File(w) => w.begin_copy(table).await,
            Self::Postgres(w) => w.begin_copy(table).await,
        }
    }

    async fn write_copy_lines(&mut self, lines: &[String]) -> Result<()> {
        match self {
            Self::File(w) => w.write_copy_lines(lines).await,
            Self::Postgres(w) => w.write_copy_lines(lines).await,
        }
    }

    async fn finish_copy(&mut self) -> Result<u64> {
        match self {
            Self::File(w) => w.finish_copy().await,
            Self::Postgres(w) => w.finish_copy().await,
        }
    }

    async fn ping(&mut self) -> Result<()> {
        match self {
            Self::File(w) => w.ping().await,
            Self::Postgres(w) => w.ping().await,
        }
    }

    fn db_type(&self) -> &str {
        match self {
            Self::File(w) => w.db_type(),
            Self::Postgres(w) => w.db_type(),
        }
    }

    async fn flush(&mut self) -> Result<()> {
        match self {
            Self::File(w) => w.flush().await,
            Self::Postgres(w) => w.flush().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            Self::File(w) => w.close().await,
            Self::Postgres(w) => w.close().await,
        }
    }
}
