//! Collaborator traits for the migration engine.
//!
//! - [`SourceReader`]: introspects the source schema and streams table rows
//! - [`TargetWriter`]: receives generated DDL and COPY text lines
//!
//! The translation core (parser, type normalizer, DDL generator, row
//! transcoder) never talks to a database itself; the orchestrator moves data
//! between these two seams.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;

use super::schema::Table;
use super::value::SqlValue;

/// Lazy stream of source rows, one `SqlValue` per column in table order.
pub type RowStream<'a> = BoxStream<'a, Result<Vec<SqlValue<'static>>>>;

/// Read schema and data from a source database.
///
/// Implementations are expected to hide transient reconnects; the engine
/// has no retry logic of its own.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// List the base tables of the source database in a stable order.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Load full metadata for a table: columns (with canonical types),
    /// indexes, foreign keys, triggers and comment.
    async fn load_table(&self, name: &str) -> Result<Table>;

    /// Start streaming rows from a table.
    ///
    /// The stream is lazy and unbuffered; calling this again restarts the
    /// table from the beginning.
    fn read_rows<'a>(&'a self, table: &'a Table) -> RowStream<'a>;

    /// Check that the connection is alive.
    async fn ping(&self) -> Result<()>;

    /// Get the database type identifier (e.g., "mysql").
    fn db_type(&self) -> &str;

    /// Close the connection pool.
    async fn close(&self);
}

/// Write schema and data to a target sink.
///
/// A COPY is bracketed by [`begin_copy`](TargetWriter::begin_copy) and
/// [`finish_copy`](TargetWriter::finish_copy); lines handed to
/// [`write_copy_lines`](TargetWriter::write_copy_lines) are already encoded
/// in COPY text format without the trailing newline.
#[async_trait]
pub trait TargetWriter: Send {
    /// Execute DDL statements in order.
    async fn execute(&mut self, statements: &[String]) -> Result<()>;

    /// Open a `COPY ... FROM STDIN` for the table's columns.
    async fn begin_copy(&mut self, table: &Table) -> Result<()>;

    /// Send a batch of encoded rows to the open COPY.
    async fn write_copy_lines(&mut self, lines: &[String]) -> Result<()>;

    /// Complete the open COPY, returning the number of rows written.
    async fn finish_copy(&mut self) -> Result<u64>;

    /// Check that the sink is reachable.
    async fn ping(&mut self) -> Result<()>;

    /// Get the sink type identifier (e.g., "postgres", "file").
    fn db_type(&self) -> &str;

    /// Push everything written so far to its destination without
    /// finishing an open COPY. Used when a run stops early.
    async fn flush(&mut self) -> Result<()>;

    /// Flush and release the sink.
    async fn close(&mut self) -> Result<()>;
}
