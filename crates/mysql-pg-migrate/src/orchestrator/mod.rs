//! Migration orchestrator - main workflow coordinator.
//!
//! Runs the phases in a fixed order:
//!
//! 1. Extract: list, filter and load the source tables
//! 2. Schema: sequences, then the table and its comments
//! 3. Truncate: only when the schema is kept and `force_truncate` is set
//! 4. Data: stream, transcode and COPY each table in batches
//! 5. Finalize: indexes for all tables, then foreign keys, then triggers
//!
//! Cancellation is checked between tables and between COPY batches.

use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::copy::RowTranscoder;
use crate::core::schema::Table;
use crate::core::traits::{SourceReader, TargetWriter};
use crate::ddl::PgDdlGenerator;
use crate::drivers::{MysqlReader, TargetImpl};
use crate::error::{MigrateError, Result};

/// Migration orchestrator.
pub struct Orchestrator<S = MysqlReader, T = TargetImpl> {
    config: Config,
    source: S,
    target: T,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status: "completed" or "dry-run".
    pub status: String,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Tables selected for migration.
    pub tables_total: usize,

    /// Total rows transferred.
    pub rows_transferred: u64,

    /// Average throughput (rows/second).
    pub rows_per_second: u64,
}

/// Result of a connectivity check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub healthy: bool,
    pub source_connected: bool,
    pub source_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_error: Option<String>,
    pub target_type: String,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_error: Option<String>,
}

impl Orchestrator {
    /// Connect to the configured source and target.
    pub async fn new(config: Config) -> Result<Self> {
        let source = MysqlReader::new(&config.source).await?;
        let target = TargetImpl::connect(&config.target).await?;
        Ok(Self::from_parts(config, source, target))
    }
}

impl<S: SourceReader, T: TargetWriter> Orchestrator<S, T> {
    /// Assemble an orchestrator from already connected collaborators.
    pub fn from_parts(config: Config, source: S, target: T) -> Self {
        Self {
            config,
            source,
            target,
        }
    }

    /// Run the migration.
    ///
    /// In dry-run mode the source is read and every statement is generated
    /// and logged at debug level, but nothing reaches the target and no rows
    /// are read.
    pub async fn run(mut self, cancel: CancellationToken, dry_run: bool) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!("Starting migration run: {}", run_id);
        if dry_run {
            info!("Dry run: no changes will be written");
        }

        let outcome = self.run_phases(&cancel, dry_run).await;

        self.source.close().await;
        let (tables_total, rows_transferred) = match outcome {
            Ok(counts) => counts,
            Err(e) => {
                // Keep what earlier tables already wrote
                if !dry_run {
                    if let Err(flush_err) = self.target.flush().await {
                        warn!("Failed to flush target after error: {}", flush_err);
                    }
                }
                return Err(e);
            }
        };
        if !dry_run {
            self.target.close().await?;
        }

        let completed_at = Utc::now();
        let duration = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;
        let rows_per_second = if duration > 0.0 {
            (rows_transferred as f64 / duration) as u64
        } else {
            0
        };

        let result = MigrationResult {
            run_id,
            status: if dry_run { "dry-run" } else { "completed" }.to_string(),
            started_at,
            completed_at,
            duration_seconds: duration,
            tables_total,
            rows_transferred,
            rows_per_second,
        };

        info!(
            "Migration {}: {} tables, {} rows in {:.1}s ({} rows/s)",
            result.status,
            result.tables_total,
            result.rows_transferred,
            result.duration_seconds,
            result.rows_per_second
        );

        Ok(result)
    }

    /// Check connectivity to both ends without migrating anything.
    pub async fn health_check(&mut self) -> Result<HealthCheckResult> {
        let started = Instant::now();
        let source = self.source.ping().await;
        let source_latency_ms = started.elapsed().as_millis() as u64;

        let started = Instant::now();
        let target = self.target.ping().await;
        let target_latency_ms = started.elapsed().as_millis() as u64;

        Ok(HealthCheckResult {
            healthy: source.is_ok() && target.is_ok(),
            source_connected: source.is_ok(),
            source_latency_ms,
            source_error: source.err().map(|e| e.to_string()),
            target_type: self.target.db_type().to_string(),
            target_connected: target.is_ok(),
            target_latency_ms,
            target_error: target.err().map(|e| e.to_string()),
        })
    }

    /// Returns the number of tables and rows migrated.
    async fn run_phases(
        &mut self,
        cancel: &CancellationToken,
        dry_run: bool,
    ) -> Result<(usize, u64)> {
        let migration = self.config.migration.clone();
        let ddl = PgDdlGenerator::new(migration.ddl_options());

        // Phase 1: Extract schema
        info!("Phase 1: Extracting schema from source");
        let tables = self.extract(cancel).await?;
        info!("Found {} tables to migrate", tables.len());

        // Phase 2: Create schema
        if migration.suppress_ddl {
            info!("Phase 2: Skipping schema creation (suppress_ddl)");
        } else {
            info!("Phase 2: Creating tables and sequences");
            for table in &tables {
                check_cancelled(cancel)?;
                debug!("Creating table: {}", table.name);
                let mut statements = ddl.sequence_statements(table)?;
                statements.extend(ddl.table_statements(table)?);
                self.emit(&statements, dry_run).await?;
            }
        }

        // Phase 3: Truncate existing tables
        if migration.suppress_ddl && migration.force_truncate {
            info!("Phase 3: Truncating tables and resetting sequences");
            for table in &tables {
                check_cancelled(cancel)?;
                debug!("Truncating table: {}", table.name);
                self.emit(&ddl.truncate_statements(table)?, dry_run).await?;
            }
        }

        // Phase 4: Transfer data
        let mut rows_transferred = 0;
        if migration.suppress_data {
            info!("Phase 4: Skipping data transfer (suppress_data)");
        } else if dry_run {
            info!("Phase 4: Skipping data transfer (dry run)");
        } else {
            info!("Phase 4: Transferring data");
            let transcoder = RowTranscoder::new(migration.ddl_options());
            for table in &tables {
                check_cancelled(cancel)?;
                let rows = transfer_table(
                    &self.source,
                    &mut self.target,
                    &transcoder,
                    table,
                    migration.batch_size,
                    cancel,
                )
                .await?;
                info!("Transferred {} rows into {}", rows, table.name);
                rows_transferred += rows;
            }
        }

        // Phase 5: Finalize
        if !migration.suppress_ddl {
            info!("Phase 5: Creating indexes, foreign keys and triggers");
            for table in &tables {
                check_cancelled(cancel)?;
                self.emit(&ddl.index_statements(table)?, dry_run).await?;
            }
            for table in &tables {
                check_cancelled(cancel)?;
                self.emit(&ddl.foreign_key_statements(table)?, dry_run)
                    .await?;
            }
            for table in &tables {
                check_cancelled(cancel)?;
                self.emit(&ddl.trigger_statements(table)?, dry_run).await?;
            }
        }

        Ok((tables.len(), rows_transferred))
    }

    /// List, filter and load the source tables.
    async fn extract(&self, cancel: &CancellationToken) -> Result<Vec<Table>> {
        let migration = &self.config.migration;
        let names = self.source.list_tables().await?;

        for wanted in &migration.only_tables {
            if !names.contains(wanted) {
                warn!("Table {} listed in only_tables was not found in the source", wanted);
            }
        }

        let mut tables = Vec::new();
        for name in names.iter().filter(|n| migration.includes_table(n)) {
            check_cancelled(cancel)?;
            debug!("Loading table: {}", name);
            tables.push(self.source.load_table(name).await?);
        }
        Ok(tables)
    }

    async fn emit(&mut self, statements: &[String], dry_run: bool) -> Result<()> {
        if statements.is_empty() {
            return Ok(());
        }
        if dry_run {
            for statement in statements {
                debug!("[dry-run] {}", statement);
            }
            return Ok(());
        }
        self.target.execute(statements).await
    }
}

/// Stream one table into an open COPY, handing the sink `batch_size` lines
/// at a time.
async fn transfer_table<S: SourceReader, T: TargetWriter>(
    source: &S,
    target: &mut T,
    transcoder: &RowTranscoder,
    table: &Table,
    batch_size: usize,
    cancel: &CancellationToken,
) -> Result<u64> {
    debug!("Starting transfer: {}", table.name);
    target.begin_copy(table).await?;

    let mut rows = source.read_rows(table);
    let mut batch = Vec::with_capacity(batch_size);
    while let Some(row) = rows.next().await {
        let row = row?;
        batch.push(transcoder.copy_line(table, &row)?);
        if batch.len() >= batch_size {
            check_cancelled(cancel)?;
            target.write_copy_lines(&batch).await?;
            batch.clear();
        }
    }
    if !batch.is_empty() {
        check_cancelled(cancel)?;
        target.write_copy_lines(&batch).await?;
    }

    target.finish_copy().await
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        warn!("Migration cancelled");
        return Err(MigrateError::Cancelled);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::SourceColumn;
    use crate::core::traits::RowStream;
    use crate::core::value::SqlValue;
    use crate::parser;
    use crate::typemap;
    use async_trait::async_trait;
    use std::borrow::Cow;
    use std::sync::{Arc, Mutex};

    struct MemorySource {
        tables: Vec<(Table, Vec<Vec<SqlValue<'static>>>)>,
    }

    #[async_trait]
    impl SourceReader for MemorySource {
        async fn list_tables(&self) -> Result<Vec<String>> {
            Ok(self.tables.iter().map(|(t, _)| t.name.clone()).collect())
        }

        async fn load_table(&self, name: &str) -> Result<Table> {
            self.tables
                .iter()
                .find(|(t, _)| t.name == name)
                .map(|(t, _)| t.clone())
                .ok_or_else(|| MigrateError::SchemaExtraction(name.to_string()))
        }

        fn read_rows<'a>(&'a self, table: &'a Table) -> RowStream<'a> {
            let rows = self
                .tables
                .iter()
                .find(|(t, _)| t.name == table.name)
                .map(|(_, rows)| rows.clone())
                .unwrap_or_default();
            futures::stream::iter(rows.into_iter().map(Ok)).boxed()
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }

        fn db_type(&self) -> &str {
            "memory"
        }

        async fn close(&self) {}
    }

    #[derive(Default)]
    struct Recording {
        log: Vec<String>,
        batches: Vec<usize>,
        flushed: bool,
        closed: bool,
    }

    /// Records every call as a line of text.
    #[derive(Default, Clone)]
    struct RecordingTarget(Arc<Mutex<Recording>>);

    impl RecordingTarget {
        fn recording(&self) -> std::sync::MutexGuard<'_, Recording> {
            self.0.lock().unwrap()
        }
    }

    #[async_trait]
    impl TargetWriter for RecordingTarget {
        async fn execute(&mut self, statements: &[String]) -> Result<()> {
            self.recording().log.extend(statements.iter().cloned());
            Ok(())
        }

        async fn begin_copy(&mut self, table: &Table) -> Result<()> {
            self.recording().log.push(format!("COPY {}", table.name));
            Ok(())
        }

        async fn write_copy_lines(&mut self, lines: &[String]) -> Result<()> {
            let mut recording = self.recording();
            recording.batches.push(lines.len());
            recording.log.extend(lines.iter().cloned());
            Ok(())
        }

        async fn finish_copy(&mut self) -> Result<u64> {
            let mut recording = self.recording();
            let rows = recording
                .log
                .iter()
                .rev()
                .take_while(|l| !l.starts_with("COPY "))
                .count();
            recording.log.push("END COPY".to_string());
            Ok(rows as u64)
        }

        async fn ping(&mut self) -> Result<()> {
            Ok(())
        }

        fn db_type(&self) -> &str {
            "recording"
        }

        async fn flush(&mut self) -> Result<()> {
            self.recording().flushed = true;
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            self.recording().closed = true;
            Ok(())
        }
    }

    fn source_column(name: &str, column_type: &str, key: &str, extra: &str) -> SourceColumn {
        SourceColumn {
            name: name.to_string(),
            column_type: column_type.to_string(),
            key: key.to_string(),
            extra: extra.to_string(),
            ..Default::default()
        }
    }

    fn users() -> Table {
        let mut table = Table::new("users");
        table.columns = vec![
            typemap::build_column(
                "users",
                &source_column("id", "int(11)", "PRI", "auto_increment"),
            ),
            typemap::build_column("users", &source_column("name", "varchar(40)", "", "")),
        ];
        table.columns[0].max_value = Some(2);
        let keys = parser::parse_create_table(
            "users",
            "CREATE TABLE `users` (\n  `id` int(11) NOT NULL AUTO_INCREMENT,\n  `name` varchar(40),\n  PRIMARY KEY (`id`),\n  KEY `idx_name` (`name`)\n)",
        );
        table.indexes = keys.indexes;
        table
    }

    fn orders() -> Table {
        let mut table = Table::new("orders");
        table.columns = vec![
            typemap::build_column("orders", &source_column("id", "int(11)", "PRI", "")),
            typemap::build_column("orders", &source_column("user_id", "int(11)", "", "")),
        ];
        let keys = parser::parse_create_table(
            "orders",
            "CREATE TABLE `orders` (\n  PRIMARY KEY (`id`),\n  CONSTRAINT `fk_user` FOREIGN KEY (`user_id`) REFERENCES `users` (`id`)\n)",
        );
        table.indexes = keys.indexes;
        table.foreign_keys = keys.foreign_keys;
        table.triggers.push(
            parser::parse_trigger("trg_orders", "INSERT", "BEFORE", "SET NEW.user_id = 1").unwrap(),
        );
        table
    }

    fn text(s: &str) -> SqlValue<'static> {
        SqlValue::Text(Cow::Owned(s.to_string()))
    }

    fn source() -> MemorySource {
        MemorySource {
            tables: vec![
                (
                    users(),
                    vec![
                        vec![SqlValue::I64(1), text("alice")],
                        vec![SqlValue::I64(2), SqlValue::Null],
                        vec![SqlValue::I64(3), text("tab\there")],
                    ],
                ),
                (orders(), vec![vec![SqlValue::I64(10), SqlValue::I64(1)]]),
            ],
        }
    }

    const DEFAULTS: &str = "  batch_size: 10000\n";

    fn config(yaml_migration: &str) -> Config {
        let yaml = format!(
            "source:\n  database: shop\n  user: root\ntarget:\n  file: out.sql\nmigration:\n{}",
            yaml_migration
        );
        Config::from_yaml(&yaml).unwrap()
    }

    async fn run_recorded(
        migration: &str,
        dry_run: bool,
    ) -> (Result<MigrationResult>, Vec<String>, Vec<usize>) {
        let target = RecordingTarget::default();
        let orchestrator = Orchestrator::from_parts(config(migration), source(), target.clone());
        let result = orchestrator.run(CancellationToken::new(), dry_run).await;
        let recording = target.recording();
        assert_eq!(recording.closed, result.is_ok() && !dry_run);
        (result, recording.log.clone(), recording.batches.clone())
    }

    fn position(log: &[String], prefix: &str) -> usize {
        log.iter()
            .position(|l| l.starts_with(prefix))
            .unwrap_or_else(|| panic!("no line starting with {:?} in {:#?}", prefix, log))
    }

    #[tokio::test]
    async fn test_full_run_phase_order() {
        let (result, log, _) = run_recorded("  batch_size: 2\n", false).await;
        let result = result.unwrap();
        assert_eq!(result.status, "completed");
        assert_eq!(result.tables_total, 2);
        assert_eq!(result.rows_transferred, 4);

        let sequence = position(&log, "CREATE SEQUENCE \"users_id_seq\"");
        let create_users = position(&log, "CREATE TABLE \"users\"");
        let create_orders = position(&log, "CREATE TABLE \"orders\"");
        let copy_users = position(&log, "COPY users");
        let copy_orders = position(&log, "COPY orders");
        let index = position(&log, "CREATE INDEX");
        let foreign_key = position(&log, "ALTER TABLE \"orders\" ADD CONSTRAINT \"fk_user\"");
        let trigger = position(&log, "CREATE TRIGGER");

        assert!(sequence < create_users);
        assert!(create_users < create_orders);
        assert!(create_orders < copy_users);
        assert!(copy_users < copy_orders);
        assert!(copy_orders < index);
        assert!(index < foreign_key);
        assert!(foreign_key < trigger);

        assert_eq!(log[copy_users + 1], "1\talice");
        assert_eq!(log[copy_users + 2], "2\t\\N");
        assert_eq!(log[copy_users + 3], "3\ttab\\there");
    }

    #[tokio::test]
    async fn test_rows_are_batched() {
        let (_, _, batches) = run_recorded("  batch_size: 2\n", false).await;
        // users: 2 + 1, orders: 1
        assert_eq!(batches, vec![2, 1, 1]);
    }

    #[tokio::test]
    async fn test_suppress_ddl_with_truncate() {
        let (result, log, _) =
            run_recorded("  suppress_ddl: true\n  force_truncate: true\n", false).await;
        result.unwrap();

        assert!(!log.iter().any(|l| l.starts_with("CREATE")));
        let truncate = position(&log, "TRUNCATE \"users\" CASCADE;");
        let reseed = position(&log, "SELECT pg_catalog.setval('\"users_id_seq\"', 3, false);");
        assert!(truncate < reseed);
        assert!(reseed < position(&log, "COPY users"));
    }

    #[tokio::test]
    async fn test_suppress_ddl_without_truncate_only_copies() {
        let (_, log, _) = run_recorded("  suppress_ddl: true\n", false).await;
        assert!(!log.iter().any(|l| l.starts_with("TRUNCATE")));
        assert!(!log.iter().any(|l| l.starts_with("DROP")));
        assert_eq!(log[0], "COPY users");
    }

    #[tokio::test]
    async fn test_suppress_data() {
        let (result, log, _) = run_recorded("  suppress_data: true\n", false).await;
        assert_eq!(result.unwrap().rows_transferred, 0);
        assert!(!log.iter().any(|l| l.starts_with("COPY")));
        assert!(log.iter().any(|l| l.starts_with("CREATE TRIGGER")));
    }

    #[tokio::test]
    async fn test_table_filters() {
        let (result, log, _) = run_recorded("  exclude_tables: [orders]\n", false).await;
        assert_eq!(result.unwrap().tables_total, 1);
        assert!(!log.iter().any(|l| l.contains("\"orders\"")));

        let (result, _, _) = run_recorded("  only_tables: [orders, missing]\n", false).await;
        assert_eq!(result.unwrap().tables_total, 1);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let (result, log, _) = run_recorded("  batch_size: 10\n", true).await;
        let result = result.unwrap();
        assert_eq!(result.status, "dry-run");
        assert_eq!(result.rows_transferred, 0);
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let target = RecordingTarget::default();
        let orchestrator = Orchestrator::from_parts(config(DEFAULTS), source(), target.clone());
        let err = orchestrator.run(cancel, false).await.unwrap_err();
        assert!(matches!(err, MigrateError::Cancelled));
        assert!(target.recording().log.is_empty());
        assert!(target.recording().flushed);
        assert!(!target.recording().closed);
    }

    #[tokio::test]
    async fn test_failed_run_keeps_earlier_script_output() {
        use crate::drivers::FileWriter;

        let mut tables = Vec::new();
        for n in 0..60 {
            let name = format!("good_{:02}", n);
            let mut table = Table::new(name.as_str());
            table.columns = vec![
                typemap::build_column(
                    &name,
                    &source_column("id", "int(11)", "PRI", "auto_increment"),
                ),
                typemap::build_column(&name, &source_column("label", "varchar(200)", "", "")),
            ];
            tables.push((table, Vec::new()));
        }
        let mut bad = Table::new("zz_bad");
        bad.columns = vec![typemap::build_column(
            "zz_bad",
            &source_column("shape", "geometry", "", ""),
        )];
        tables.push((bad, Vec::new()));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.sql");
        let orchestrator = Orchestrator::from_parts(
            config(DEFAULTS),
            MemorySource { tables },
            FileWriter::new(&path),
        );

        let err = orchestrator
            .run(CancellationToken::new(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::UnrecognizedType { .. }));

        let script = std::fs::read_to_string(&path).unwrap();
        assert_eq!(script.matches("CREATE TABLE ").count(), 60);
        assert!(script.trim_end().ends_with(");"));
        assert!(script.contains("CREATE TABLE \"good_59\""));
        assert!(!script.contains("zz_bad"));
    }

    #[tokio::test]
    async fn test_health_check() {
        let mut orchestrator =
            Orchestrator::from_parts(config(DEFAULTS), source(), RecordingTarget::default());
        let health = orchestrator.health_check().await.unwrap();
        assert!(health.healthy);
        assert_eq!(health.target_type, "recording");
        assert!(health.source_error.is_none());
    }
}
