//! MySQL/MariaDB source reader implementation.
//!
//! Implements the `SourceReader` trait on top of SQLx. Schema metadata comes
//! from INFORMATION_SCHEMA plus the `SHOW CREATE TABLE` text; rows are
//! streamed lazily from a spawned task through a bounded channel.

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use futures::{StreamExt, TryStreamExt};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow, MySqlSslMode};
use sqlx::{Row, ValueRef};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::core::identifier::quote_mysql;
use crate::core::schema::{CanonicalType, Column, SourceColumn, Table};
use crate::core::traits::{RowStream, SourceReader};
use crate::core::value::SqlValue;
use crate::error::{MigrateError, Result};
use crate::parser;
use crate::typemap;

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Rows buffered between the fetch task and the consumer.
const ROW_CHANNEL_CAPACITY: usize = 1024;

/// MySQL/MariaDB source reader implementation.
pub struct MysqlReader {
    pool: MySqlPool,
    database: String,
}

impl MysqlReader {
    /// Connect to the source database.
    pub async fn new(config: &SourceConfig) -> Result<Self> {
        let mut options = MySqlConnectOptions::new()
            .database(&config.database)
            .username(&config.user)
            .password(&config.password)
            .charset("utf8mb4")
            .ssl_mode(MySqlSslMode::Preferred);

        let endpoint = match config.socket.as_deref().filter(|s| !s.is_empty()) {
            Some(socket) => {
                options = options.socket(socket);
                socket.to_string()
            }
            None => {
                options = options.host(&config.host).port(config.port);
                format!("{}:{}", config.host, config.port)
            }
        };

        // Metadata is read before any rows are streamed, so two connections
        // are enough.
        let pool = MySqlPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| MigrateError::pool(e, "creating MySQL source pool"))?;

        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| MigrateError::pool(e, "testing MySQL source connection"))?;

        info!("Connected to MySQL source: {}/{}", endpoint, config.database);

        Ok(Self {
            pool,
            database: config.database.clone(),
        })
    }

    /// Load raw column records for a table.
    async fn load_source_columns(&self, table: &str) -> Result<Vec<SourceColumn>> {
        // CAST to CHAR to handle collation differences where information_schema
        // may return VARBINARY instead of VARCHAR
        let query = r#"
            SELECT
                CAST(COLUMN_NAME AS CHAR) AS COLUMN_NAME,
                CAST(COLUMN_TYPE AS CHAR) AS COLUMN_TYPE,
                CAST(IS_NULLABLE AS CHAR) AS IS_NULLABLE,
                CAST(COLUMN_KEY AS CHAR) AS COLUMN_KEY,
                CAST(EXTRA AS CHAR) AS EXTRA,
                CAST(COLUMN_DEFAULT AS CHAR) AS COLUMN_DEFAULT,
                CAST(COLUMN_COMMENT AS CHAR) AS COLUMN_COMMENT
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
        "#;

        let rows: Vec<MySqlRow> = sqlx::query(query)
            .bind(&self.database)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrateError::pool(e, "loading MySQL columns"))?;

        rows.iter()
            .map(|row| -> Result<SourceColumn> {
                Ok(SourceColumn {
                    name: row.try_get("COLUMN_NAME")?,
                    column_type: row.try_get("COLUMN_TYPE")?,
                    is_nullable: row.try_get::<String, _>("IS_NULLABLE")? == "YES",
                    key: row.try_get("COLUMN_KEY")?,
                    extra: row.try_get("EXTRA")?,
                    default: row.try_get("COLUMN_DEFAULT")?,
                    comment: row
                        .try_get::<Option<String>, _>("COLUMN_COMMENT")?
                        .unwrap_or_default(),
                })
            })
            .collect()
    }

    /// Highest value currently stored in an auto-increment column.
    async fn load_max_value(&self, table: &str, column: &str) -> Result<Option<i64>> {
        let query = format!(
            "SELECT CAST(MAX({}) AS SIGNED) AS max_val FROM {}",
            quote_mysql(column)?,
            quote_mysql(table)?
        );

        let row: MySqlRow = sqlx::query(&query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MigrateError::pool(e, "getting max auto-increment value"))?;

        Ok(row.try_get::<Option<i64>, _>("max_val")?)
    }

    async fn load_table_comment(&self, table: &str) -> Result<Option<String>> {
        let query = r#"
            SELECT CAST(TABLE_COMMENT AS CHAR) AS TABLE_COMMENT
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
        "#;

        let row: Option<MySqlRow> = sqlx::query(query)
            .bind(&self.database)
            .bind(table)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MigrateError::pool(e, "loading MySQL table comment"))?;

        Ok(match row {
            Some(row) => row
                .try_get::<Option<String>, _>("TABLE_COMMENT")?
                .filter(|c| !c.is_empty()),
            None => None,
        })
    }

    async fn load_create_statement(&self, table: &str) -> Result<String> {
        let query = format!("SHOW CREATE TABLE {}", quote_mysql(table)?);

        let row: MySqlRow = sqlx::query(&query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MigrateError::pool(e, "loading MySQL create statement"))?;

        // Some server versions report the statement as binary
        match row.try_get::<String, _>(1) {
            Ok(sql) => Ok(sql),
            Err(_) => {
                let bytes: Vec<u8> = row.try_get_unchecked(1)?;
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
        }
    }

    async fn load_triggers(&self, table: &mut Table) -> Result<()> {
        let query = r#"
            SELECT
                CAST(TRIGGER_NAME AS CHAR) AS TRIGGER_NAME,
                CAST(EVENT_MANIPULATION AS CHAR) AS EVENT_MANIPULATION,
                CAST(ACTION_TIMING AS CHAR) AS ACTION_TIMING,
                CAST(ACTION_STATEMENT AS CHAR) AS ACTION_STATEMENT
            FROM INFORMATION_SCHEMA.TRIGGERS
            WHERE EVENT_OBJECT_SCHEMA = ? AND EVENT_OBJECT_TABLE = ?
            ORDER BY ACTION_TIMING, EVENT_MANIPULATION, ACTION_ORDER
        "#;

        let rows: Vec<MySqlRow> = sqlx::query(query)
            .bind(&self.database)
            .bind(&table.name)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrateError::pool(e, "loading MySQL triggers"))?;

        for row in rows {
            let name: String = row.try_get("TRIGGER_NAME")?;
            let event: String = row.try_get("EVENT_MANIPULATION")?;
            let timing: String = row.try_get("ACTION_TIMING")?;
            let statement: String = row.try_get("ACTION_STATEMENT")?;
            table
                .triggers
                .push(parser::parse_trigger(&name, &event, &timing, &statement)?);
        }

        Ok(())
    }
}

/// SELECT over all columns in table order.
///
/// Invalid enum values are stored by MySQL as the empty string and read back
/// as NULL. TIME values are fetched as text since they may exceed 24 hours.
pub(crate) fn select_query(table: &Table) -> Result<String> {
    let columns = table
        .columns
        .iter()
        .map(|c| {
            let name = quote_mysql(&c.name)?;
            Ok(match c.data_type {
                CanonicalType::Enum(_) => {
                    format!("CASE {} WHEN '' THEN NULL ELSE {} END", name, name)
                }
                CanonicalType::Time => format!("CAST({} AS CHAR)", name),
                _ => name,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(format!(
        "SELECT {} FROM {}",
        columns.join(", "),
        quote_mysql(&table.name)?
    ))
}

/// Parse a MySQL TIME literal (`[-]HHH:MM:SS[.ffffff]`) into a duration.
pub(crate) fn parse_mysql_time(text: &str) -> Option<chrono::Duration> {
    let (negative, rest) = match text.trim().strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.trim()),
    };
    let (clock, fraction) = match rest.split_once('.') {
        Some((clock, fraction)) => (clock, fraction),
        None => (rest, ""),
    };

    let mut parts = clock.split(':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let seconds: i64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    let micros: i64 = if fraction.is_empty() {
        0
    } else {
        let digits: String = fraction.chars().chain("000000".chars()).take(6).collect();
        digits.parse().ok()?
    };

    let total = chrono::Duration::microseconds(
        ((hours * 60 + minutes) * 60 + seconds) * 1_000_000 + micros,
    );
    Some(if negative { -total } else { total })
}

/// DECIMAL arrives as text on the wire. Values beyond the 28 significant
/// digits a `Decimal` holds (MySQL allows 65) are passed through as text.
pub(crate) fn decimal_from_text(col: &Column, text: String) -> SqlValue<'static> {
    match text.parse::<rust_decimal::Decimal>() {
        Ok(d) => SqlValue::Decimal(d),
        Err(e) => {
            warn!(
                "{}.{}: DECIMAL value {} does not fit ({}), passing through",
                col.table_name, col.name, text, e
            );
            SqlValue::Text(Cow::Owned(text))
        }
    }
}

/// Decode one row into values, one per column in table order.
fn decode_row(row: &MySqlRow, columns: &[Column]) -> Result<Vec<SqlValue<'static>>> {
    columns
        .iter()
        .enumerate()
        .map(|(i, col)| decode_value(row, i, col))
        .collect()
}

fn decode_value(row: &MySqlRow, i: usize, col: &Column) -> Result<SqlValue<'static>> {
    if row.try_get_raw(i)?.is_null() {
        return Ok(SqlValue::Null);
    }

    let unsigned = col.source_type.to_lowercase().contains("unsigned");

    let value = match &col.data_type {
        CanonicalType::Boolean if col.source_type.to_lowercase().starts_with("bit") => {
            let bytes: Vec<u8> = row.try_get_unchecked(i)?;
            SqlValue::Bool(bytes.iter().any(|b| *b != 0))
        }
        CanonicalType::Bit(_) => SqlValue::Bytes(Cow::Owned(row.try_get_unchecked(i)?)),
        CanonicalType::Boolean
        | CanonicalType::TinyInt
        | CanonicalType::Integer
        | CanonicalType::BigInt => decode_integer(row, i, unsigned)?,
        CanonicalType::Numeric | CanonicalType::Decimal if col.source_type.contains("int") => {
            decode_integer(row, i, unsigned)?
        }
        CanonicalType::Numeric | CanonicalType::Decimal => {
            decimal_from_text(col, row.try_get_unchecked::<String, _>(i)?)
        }
        CanonicalType::Float => SqlValue::F32(row.try_get::<f32, _>(i)?),
        CanonicalType::Double => SqlValue::F64(row.try_get::<f64, _>(i)?),
        CanonicalType::Date => match row.try_get::<NaiveDate, _>(i) {
            Ok(d) => SqlValue::Date(d),
            Err(e) => {
                debug!("{}.{}: zero date read as NULL ({})", col.table_name, col.name, e);
                SqlValue::Null
            }
        },
        CanonicalType::DateTime | CanonicalType::Timestamp => {
            match row.try_get::<NaiveDateTime, _>(i) {
                Ok(dt) => SqlValue::DateTime(dt),
                Err(e) => {
                    debug!("{}.{}: zero date read as NULL ({})", col.table_name, col.name, e);
                    SqlValue::Null
                }
            }
        }
        CanonicalType::Time => {
            let text: String = row.try_get_unchecked(i)?;
            match parse_mysql_time(&text) {
                Some(duration) => SqlValue::Interval(duration),
                None => {
                    warn!(
                        "{}.{}: unparseable TIME value '{}', passing through",
                        col.table_name, col.name, text
                    );
                    SqlValue::Text(Cow::Owned(text))
                }
            }
        }
        CanonicalType::Blob => SqlValue::Bytes(Cow::Owned(row.try_get_unchecked(i)?)),
        CanonicalType::Char
        | CanonicalType::Varchar
        | CanonicalType::Text
        | CanonicalType::Enum(_)
        | CanonicalType::Set(_)
        | CanonicalType::Other(_) => decode_text(row, i)?,
    };

    Ok(value)
}

/// Integers of any width. Unsigned values beyond the signed 64-bit range
/// become decimals.
fn decode_integer(row: &MySqlRow, i: usize, unsigned: bool) -> Result<SqlValue<'static>> {
    if unsigned {
        let v: u64 = row.try_get_unchecked(i)?;
        Ok(match i64::try_from(v) {
            Ok(v) => SqlValue::I64(v),
            Err(_) => SqlValue::Decimal(rust_decimal::Decimal::from(v)),
        })
    } else {
        Ok(SqlValue::I64(row.try_get_unchecked::<i64, _>(i)?))
    }
}

/// Text columns with a binary collation arrive as bytes.
fn decode_text(row: &MySqlRow, i: usize) -> Result<SqlValue<'static>> {
    match row.try_get_unchecked::<String, _>(i) {
        Ok(s) => Ok(SqlValue::Text(Cow::Owned(s))),
        Err(_) => {
            let bytes: Vec<u8> = row.try_get_unchecked(i)?;
            Ok(SqlValue::Text(Cow::Owned(
                String::from_utf8_lossy(&bytes).into_owned(),
            )))
        }
    }
}

#[async_trait]
impl SourceReader for MysqlReader {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let query = r#"
            SELECT CAST(TABLE_NAME AS CHAR) AS TABLE_NAME
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
        "#;

        let rows: Vec<MySqlRow> = sqlx::query(query)
            .bind(&self.database)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrateError::pool(e, "listing MySQL tables"))?;

        let tables = rows
            .iter()
            .map(|row| row.try_get::<String, _>("TABLE_NAME"))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        info!(
            "Found {} tables in MySQL database '{}'",
            tables.len(),
            self.database
        );
        Ok(tables)
    }

    async fn load_table(&self, name: &str) -> Result<Table> {
        let mut table = Table::new(name);

        for source in self.load_source_columns(name).await? {
            let mut column = typemap::build_column(name, &source);
            if column.is_auto_increment {
                column.max_value = self.load_max_value(name, &column.name).await?;
            }
            table.columns.push(column);
        }
        if table.columns.is_empty() {
            return Err(MigrateError::SchemaExtraction(format!(
                "table {} has no columns or does not exist",
                name
            )));
        }

        table.comment = self.load_table_comment(name).await?;

        let create_sql = self.load_create_statement(name).await?;
        let keys = parser::parse_create_table(name, &create_sql);
        table.indexes = keys.indexes;
        table.foreign_keys = keys.foreign_keys;

        self.load_triggers(&mut table).await?;

        debug!(
            "Loaded table {}: {} columns, {} indexes, {} foreign keys, {} triggers",
            name,
            table.columns.len(),
            table.indexes.len(),
            table.foreign_keys.len(),
            table.triggers.len()
        );
        Ok(table)
    }

    fn read_rows<'a>(&'a self, table: &'a Table) -> RowStream<'a> {
        let sql = match select_query(table) {
            Ok(sql) => sql,
            Err(e) => return futures::stream::once(async move { Err(e) }).boxed(),
        };

        let (tx, rx) = mpsc::channel(ROW_CHANNEL_CAPACITY);
        let pool = self.pool.clone();
        let columns = table.columns.clone();
        let table_name = table.name.clone();

        tokio::spawn(async move {
            debug!("Streaming rows from {}", table_name);
            let mut rows = sqlx::query(&sql).fetch(&pool).map_err(MigrateError::from);
            while let Some(next) = rows.next().await {
                let item = next.and_then(|row| decode_row(&row, &columns));
                let failed = item.is_err();
                // Receiver dropped: the consumer stopped reading
                if tx.send(item).await.is_err() || failed {
                    break;
                }
            }
        });

        futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed()
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MigrateError::pool(e, "testing MySQL connection"))?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "mysql"
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
