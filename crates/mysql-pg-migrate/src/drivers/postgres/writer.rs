//! PostgreSQL target writer implementation.
//!
//! Implements the `TargetWriter` trait over a single tokio-postgres client.
//! DDL goes through `batch_execute`; rows go through text-format
//! `COPY ... FROM STDIN`.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use futures::SinkExt;
use tokio_postgres::{Client, Config as PgConfig, CopyInSink};
use tracing::{debug, error, info, warn};

use super::tls::SslMode;
use crate::config::PostgresConfig;
use crate::copy::copy_statement;
use crate::core::schema::Table;
use crate::core::traits::TargetWriter;
use crate::error::{MigrateError, Result};

/// Connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// An open COPY.
struct CopyState {
    table: String,
    sink: Pin<Box<CopyInSink<Bytes>>>,
}

/// PostgreSQL target writer implementation.
pub struct PostgresWriter {
    client: Client,
    copy: Option<CopyState>,
}

impl PostgresWriter {
    /// Connect to the target database.
    pub async fn new(config: &PostgresConfig) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        pg_config.application_name("mysql-pg-migrate");

        // Connection options for reliability
        pg_config.keepalives(true);
        pg_config.keepalives_idle(Duration::from_secs(30));
        pg_config.connect_timeout(CONNECT_TIMEOUT);

        let client = match SslMode::parse(&config.ssl_mode)?.connector()? {
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                let (client, connection) = pg_config
                    .connect(tokio_postgres::NoTls)
                    .await
                    .map_err(|e| MigrateError::pool(e, "connecting to PostgreSQL target"))?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        error!("PostgreSQL connection error: {}", e);
                    }
                });
                client
            }
            Some(tls) => {
                let (client, connection) = pg_config
                    .connect(tls)
                    .await
                    .map_err(|e| MigrateError::pool(e, "connecting to PostgreSQL target"))?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        error!("PostgreSQL connection error: {}", e);
                    }
                });
                client
            }
        };

        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to PostgreSQL target: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self { client, copy: None })
    }

    fn open_copy(&mut self) -> Result<&mut CopyState> {
        self.copy.as_mut().ok_or_else(|| {
            MigrateError::transfer("<none>", "COPY data sent without an open COPY")
        })
    }
}

#[async_trait]
impl TargetWriter for PostgresWriter {
    async fn execute(&mut self, statements: &[String]) -> Result<()> {
        for statement in statements {
            debug!("Executing: {}", statement);
            if let Err(e) = self.client.batch_execute(statement).await {
                error!("Statement failed: {}", statement);
                return Err(e.into());
            }
        }
        Ok(())
    }

    async fn begin_copy(&mut self, table: &Table) -> Result<()> {
        if let Some(open) = &self.copy {
            return Err(MigrateError::transfer(
                &table.name,
                format!("COPY into {} is still open", open.table),
            ));
        }

        let sql = copy_statement(table)?;
        let sink = self
            .client
            .copy_in::<str, Bytes>(sql.as_str())
            .await
            .map_err(|e| MigrateError::transfer(&table.name, format!("initiating COPY: {}", e)))?;

        self.copy = Some(CopyState {
            table: table.name.clone(),
            sink: Box::pin(sink),
        });
        Ok(())
    }

    async fn write_copy_lines(&mut self, lines: &[String]) -> Result<()> {
        let copy = self.open_copy()?;

        let size = lines.iter().map(|l| l.len() + 1).sum();
        let mut buf = BytesMut::with_capacity(size);
        for line in lines {
            buf.put_slice(line.as_bytes());
            buf.put_u8(b'\n');
        }

        copy.sink
            .send(buf.freeze())
            .await
            .map_err(|e| MigrateError::transfer(&copy.table, format!("sending COPY data: {}", e)))
    }

    async fn finish_copy(&mut self) -> Result<u64> {
        let mut copy = self
            .copy
            .take()
            .ok_or_else(|| MigrateError::transfer("<none>", "no COPY to finish"))?;

        let rows = copy
            .sink
            .as_mut()
            .finish()
            .await
            .map_err(|e| MigrateError::transfer(&copy.table, format!("finishing COPY: {}", e)))?;

        debug!("COPY into {} finished: {} rows", copy.table, rows);
        Ok(rows)
    }

    async fn ping(&mut self) -> Result<()> {
        self.client.simple_query("SELECT 1").await?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "postgres"
    }

    /// Statements run as they are sent; nothing is buffered client-side.
    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        // Dropping an unfinished sink aborts the COPY
        if let Some(copy) = self.copy.take() {
            warn!("Aborting unfinished COPY into {}", copy.table);
        }
        Ok(())
    }
}
