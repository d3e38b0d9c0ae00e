//! Configuration type definitions.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::ddl::DdlOptions;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database configuration (MySQL / MariaDB).
    pub source: SourceConfig,

    /// Output sink: a SQL script file or a live PostgreSQL database.
    pub target: TargetConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Source database (MySQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database host.
    #[serde(default = "default_localhost")]
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Unix socket path; overrides host and port when set.
    #[serde(default)]
    pub socket: Option<String>,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default, skip_serializing)]
    pub password: String,
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("socket", &self.socket)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Output sink configuration. Exactly one of `file` and `postgres` is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Write a SQL script to this path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// Write directly into a PostgreSQL database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postgres: Option<PostgresConfig>,
}

/// Target database (PostgreSQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    /// Database host.
    #[serde(default = "default_localhost")]
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default, skip_serializing)]
    pub password: String,

    /// SSL mode: disable, require, verify-ca or verify-full (default: "require").
    #[serde(default = "default_require")]
    pub ssl_mode: String,
}

impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// When non-empty, migrate only these tables.
    #[serde(default)]
    pub only_tables: Vec<String>,

    /// Tables to skip.
    #[serde(default)]
    pub exclude_tables: Vec<String>,

    /// Skip row data; emit schema only.
    #[serde(default)]
    pub suppress_data: bool,

    /// Skip schema statements; load data into existing tables.
    #[serde(default)]
    pub suppress_ddl: bool,

    /// With `suppress_ddl`, truncate tables and reseed sequences first.
    #[serde(default)]
    pub force_truncate: bool,

    /// Use `timestamp with time zone` columns and UTC values.
    #[serde(default)]
    pub timezone: bool,

    /// Prefix for generated index and constraint names.
    #[serde(default)]
    pub index_prefix: String,

    /// Rows per COPY batch handed to the sink (default: 10000).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            only_tables: Vec::new(),
            exclude_tables: Vec::new(),
            suppress_data: false,
            suppress_ddl: false,
            force_truncate: false,
            timezone: false,
            index_prefix: String::new(),
            batch_size: default_batch_size(),
        }
    }
}

impl MigrationConfig {
    /// Per-run options for the DDL generator and row transcoder.
    pub fn ddl_options(&self) -> DdlOptions {
        DdlOptions {
            index_prefix: self.index_prefix.clone(),
            timezone: self.timezone,
        }
    }

    /// Whether a source table passes the include/exclude filters.
    pub fn includes_table(&self, name: &str) -> bool {
        if !self.only_tables.is_empty() && !self.only_tables.iter().any(|t| t == name) {
            return false;
        }
        !self.exclude_tables.iter().any(|t| t == name)
    }
}

fn default_localhost() -> String {
    "localhost".to_string()
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_pg_port() -> u16 {
    5432
}

fn default_require() -> String {
    "require".to_string()
}

fn default_batch_size() -> usize {
    10_000
}
