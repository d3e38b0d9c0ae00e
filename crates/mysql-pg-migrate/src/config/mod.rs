//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use std::path::Path;

/// Sample configuration written by `init`.
const SAMPLE_YAML: &str = r#"# mysql-pg-migrate configuration

source:
  host: localhost
  port: 3306
  # socket: /var/run/mysqld/mysqld.sock
  database: app
  user: root
  password: ""

target:
  # Write a SQL script that psql can replay...
  file: out.sql
  # ...or load straight into PostgreSQL (remove `file` above):
  # postgres:
  #   host: localhost
  #   port: 5432
  #   database: app
  #   user: postgres
  #   password: ""
  #   ssl_mode: disable

migration:
  only_tables: []
  exclude_tables: []
  suppress_data: false
  suppress_ddl: false
  force_truncate: false
  timezone: false
  index_prefix: ""
  batch_size: 10000
"#;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Annotated sample configuration.
    pub fn sample_yaml() -> &'static str {
        SAMPLE_YAML
    }
}
