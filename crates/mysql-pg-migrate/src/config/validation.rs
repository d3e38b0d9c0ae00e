//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    let has_socket = config
        .source
        .socket
        .as_deref()
        .is_some_and(|s| !s.is_empty());
    if config.source.host.is_empty() && !has_socket {
        return Err(MigrateError::Config(
            "source.host or source.socket is required".into(),
        ));
    }
    if config.source.database.is_empty() {
        return Err(MigrateError::Config("source.database is required".into()));
    }
    if config.source.user.is_empty() {
        return Err(MigrateError::Config("source.user is required".into()));
    }

    // Target validation
    match (&config.target.file, &config.target.postgres) {
        (Some(_), Some(_)) => {
            return Err(MigrateError::Config(
                "target.file and target.postgres are mutually exclusive".into(),
            ));
        }
        (None, None) => {
            return Err(MigrateError::Config(
                "one of target.file or target.postgres is required".into(),
            ));
        }
        (Some(path), None) if path.as_os_str().is_empty() => {
            return Err(MigrateError::Config("target.file cannot be empty".into()));
        }
        (None, Some(pg)) => {
            if pg.host.is_empty() {
                return Err(MigrateError::Config(
                    "target.postgres.host is required".into(),
                ));
            }
            if pg.database.is_empty() {
                return Err(MigrateError::Config(
                    "target.postgres.database is required".into(),
                ));
            }
            if pg.user.is_empty() {
                return Err(MigrateError::Config(
                    "target.postgres.user is required".into(),
                ));
            }
            if !matches!(
                pg.ssl_mode.to_lowercase().as_str(),
                "disable" | "require" | "verify-ca" | "verify-full"
            ) {
                return Err(MigrateError::Config(format!(
                    "Invalid ssl_mode '{}'. Valid options: disable, require, verify-ca, verify-full",
                    pg.ssl_mode
                )));
            }
        }
        _ => {}
    }

    // Migration config validation
    let migration = &config.migration;
    if migration.batch_size == 0 {
        return Err(MigrateError::Config(
            "migration.batch_size must be at least 1".into(),
        ));
    }
    if let Some(table) = migration
        .only_tables
        .iter()
        .find(|t| migration.exclude_tables.contains(t))
    {
        return Err(MigrateError::Config(format!(
            "table '{}' is listed in both migration.only_tables and migration.exclude_tables",
            table
        )));
    }

    Ok(())
}
