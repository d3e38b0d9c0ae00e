//! SQL script target.
//!
//! Writes everything a live target would receive into a file that `psql`
//! can replay: DDL statements verbatim and row data as `COPY ... FROM stdin;`
//! blocks terminated by `\.`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::info;

use crate::copy::copy_statement;
use crate::core::schema::Table;
use crate::core::traits::TargetWriter;
use crate::error::{MigrateError, Result};

/// Session settings emitted at the top of every script.
const HEADER: &str = "\
SET client_encoding = 'UTF8';
SET standard_conforming_strings = off;
SET check_function_bodies = false;
SET client_min_messages = warning;
";

/// Terminator of a COPY data block.
const COPY_END: &str = "\\.";

/// Writes the migration as a SQL script.
///
/// The file is created on the first write, so a writer that only answers
/// health checks leaves nothing behind.
pub struct FileWriter {
    path: PathBuf,
    out: Option<BufWriter<File>>,
    copy: Option<(String, u64)>,
}

impl FileWriter {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            out: None,
            copy: None,
        }
    }

    /// Path of the script being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The open script, created (or truncated) with its header on first use.
    async fn out(&mut self) -> Result<&mut BufWriter<File>> {
        if self.out.is_none() {
            let file = File::create(&self.path).await?;
            let mut out = BufWriter::new(file);
            out.write_all(HEADER.as_bytes()).await?;
            out.write_all(b"\n").await?;
            info!("Writing SQL script to {}", self.path.display());
            self.out = Some(out);
        }
        self.out
            .as_mut()
            .ok_or_else(|| MigrateError::Config(format!("cannot open {}", self.path.display())))
    }

    async fn write_lines(&mut self, lines: &[String]) -> Result<()> {
        let out = self.out().await?;
        for line in lines {
            out.write_all(line.as_bytes()).await?;
            out.write_all(b"\n").await?;
        }
        Ok(())
    }
}

#[async_trait]
impl TargetWriter for FileWriter {
    async fn execute(&mut self, statements: &[String]) -> Result<()> {
        self.write_lines(statements).await
    }

    async fn begin_copy(&mut self, table: &Table) -> Result<()> {
        if let Some((open, _)) = &self.copy {
            return Err(MigrateError::transfer(
                &table.name,
                format!("COPY into {} is still open", open),
            ));
        }

        let statement = copy_statement(table)?;
        let header = format!("{} FROM stdin;", statement.trim_end_matches(" FROM STDIN"));
        self.write_lines(&[header]).await?;
        self.copy = Some((table.name.clone(), 0));
        Ok(())
    }

    async fn write_copy_lines(&mut self, lines: &[String]) -> Result<()> {
        match self.copy.as_mut() {
            Some((_, rows)) => *rows += lines.len() as u64,
            None => {
                return Err(MigrateError::transfer(
                    "<none>",
                    "COPY data sent without an open COPY",
                ))
            }
        }
        self.write_lines(lines).await
    }

    async fn finish_copy(&mut self) -> Result<u64> {
        let (_, rows) = self
            .copy
            .take()
            .ok_or_else(|| MigrateError::transfer("<none>", "no COPY to finish"))?;

        self.write_lines(&[COPY_END.to_string(), String::new()]).await?;
        Ok(rows)
    }

    async fn ping(&mut self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        if !tokio::fs::metadata(dir).await?.is_dir() {
            return Err(MigrateError::Config(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
        Ok(())
    }

    fn db_type(&self) -> &str {
        "file"
    }

    async fn flush(&mut self) -> Result<()> {
        if let Some(out) = self.out.as_mut() {
            out.flush().await?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.copy.is_some() {
            self.finish_copy().await?;
        }
        let out = self.out().await?;
        out.flush().await?;
        out.get_mut().sync_all().await?;
        Ok(())
    }
}
