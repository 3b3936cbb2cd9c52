//! External database import client.
//!
//! Imports go through the stock `psql` client rather than a driver
//! connection: rendered dumps are plain SQL files, and `psql --file`
//! applies them with server-side speed while keeping the converter
//! free of database wire protocol concerns.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use snafu::prelude::*;
use tokio::process::Command;
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::error::{ImportError, ScalarParseSnafu, SpawnSnafu};

/// Seam between the pipeline and the database.
#[async_trait]
pub trait ImportClient: Send + Sync {
    /// Apply a rendered SQL file.
    async fn import(&self, dump: &Path) -> Result<(), ImportError>;

    /// Run a statement returning a single integer.
    async fn query_scalar(&self, sql: &str) -> Result<i64, ImportError>;
}

/// Production client invoking `psql`.
pub struct PsqlClient {
    config: DatabaseConfig,
}

impl PsqlClient {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.config.psql);
        cmd.arg("--quiet");
        // A DSN carries the whole connection; discrete flags would
        // override parts of it.
        match &self.config.dsn {
            Some(dsn) => {
                cmd.arg("--dbname").arg(dsn);
            }
            None => {
                cmd.arg("--host")
                    .arg(&self.config.host)
                    .arg("--port")
                    .arg(self.config.port.to_string())
                    .arg("--username")
                    .arg(&self.config.user)
                    .arg("--dbname")
                    .arg(&self.config.database);
            }
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(password) = &self.config.password {
            cmd.env("PGPASSWORD", password);
        }
        cmd
    }

    async fn run(&self, mut cmd: Command, dump: &str) -> Result<String, ImportError> {
        let output = cmd.output().await.context(SpawnSnafu {
            command: self.config.psql.clone(),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return match output.status.code() {
                Some(code) => Err(ImportError::CommandFailed {
                    dump: dump.to_string(),
                    code,
                    stderr,
                }),
                None => Err(ImportError::Terminated {
                    dump: dump.to_string(),
                }),
            };
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl ImportClient for PsqlClient {
    async fn import(&self, dump: &Path) -> Result<(), ImportError> {
        debug!(dump = %dump.display(), "Applying SQL file");
        let mut cmd = self.command();
        cmd.arg("--file").arg(dump);
        self.run(cmd, &dump.display().to_string()).await?;
        Ok(())
    }

    async fn query_scalar(&self, sql: &str) -> Result<i64, ImportError> {
        let mut cmd = self.command();
        cmd.arg("--no-align").arg("--tuples-only").arg("--command").arg(sql);
        let output = self.run(cmd, sql).await?;
        let value = output.trim();
        value.parse::<i64>().ok().context(ScalarParseSnafu {
            sql,
            output: value,
        })
    }
}
