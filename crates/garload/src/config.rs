//! Run configuration: database connection and run options.
//!
//! Options follow a fixed precedence: defaults, then the optional YAML
//! options file, then CLI flags.

use std::path::Path;

use serde::Deserialize;
use snafu::prelude::*;

use garload_core::{OutputMode, ParsePolicy, RenderOptions};

use crate::error::{OptionsError, ParseOptionsSnafu, ReadOptionsSnafu};

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_user() -> String {
    "postgres".to_string()
}

fn default_database() -> String {
    "gar".to_string()
}

fn default_psql() -> String {
    "psql".to_string()
}

/// Connection parameters for the external import client.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Connection string handed to the client as the database name.
    /// When set, the discrete host/port/user/database parameters are
    /// ignored.
    pub dsn: Option<String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_user")]
    pub user: String,
    /// Passed to the client through `PGPASSWORD`, never on the command
    /// line.
    pub password: Option<String>,
    #[serde(default = "default_database")]
    pub database: String,
    /// Client binary to invoke.
    #[serde(default = "default_psql")]
    pub psql: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: None,
            database: default_database(),
            psql: default_psql(),
        }
    }
}

/// Options shared by the rendering commands, loadable from a YAML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunOptions {
    pub render: RenderOptions,
    pub policy: ParsePolicy,
    pub mode: OutputMode,
    pub database: DatabaseConfig,
}

impl RunOptions {
    /// Load options from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, OptionsError> {
        let text = std::fs::read_to_string(path).context(ReadOptionsSnafu { path })?;
        serde_yaml::from_str(&text).context(ParseOptionsSnafu { path })
    }
}
