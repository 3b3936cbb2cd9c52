//! Command-line interface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use garload_core::{OutputMode, ParsePolicy};

use crate::config::{DatabaseConfig, RunOptions};
use crate::error::OptionsError;

#[derive(Debug, Parser)]
#[command(name = "garload", version, about = "GAR address registry converter")]
pub struct Cli {
    /// Optional YAML run-options file; CLI flags override its values.
    #[arg(long, global = true, value_name = "FILE")]
    pub options: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Render DDL for the selected tables.
    Schema(SchemaArgs),
    /// Render data dumps without importing them.
    Dump(DumpArgs),
    /// Convert and import the full registry, region by region.
    Pipeline(PipelineArgs),
    /// Check row statistics of an imported database.
    Verify(VerifyArgs),
}

/// Rendering flags shared by the converting subcommands.
#[derive(Debug, Clone, Args)]
pub struct RenderArgs {
    /// Output target.
    #[arg(long, default_value = "mysql")]
    pub target: String,

    /// Rows per rendered batch.
    #[arg(long)]
    pub batch_rows: Option<usize>,

    /// Declared destination encoding.
    #[arg(long)]
    pub encoding: Option<String>,

    /// Omit primary and secondary keys from DDL.
    #[arg(long)]
    pub no_keys: bool,

    /// Emit DROP TABLE IF EXISTS before each CREATE.
    #[arg(long)]
    pub pre_drop: bool,

    /// Storage-engine hint (MySQL DDL only).
    #[arg(long)]
    pub engine: Option<String>,

    /// Skip malformed row elements instead of failing the region.
    #[arg(long)]
    pub skip_broken: bool,
}

impl RenderArgs {
    /// Fold the flags into options loaded from file or defaults.
    pub fn apply(&self, opts: &mut RunOptions) {
        if let Some(batch_rows) = self.batch_rows {
            opts.render.batch_rows = batch_rows;
        }
        if let Some(encoding) = &self.encoding {
            opts.render.encoding = Some(encoding.clone());
        }
        if self.no_keys {
            opts.render.include_keys = false;
        }
        if self.pre_drop {
            opts.render.pre_drop = true;
        }
        if let Some(engine) = &self.engine {
            opts.render.engine = engine.clone();
        }
        if self.skip_broken {
            opts.policy = ParsePolicy::SkipElement;
        }
    }
}

/// Database connection flags.
#[derive(Debug, Clone, Args)]
pub struct DbArgs {
    /// Connection string; overrides the discrete connection flags.
    #[arg(long = "db-dsn")]
    pub dsn: Option<String>,

    #[arg(long = "db-host")]
    pub host: Option<String>,

    #[arg(long = "db-port")]
    pub port: Option<u16>,

    #[arg(long = "db-user")]
    pub user: Option<String>,

    /// Database password; falls back to the PGPASSWORD environment
    /// variable, then the options file.
    #[arg(long = "db-password", env = "PGPASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[arg(long = "db-name")]
    pub database: Option<String>,
}

impl DbArgs {
    pub fn apply(&self, config: &mut DatabaseConfig) {
        if let Some(dsn) = &self.dsn {
            config.dsn = Some(dsn.clone());
        }
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(user) = &self.user {
            config.user = user.clone();
        }
        if let Some(password) = &self.password {
            config.password = Some(password.clone());
        }
        if let Some(database) = &self.database {
            config.database = database.clone();
        }
    }
}

#[derive(Debug, Args)]
pub struct SchemaArgs {
    /// Schema source: extracted directory or ZIP archive.
    pub source: PathBuf,

    /// Output file, or directory for per-table files.
    pub output: PathBuf,

    /// Restrict to the named tables.
    #[arg(long, value_delimiter = ',')]
    pub tables: Vec<String>,

    #[command(flatten)]
    pub render: RenderArgs,
}

#[derive(Debug, Args)]
pub struct DumpArgs {
    /// Data source: extracted directory or ZIP archive.
    pub source: PathBuf,

    /// Output file (direct mode) or directory (other modes).
    pub output: PathBuf,

    /// Restrict to the named tables.
    #[arg(long, value_delimiter = ',')]
    pub tables: Vec<String>,

    /// Restrict to the named region codes.
    #[arg(long, value_delimiter = ',')]
    pub regions: Vec<String>,

    /// Output layout.
    #[arg(long)]
    pub mode: Option<OutputMode>,

    #[command(flatten)]
    pub render: RenderArgs,
}

#[derive(Debug, Args)]
pub struct PipelineArgs {
    /// Registry archive: local path or http(s) URL.
    pub source: String,

    /// Schema source; defaults to the archive itself.
    #[arg(long)]
    pub schema: Option<PathBuf>,

    /// Restrict to the named tables.
    #[arg(long, value_delimiter = ',')]
    pub tables: Vec<String>,

    /// Restrict to the named region codes.
    #[arg(long, value_delimiter = ',')]
    pub regions: Vec<String>,

    /// Concurrent region workers; defaults to available parallelism.
    #[arg(long)]
    pub jobs: Option<usize>,

    /// Directory for failed-region artifacts.
    #[arg(long, default_value = ".")]
    pub artifact_dir: PathBuf,

    /// Keep a downloaded archive in the artifact directory.
    #[arg(long)]
    pub keep_archive: bool,

    /// Print the job summary as JSON.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub render: RenderArgs,

    #[command(flatten)]
    pub db: DbArgs,
}

#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Expected total of main address objects.
    #[arg(long)]
    pub expected: Option<i64>,

    /// Relative tolerance for the expected total, as a fraction.
    #[arg(long, default_value_t = 0.02)]
    pub tolerance: f64,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub db: DbArgs,
}

impl Cli {
    /// Resolve run options: file values under CLI flags.
    pub fn run_options(&self) -> Result<RunOptions, OptionsError> {
        let mut opts = match &self.options {
            Some(path) => RunOptions::from_file(path)?,
            None => RunOptions::default(),
        };
        match &self.command {
            Command::Schema(args) => args.render.apply(&mut opts),
            Command::Dump(args) => {
                args.render.apply(&mut opts);
                if let Some(mode) = args.mode {
                    opts.mode = mode;
                }
            }
            Command::Pipeline(args) => {
                args.render.apply(&mut opts);
                args.db.apply(&mut opts.database);
            }
            Command::Verify(args) => args.db.apply(&mut opts.database),
        }
        Ok(opts)
    }
}
