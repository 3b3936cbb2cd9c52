//! garload CLI: convert, import and verify GAR registry exports.

pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod import;
pub mod pipeline;
pub mod signal;
pub mod tracing;
pub mod verify;

pub use cli::{Cli, Command};
pub use config::{DatabaseConfig, RunOptions};
pub use error::PipelineError;
pub use import::{ImportClient, PsqlClient};
pub use pipeline::{JobSummary, PipelineOptions};
pub use tracing::init_tracing;
