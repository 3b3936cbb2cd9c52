//! Error types for the garload CLI.

use std::path::PathBuf;

use snafu::prelude::*;

// Re-export core errors used at the command boundary.
pub use garload_core::error::{ConfigError, ConvertError, OutputError, SchemaError, SourceError};

/// Errors raised while acquiring the source archive.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum FetchError {
    /// Local source path does not exist.
    #[snafu(display("Source path {path} does not exist"))]
    MissingSource { path: String },

    /// Download request failed.
    #[snafu(display("Failed to download {url}: {source}"))]
    Download { url: String, source: reqwest::Error },

    /// Server answered with a non-success status.
    #[snafu(display("Download of {url} failed with status {status}"))]
    Status { url: String, status: u16 },

    /// Downloaded bytes could not be written to disk.
    #[snafu(display("Failed to write downloaded archive {}: {source}", path.display()))]
    WriteArchive {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Scratch directory for the download could not be created.
    #[snafu(display("Failed to create download directory: {source}"))]
    ScratchDir { source: std::io::Error },
}

/// Errors raised while invoking the external import client.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ImportError {
    /// The client binary could not be spawned.
    #[snafu(display("Failed to spawn {command}: {source}"))]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    /// The client exited with a non-zero status.
    #[snafu(display("Import of {dump} failed (exit {code}): {stderr}"))]
    CommandFailed {
        dump: String,
        code: i32,
        stderr: String,
    },

    /// The client was killed by a signal before exiting.
    #[snafu(display("Import of {dump} terminated by signal"))]
    Terminated { dump: String },

    /// Query output was not the expected scalar.
    #[snafu(display("Unexpected query output {output:?} for: {sql}"))]
    ScalarParse { sql: String, output: String },
}

/// Errors raised by the verification engine.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum VerifyError {
    /// Invalid verification configuration.
    #[snafu(display("Verification configuration error: {source}"))]
    VerifyConfig { source: ConfigError },

    /// A statistics query failed.
    #[snafu(display("Statistics query failed: {source}"))]
    StatQuery { source: ImportError },

    /// The machine-readable report could not be serialized.
    #[snafu(display("Failed to serialize verification report: {source}"))]
    ReportSerialize { source: serde_json::Error },
}

/// Errors raised while loading the run options file.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum OptionsError {
    #[snafu(display("Failed to read options file {}: {source}", path.display()))]
    ReadOptions {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Failed to parse options file {}: {source}", path.display()))]
    ParseOptions {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Top-level errors for the command surface.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Configuration error.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// Run options file error.
    #[snafu(display("Options error: {source}"))]
    Options { source: OptionsError },

    /// Schema catalog error.
    #[snafu(display("Catalog error: {source}"))]
    Catalog { source: SchemaError },

    /// Source storage error.
    #[snafu(display("Source error: {source}"))]
    Source { source: SourceError },

    /// Conversion error.
    #[snafu(display("Conversion error: {source}"))]
    Convert { source: ConvertError },

    /// Output routing error.
    #[snafu(display("Output error: {source}"))]
    Output { source: OutputError },

    /// Archive acquisition error.
    #[snafu(display("Fetch error: {source}"))]
    Fetch { source: FetchError },

    /// Database import error.
    #[snafu(display("Import error: {source}"))]
    Import { source: ImportError },

    /// Verification error.
    #[snafu(display("Verification error: {source}"))]
    Verify { source: VerifyError },

    /// Failed-region artifact could not be preserved.
    #[snafu(display("Failed to preserve artifact {}: {source}", path.display()))]
    Artifact {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Scratch-space IO error.
    #[snafu(display("Workspace IO error: {source}"))]
    Workspace { source: std::io::Error },

    /// Worker task panicked or was aborted.
    #[snafu(display("Task join error: {source}"))]
    TaskJoin { source: tokio::task::JoinError },
}

impl From<ConfigError> for PipelineError {
    fn from(source: ConfigError) -> Self {
        PipelineError::Config { source }
    }
}

impl From<OptionsError> for PipelineError {
    fn from(source: OptionsError) -> Self {
        PipelineError::Options { source }
    }
}

impl From<SchemaError> for PipelineError {
    fn from(source: SchemaError) -> Self {
        PipelineError::Catalog { source }
    }
}

impl From<SourceError> for PipelineError {
    fn from(source: SourceError) -> Self {
        PipelineError::Source { source }
    }
}

impl From<ConvertError> for PipelineError {
    fn from(source: ConvertError) -> Self {
        PipelineError::Convert { source }
    }
}

impl From<OutputError> for PipelineError {
    fn from(source: OutputError) -> Self {
        PipelineError::Output { source }
    }
}

impl From<FetchError> for PipelineError {
    fn from(source: FetchError) -> Self {
        PipelineError::Fetch { source }
    }
}

impl From<ImportError> for PipelineError {
    fn from(source: ImportError) -> Self {
        PipelineError::Import { source }
    }
}

impl From<VerifyError> for PipelineError {
    fn from(source: VerifyError) -> Self {
        PipelineError::Verify { source }
    }
}
