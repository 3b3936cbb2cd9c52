//! Error types for catalog loading, source streaming and rendering.

use snafu::prelude::*;

/// Errors raised while loading the schema catalog.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SchemaError {
    /// An entity declaration could not be parsed.
    #[snafu(display("Malformed entity declaration for {entity}: {message}"))]
    MalformedEntity { entity: String, message: String },

    /// An entity declaration does not describe any columns.
    #[snafu(display("Entity declaration for {entity} has no columns"))]
    EmptyEntity { entity: String },

    /// A foreign key points at a table or column the catalog does not know.
    #[snafu(display(
        "Foreign key {table}.{column} references unknown target {target_table}.{target_column}"
    ))]
    UnresolvedForeignKey {
        table: String,
        column: String,
        target_table: String,
        target_column: String,
    },

    /// Two entity declarations map to the same table identifier.
    #[snafu(display("Duplicate table identifier {table}"))]
    DuplicateTable { table: String },

    /// Lookup for a table the catalog does not contain.
    #[snafu(display("Table {table} not present in catalog"))]
    TableNotFound { table: String },

    /// A key declaration names a column the entity does not carry.
    #[snafu(display("Key column {column} not declared by table {table}"))]
    UnknownKeyColumn { table: String, column: String },

    /// The schema source could not serve an entity declaration.
    #[snafu(display("Failed to read schema source for {entity}"))]
    SchemaSource { entity: String, source: SourceError },
}

/// Errors raised by the storage layer (directory tree or archive).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SourceError {
    /// Path is neither a directory nor a readable ZIP archive.
    #[snafu(display("Unsupported source path: {path}"))]
    UnsupportedPath { path: String },

    /// Archive could not be opened or read.
    #[snafu(display("Failed to read archive {path}"))]
    Archive {
        path: String,
        source: zip::result::ZipError,
    },

    /// IO error while reading from the source.
    #[snafu(display("IO error reading source: {source}"))]
    Io { source: std::io::Error },

    /// No file found for the requested table.
    #[snafu(display("No source file for table {table} in {scope}"))]
    MemberNotFound { table: String, scope: String },

    /// More than one file matched the requested table.
    #[snafu(display("More than one source file for table {table} in {scope}"))]
    AmbiguousMember { table: String, scope: String },
}

/// Errors raised while streaming an XML table file.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ParseError {
    /// The element stream is structurally broken.
    #[snafu(display("Malformed XML at byte {position}: {source}"))]
    Xml {
        position: u64,
        source: quick_xml::Error,
    },

    /// A row element carries an attribute that cannot be decoded.
    #[snafu(display("Bad attribute on row element at byte {position}: {message}"))]
    RowAttribute { position: u64, message: String },

    /// The document ended before the root element closed.
    #[snafu(display("Unexpected end of document (truncated input?)"))]
    Truncated,
}

/// Errors raised when a value cannot be represented under a target's rules.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RenderError {
    #[snafu(display("Value {value:?} in {table}.{column} is not a valid integer literal"))]
    InvalidInteger {
        table: String,
        column: String,
        value: String,
    },

    #[snafu(display("Value {value:?} in {table}.{column} is not a valid decimal literal"))]
    InvalidDecimal {
        table: String,
        column: String,
        value: String,
    },

    #[snafu(display("Value {value:?} in {table}.{column} is not a valid boolean literal"))]
    InvalidBoolean {
        table: String,
        column: String,
        value: String,
    },
}

/// Errors raised while writing rendered output to destinations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum OutputError {
    /// Destination file or parent directory could not be created.
    #[snafu(display("Failed to create destination {path}"))]
    CreateDestination {
        path: String,
        source: std::io::Error,
    },

    /// Write to an open destination failed.
    #[snafu(display("Failed to write destination {path}"))]
    WriteDestination {
        path: String,
        source: std::io::Error,
    },
}

/// Umbrella error for one table conversion pass; carries enough
/// context to attribute the failure to a table and region.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConvertError {
    #[snafu(display("Catalog error: {source}"))]
    Catalog { source: SchemaError },

    #[snafu(display("Source error for table {table} ({scope}): {source}"))]
    TableSource {
        table: String,
        scope: String,
        source: SourceError,
    },

    #[snafu(display("Parse error in table {table} ({scope}): {source}"))]
    TableParse {
        table: String,
        scope: String,
        source: ParseError,
    },

    #[snafu(display("Render error: {source}"))]
    Render { source: RenderError },

    #[snafu(display("Output error: {source}"))]
    Output { source: OutputError },
}

/// Configuration errors, fatal before any work starts.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Requested target key is not registered.
    #[snafu(display("Unknown target {target}; available targets: {}", available.join(", ")))]
    UnknownTarget {
        target: String,
        available: Vec<String>,
    },

    /// A target key was registered twice.
    #[snafu(display("Target {target} is already registered"))]
    DuplicateTarget { target: String },

    /// A table filter names a table the catalog does not know.
    #[snafu(display("Unknown table {table}"))]
    UnknownTable { table: String },

    /// Requested regions are absent from the source archive.
    #[snafu(display("Requested regions not found in source: {}", regions.join(", ")))]
    UnknownRegions { regions: Vec<String> },

    /// Delimited targets cannot mix several tables in one destination.
    #[snafu(display("Target {target} cannot mix multiple tables in a single destination"))]
    MixedTables { target: String },

    /// Verification tolerance must lie in (0, 1].
    #[snafu(display("Invalid tolerance {value}; expected a fraction in (0, 1]"))]
    InvalidTolerance { value: f64 },
}
