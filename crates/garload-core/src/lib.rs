//! Core conversion engine for GAR registry exports.
//!
//! Everything here is synchronous and process-free: schema catalog
//! loading, storage access, streaming XML record parsing, per-target
//! rendering and output routing. Process orchestration, database
//! import and verification live in the `garload` binary crate.

pub mod convert;
pub mod error;
pub mod output;
pub mod render;
pub mod schema;
pub mod source;
pub mod storage;

pub use convert::{Converter, TableReport};
pub use error::{
    ConfigError, ConvertError, OutputError, ParseError, RenderError, SchemaError, SourceError,
};
pub use output::{OutputMode, OutputRouter};
pub use render::{Registry, RenderOptions, Representation, RepresentationRef};
pub use schema::{Catalog, CatalogRef, Scope, TableDefinition};
pub use source::{Batch, ParsePolicy, Record};
pub use storage::Storage;
