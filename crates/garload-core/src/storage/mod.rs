//! Uniform access to the registry source: an extracted directory tree
//! or a ZIP archive read in place, without prior extraction.
//!
//! Data files are named `AS_<TABLE>_<date>.XML` (or `AS_<TABLE>.XML`)
//! and live either at the source root (common tables, schema
//! declarations) or under a fixed-width numeric region directory.

mod archive;
mod dir;

use std::io::Read;
use std::path::Path;

pub use archive::ArchiveStorage;
pub use dir::DirectoryStorage;

use crate::error::SourceError;

/// Extension of schema entity declarations.
pub const SCHEMA_EXT: &str = "xsd";
/// Extension of table data files.
pub const DATA_EXT: &str = "xml";

/// A resolved source of schema and table files.
pub enum Storage {
    Directory(DirectoryStorage),
    Archive(ArchiveStorage),
}

impl Storage {
    /// Auto-detect the storage kind for a path.
    pub fn resolve(path: &Path) -> Result<Self, SourceError> {
        if path.is_dir() {
            return Ok(Self::Directory(DirectoryStorage::new(path)));
        }
        if path.is_file() {
            return Ok(Self::Archive(ArchiveStorage::open(path)?));
        }
        Err(SourceError::UnsupportedPath {
            path: path.display().to_string(),
        })
    }

    /// Region codes present in the source, sorted.
    pub fn list_regions(&self) -> Result<Vec<String>, SourceError> {
        match self {
            Self::Directory(d) => d.list_regions(),
            Self::Archive(a) => Ok(a.list_regions()),
        }
    }

    /// Open the schema declaration for an entity.
    pub fn open_schema(&mut self, entity: &str) -> Result<Box<dyn Read + '_>, SourceError> {
        match self {
            Self::Directory(d) => d.open(entity, None, SCHEMA_EXT),
            Self::Archive(a) => a.open_member(entity, None, SCHEMA_EXT),
        }
    }

    /// Open the data file for a table, scoped to a region for
    /// region-partitioned tables.
    pub fn open_table(
        &mut self,
        table: &str,
        region: Option<&str>,
    ) -> Result<Box<dyn Read + '_>, SourceError> {
        match self {
            Self::Directory(d) => d.open(table, region, DATA_EXT),
            Self::Archive(a) => a.open_member(table, region, DATA_EXT),
        }
    }
}

/// Whether a path component is a region code (fixed-width numeric).
pub(crate) fn is_region_code(part: &str) -> bool {
    !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit())
}

/// Match a file name against `AS_<table>.<ext>` or
/// `AS_<table>_<digits...>.<ext>`, case-insensitively.
///
/// The digit requirement after the underscore keeps `ADDR_OBJ` from
/// swallowing `ADDR_OBJ_TYPES` files.
pub(crate) fn member_matches(file_name: &str, table: &str, ext: &str) -> bool {
    let name = file_name.to_ascii_lowercase();
    let prefix = format!("as_{}", table.to_ascii_lowercase());
    let Some(rest) = name.strip_prefix(&prefix) else {
        return false;
    };
    let suffix = format!(".{ext}");
    if rest == suffix {
        return true;
    }
    match rest.strip_prefix('_') {
        Some(tail) => {
            tail.as_bytes().first().is_some_and(u8::is_ascii_digit) && tail.ends_with(&suffix)
        }
        None => false,
    }
}

/// Human-readable scope label for error messages.
pub(crate) fn scope_label(region: Option<&str>) -> String {
    region.map_or_else(|| "source root".to_string(), ToString::to_string)
}
