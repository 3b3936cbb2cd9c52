//! Streaming record source.
//!
//! Turns one table's XML element stream into batches of records in a
//! single pass. Memory use is bounded by element nesting depth and the
//! active batch size, never by total input size.

mod reader;

use serde::Deserialize;

pub use reader::{ReadStats, TableReader};

/// Policy for malformed row elements.
///
/// Partial region data is unsafe to import silently, so the default
/// aborts the owning region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsePolicy {
    #[default]
    AbortRegion,
    SkipElement,
}

/// One row of a table: raw values aligned to the catalog's column
/// order. Type coercion is deferred to the representation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub values: Vec<Option<String>>,
}

/// A bounded, ordered group of records for one table; the unit of
/// rendering and writing.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub rows: Vec<Record>,
}

impl Batch {
    pub fn with_capacity(rows: usize) -> Self {
        Self {
            rows: Vec::with_capacity(rows),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
