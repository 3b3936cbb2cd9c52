//! Delimited text representations (CSV and TSV).
//!
//! Data-only targets: `render_schema` yields a header line rather than
//! DDL, destinations carry no framing markers, and a destination may
//! hold exactly one table.

use crate::error::RenderError;
use crate::schema::TableDefinition;
use crate::source::Batch;

use super::{Representation, RenderOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Csv,
    Tsv,
}

/// CSV/TSV representation; values pass through as raw text.
pub struct DelimitedRepresentation {
    flavor: Flavor,
}

impl DelimitedRepresentation {
    /// Comma-separated: RFC 4180 quoting, empty string as null token.
    pub fn csv() -> Self {
        Self {
            flavor: Flavor::Csv,
        }
    }

    /// Tab-separated: backslash escapes, `\N` as null token.
    pub fn tsv() -> Self {
        Self {
            flavor: Flavor::Tsv,
        }
    }

    fn delimiter(&self) -> char {
        match self.flavor {
            Flavor::Csv => ',',
            Flavor::Tsv => '\t',
        }
    }

    fn push_field(&self, value: Option<&str>, out: &mut String) {
        match self.flavor {
            Flavor::Csv => {
                let Some(value) = value else { return };
                if value.contains([',', '"', '\n', '\r']) {
                    out.push('"');
                    for c in value.chars() {
                        if c == '"' {
                            out.push('"');
                        }
                        out.push(c);
                    }
                    out.push('"');
                } else {
                    out.push_str(value);
                }
            }
            Flavor::Tsv => {
                let Some(value) = value else {
                    out.push_str("\\N");
                    return;
                };
                for c in value.chars() {
                    match c {
                        '\\' => out.push_str("\\\\"),
                        '\t' => out.push_str("\\t"),
                        '\n' => out.push_str("\\n"),
                        '\r' => out.push_str("\\r"),
                        c => out.push(c),
                    }
                }
            }
        }
    }
}

impl Representation for DelimitedRepresentation {
    fn key(&self) -> &'static str {
        match self.flavor {
            Flavor::Csv => "csv",
            Flavor::Tsv => "tsv",
        }
    }

    fn extension(&self) -> &'static str {
        match self.flavor {
            Flavor::Csv => "csv",
            Flavor::Tsv => "tsv",
        }
    }

    fn includes_meta(&self) -> bool {
        false
    }

    fn single_table_only(&self) -> bool {
        true
    }

    fn render_schema(&self, def: &TableDefinition, _opts: &RenderOptions) -> String {
        let mut header = String::new();
        for (idx, col) in def.columns.iter().enumerate() {
            if idx > 0 {
                header.push(self.delimiter());
            }
            header.push_str(&col.name);
        }
        header.push('\n');
        header
    }

    fn render_batch(
        &self,
        def: &TableDefinition,
        batch: &Batch,
        _opts: &RenderOptions,
    ) -> Result<Vec<u8>, RenderError> {
        let mut out = String::new();
        for record in &batch.rows {
            for (idx, _) in def.columns.iter().enumerate() {
                if idx > 0 {
                    out.push(self.delimiter());
                }
                let value = record.values.get(idx).and_then(Option::as_deref);
                self.push_field(value.filter(|v| !v.is_empty()), &mut out);
            }
            out.push('\n');
        }
        Ok(out.into_bytes())
    }
}
