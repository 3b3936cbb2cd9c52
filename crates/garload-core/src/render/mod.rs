//! Per-target representations: pure DDL and batch renderers.
//!
//! Each target bundles its quoting, escaping, delimiter, null-token
//! and literal-formatting rules behind the [`Representation`] trait.
//! Rendering the same inputs twice yields byte-identical output, which
//! keeps retries idempotent and dumps diffable.

mod delimited;
mod sql;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::{ConfigError, RenderError};
use crate::schema::TableDefinition;
use crate::source::Batch;

pub use delimited::DelimitedRepresentation;
pub use sql::{MySqlRepresentation, PostgresRepresentation};

/// Tunables shared by every renderer. Each field has a documented
/// default and is overridable per run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderOptions {
    /// Rows per rendered batch (one statement or line group).
    pub batch_rows: usize,
    /// Destination text encoding; `None` uses the dialect default
    /// (`utf8mb4` for MySQL, `UTF8` for PostgreSQL).
    pub encoding: Option<String>,
    /// Emit primary/secondary keys in DDL.
    pub include_keys: bool,
    /// Emit a destructive `DROP TABLE IF EXISTS` before each `CREATE`.
    pub pre_drop: bool,
    /// Storage-engine hint, honored by MySQL DDL only.
    pub engine: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            batch_rows: 500,
            encoding: None,
            include_keys: true,
            pre_drop: false,
            engine: "MyISAM".to_string(),
        }
    }
}

/// A named capability bundle for one target key.
pub trait Representation: Send + Sync {
    /// Registry key (`mysql`, `psql`, `csv`, `tsv`).
    fn key(&self) -> &'static str;

    /// File extension for rendered artifacts.
    fn extension(&self) -> &'static str;

    /// Whether destinations carry framing markers. Delimited targets
    /// have no comment syntax to hide them in.
    fn includes_meta(&self) -> bool {
        true
    }

    /// Whether a destination may hold only a single table.
    fn single_table_only(&self) -> bool {
        false
    }

    /// Render the DDL (or header) for one table. Pure; emits columns,
    /// nullability and keys in catalog-declared order. Text columns
    /// are always rendered nullable regardless of the declared
    /// required flag - registry exports violate their own constraints,
    /// and the override is target-wide.
    fn render_schema(&self, def: &TableDefinition, opts: &RenderOptions) -> String;

    /// Render one batch of records. Pure; exactly one statement or
    /// one group of delimited lines per batch.
    fn render_batch(
        &self,
        def: &TableDefinition,
        batch: &Batch,
        opts: &RenderOptions,
    ) -> Result<Vec<u8>, RenderError>;
}

pub type RepresentationRef = Arc<dyn Representation>;

/// Strategy map from target key to representation.
pub struct Registry {
    entries: BTreeMap<&'static str, RepresentationRef>,
}

impl Registry {
    /// Empty registry; used by tests and embedders with custom targets.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Registry with the built-in targets registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        // Built-in keys are distinct; registration cannot fail here.
        let builtins: [RepresentationRef; 4] = [
            Arc::new(MySqlRepresentation),
            Arc::new(PostgresRepresentation),
            Arc::new(DelimitedRepresentation::csv()),
            Arc::new(DelimitedRepresentation::tsv()),
        ];
        for rep in builtins {
            let key = rep.key();
            registry.entries.insert(key, rep);
        }
        registry
    }

    /// Register a representation under its key. A duplicate key is a
    /// configuration error at startup, never silently ignored.
    pub fn register(&mut self, rep: RepresentationRef) -> Result<(), ConfigError> {
        let key = rep.key();
        if self.entries.contains_key(key) {
            return Err(ConfigError::DuplicateTarget {
                target: key.to_string(),
            });
        }
        self.entries.insert(key, rep);
        Ok(())
    }

    /// Look up a target key, listing valid keys on failure.
    pub fn get(&self, target: &str) -> Result<RepresentationRef, ConfigError> {
        self.entries
            .get(target)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownTarget {
                target: target.to_string(),
                available: self.available(),
            })
    }

    /// Registered target keys, sorted.
    pub fn available(&self) -> Vec<String> {
        self.entries.keys().map(|k| (*k).to_string()).collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_targets_are_registered() {
        let registry = Registry::with_builtins();
        assert_eq!(registry.available(), vec!["csv", "mysql", "psql", "tsv"]);
        assert!(registry.get("mysql").is_ok());
    }

    #[test]
    fn unknown_target_lists_valid_keys() {
        let registry = Registry::with_builtins();
        let err = registry.get("oracle").err().unwrap();
        match err {
            ConfigError::UnknownTarget { target, available } => {
                assert_eq!(target, "oracle");
                assert_eq!(available, vec!["csv", "mysql", "psql", "tsv"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = Registry::with_builtins();
        let err = registry.register(Arc::new(MySqlRepresentation)).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateTarget { .. }));
    }
}
