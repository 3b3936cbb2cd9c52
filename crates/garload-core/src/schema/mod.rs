//! Schema catalog: table definitions loaded from per-entity XSD
//! declarations, merged with built-in key and classification metadata.

mod xsd;

pub mod known;

use std::collections::HashMap;
use std::sync::Arc;

use snafu::prelude::*;
use tracing::debug;

use crate::error::{
    DuplicateTableSnafu, EmptyEntitySnafu, SchemaError, SchemaSourceSnafu, TableNotFoundSnafu,
    UnknownKeyColumnSnafu, UnresolvedForeignKeySnafu,
};
use crate::storage::Storage;

pub use known::Scope;

/// Semantic column type; target-specific literal rules are applied by
/// the representation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Decimal,
    Boolean,
    DateTime,
    Guid,
}

/// A single column of a table definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    /// Attribute name as declared in the entity schema (`OBJECTID`).
    pub attribute: String,
    /// Database column name (`objectid`).
    pub name: String,
    pub semantic: ColumnType,
    /// Declared `use="required"`. Text columns ignore this at render
    /// time; registry exports routinely violate their own constraints.
    pub required: bool,
    /// Declared maximum length for text columns.
    pub length: Option<u32>,
    /// Declared digit count for integer/decimal columns.
    pub precision: Option<u32>,
    /// Declared fraction digits for decimal columns.
    pub scale: Option<u32>,
}

/// A resolved foreign key reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub column: String,
    pub target_table: String,
    pub target_column: String,
}

/// One table of the catalog.
#[derive(Debug, Clone)]
pub struct TableDefinition {
    /// Upstream entity name (`ADDR_OBJ`).
    pub entity: String,
    /// Database table identifier (`addr_obj`).
    pub name: String,
    /// Document root element of the table's data file.
    pub root_tag: String,
    /// Repeated row element under the root.
    pub row_tag: String,
    pub columns: Vec<ColumnDefinition>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
    /// Secondary single-column indexes, in declared order.
    pub indexes: Vec<String>,
    pub scope: Scope,
}

impl TableDefinition {
    /// Index of a column by database name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// Shared, read-only catalog handle.
pub type CatalogRef = Arc<Catalog>;

/// Immutable mapping from table identifier to definition, built once
/// per job and shared by reference across all workers.
#[derive(Debug)]
pub struct Catalog {
    tables: Vec<TableDefinition>,
    by_name: HashMap<String, usize>,
}

impl Catalog {
    /// Load entity declarations from a schema source.
    ///
    /// `filter` restricts the load to the named entities; `None` loads
    /// every known entity. Loading is deterministic: identical inputs
    /// produce an identical in-memory catalog.
    pub fn load(storage: &mut Storage, filter: Option<&[String]>) -> Result<Self, SchemaError> {
        let mut definitions = Vec::new();

        for meta in known::KNOWN_TABLES {
            if let Some(wanted) = filter {
                if !wanted.iter().any(|t| meta.entity.eq_ignore_ascii_case(t)) {
                    continue;
                }
            }

            let mut reader = storage.open_schema(meta.entity).context(SchemaSourceSnafu {
                entity: meta.entity,
            })?;
            let parsed = xsd::parse_entity(meta.entity, &mut reader)?;
            debug!(
                entity = meta.entity,
                columns = parsed.columns.len(),
                "Loaded entity declaration"
            );

            definitions.push(TableDefinition {
                entity: meta.entity.to_string(),
                name: meta.entity.to_ascii_lowercase(),
                root_tag: parsed.root_tag,
                row_tag: parsed.row_tag,
                columns: parsed.columns,
                primary_key: vec![meta.primary_key.to_ascii_lowercase()],
                foreign_keys: meta
                    .foreign_keys
                    .iter()
                    .map(|(col, table, target)| ForeignKey {
                        column: col.to_ascii_lowercase(),
                        target_table: table.to_ascii_lowercase(),
                        target_column: target.to_ascii_lowercase(),
                    })
                    .collect(),
                indexes: meta.indexes.iter().map(|i| i.to_ascii_lowercase()).collect(),
                scope: meta.scope,
            });
        }

        Self::from_definitions(definitions)
    }

    /// Build a catalog from pre-parsed definitions, running the same
    /// validation as [`Catalog::load`].
    pub fn from_definitions(tables: Vec<TableDefinition>) -> Result<Self, SchemaError> {
        let mut by_name = HashMap::with_capacity(tables.len());
        for (idx, table) in tables.iter().enumerate() {
            ensure!(
                !table.columns.is_empty(),
                EmptyEntitySnafu {
                    entity: table.entity.clone()
                }
            );
            if by_name.insert(table.name.clone(), idx).is_some() {
                return DuplicateTableSnafu {
                    table: table.name.clone(),
                }
                .fail();
            }
        }

        let catalog = Self { tables, by_name };
        catalog.validate_keys()?;
        Ok(catalog)
    }

    /// Every key column must exist on its own table, and every foreign
    /// key must resolve to a known table and column. A foreign key
    /// whose target table was excluded by a load filter resolves
    /// against the built-in registry instead.
    fn validate_keys(&self) -> Result<(), SchemaError> {
        for table in &self.tables {
            for key in table.primary_key.iter().chain(table.indexes.iter()) {
                ensure!(
                    table.column_index(key).is_some(),
                    UnknownKeyColumnSnafu {
                        table: table.name.clone(),
                        column: key.clone(),
                    }
                );
            }

            for fk in &table.foreign_keys {
                let unresolved = || {
                    UnresolvedForeignKeySnafu {
                        table: table.name.clone(),
                        column: fk.column.clone(),
                        target_table: fk.target_table.clone(),
                        target_column: fk.target_column.clone(),
                    }
                    .build()
                };

                if table.column_index(&fk.column).is_none() {
                    return Err(unresolved());
                }
                match self.lookup(&fk.target_table) {
                    Ok(target) => {
                        if target.column_index(&fk.target_column).is_none() {
                            return Err(unresolved());
                        }
                    }
                    // Excluded by a load filter: accept if the target
                    // is at least a known entity.
                    Err(_) => {
                        if known::find(&fk.target_table).is_none() {
                            return Err(unresolved());
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Definitions in catalog-declared order.
    pub fn tables(&self) -> impl Iterator<Item = &TableDefinition> {
        self.tables.iter()
    }

    /// Look up a table by identifier or entity name.
    pub fn lookup(&self, table: &str) -> Result<&TableDefinition, SchemaError> {
        let key = table.to_ascii_lowercase();
        self.by_name
            .get(&key)
            .map(|&idx| &self.tables[idx])
            .ok_or_else(|| {
                TableNotFoundSnafu {
                    table: table.to_string(),
                }
                .build()
            })
    }

    /// Whether a table's rows are partitioned per region.
    pub fn is_region_scoped(&self, table: &str) -> Result<bool, SchemaError> {
        Ok(self.lookup(table)?.scope == Scope::Region)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
