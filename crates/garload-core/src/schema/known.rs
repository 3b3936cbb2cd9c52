//! Built-in registry of known GAR entities.
//!
//! The XSD declarations only describe columns; classification and key
//! relationships are not part of the upstream schema export. They are
//! fixed properties of the registry layout, so they live here as
//! immutable configuration owned by the catalog at construction time.

/// Whether a table is loaded once per job or repeated per region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Reference/lookup data, present once at the archive root.
    Common,
    /// Data partitioned under region-code directories.
    Region,
}

/// Static key metadata merged into a [`TableDefinition`] at load time.
///
/// [`TableDefinition`]: super::TableDefinition
#[derive(Debug)]
pub struct KnownTable {
    /// Entity name as it appears in the schema export (`AS_<entity>`).
    pub entity: &'static str,
    pub scope: Scope,
    /// Primary key column (attribute name as declared).
    pub primary_key: &'static str,
    /// (column, target entity, target column) triples.
    pub foreign_keys: &'static [(&'static str, &'static str, &'static str)],
    /// Secondary single-column indexes.
    pub indexes: &'static [&'static str],
}

/// Every entity the converter understands, in catalog-declared order.
///
/// Common tables come first so that dictionary data is always emitted
/// (and imported) before the region-scoped tables that reference it.
pub const KNOWN_TABLES: &[KnownTable] = &[
    KnownTable {
        entity: "ADDHOUSE_TYPES",
        scope: Scope::Common,
        primary_key: "ID",
        foreign_keys: &[],
        indexes: &[],
    },
    KnownTable {
        entity: "ADDR_OBJ_TYPES",
        scope: Scope::Common,
        primary_key: "ID",
        foreign_keys: &[],
        indexes: &[],
    },
    KnownTable {
        entity: "APARTMENT_TYPES",
        scope: Scope::Common,
        primary_key: "ID",
        foreign_keys: &[],
        indexes: &[],
    },
    KnownTable {
        entity: "HOUSE_TYPES",
        scope: Scope::Common,
        primary_key: "ID",
        foreign_keys: &[],
        indexes: &[],
    },
    KnownTable {
        entity: "NORMATIVE_DOCS_KINDS",
        scope: Scope::Common,
        primary_key: "ID",
        foreign_keys: &[],
        indexes: &[],
    },
    KnownTable {
        entity: "NORMATIVE_DOCS_TYPES",
        scope: Scope::Common,
        primary_key: "ID",
        foreign_keys: &[],
        indexes: &[],
    },
    KnownTable {
        entity: "OBJECT_LEVELS",
        scope: Scope::Common,
        primary_key: "LEVEL",
        foreign_keys: &[],
        indexes: &[],
    },
    KnownTable {
        entity: "OPERATION_TYPES",
        scope: Scope::Common,
        primary_key: "ID",
        foreign_keys: &[],
        indexes: &[],
    },
    KnownTable {
        entity: "PARAM_TYPES",
        scope: Scope::Common,
        primary_key: "ID",
        foreign_keys: &[],
        indexes: &[],
    },
    KnownTable {
        entity: "ROOM_TYPES",
        scope: Scope::Common,
        primary_key: "ID",
        foreign_keys: &[],
        indexes: &[],
    },
    KnownTable {
        entity: "REESTR_OBJECTS",
        scope: Scope::Region,
        primary_key: "OBJECTID",
        foreign_keys: &[("LEVELID", "OBJECT_LEVELS", "LEVEL")],
        indexes: &["OBJECTGUID"],
    },
    KnownTable {
        entity: "ADDR_OBJ",
        scope: Scope::Region,
        primary_key: "ID",
        foreign_keys: &[("LEVEL", "OBJECT_LEVELS", "LEVEL")],
        indexes: &["OBJECTID", "OBJECTGUID"],
    },
    KnownTable {
        entity: "ADDR_OBJ_DIVISION",
        scope: Scope::Region,
        primary_key: "ID",
        foreign_keys: &[],
        indexes: &["PARENTID", "CHILDID"],
    },
    KnownTable {
        entity: "ADDR_OBJ_PARAMS",
        scope: Scope::Region,
        primary_key: "ID",
        foreign_keys: &[("TYPEID", "PARAM_TYPES", "ID")],
        indexes: &["OBJECTID"],
    },
    KnownTable {
        entity: "ADM_HIERARCHY",
        scope: Scope::Region,
        primary_key: "ID",
        foreign_keys: &[],
        indexes: &["OBJECTID", "PARENTOBJID"],
    },
    KnownTable {
        entity: "APARTMENTS",
        scope: Scope::Region,
        primary_key: "ID",
        foreign_keys: &[("APARTTYPE", "APARTMENT_TYPES", "ID")],
        indexes: &["OBJECTID"],
    },
    KnownTable {
        entity: "APARTMENTS_PARAMS",
        scope: Scope::Region,
        primary_key: "ID",
        foreign_keys: &[("TYPEID", "PARAM_TYPES", "ID")],
        indexes: &["OBJECTID"],
    },
    KnownTable {
        entity: "CARPLACES",
        scope: Scope::Region,
        primary_key: "ID",
        foreign_keys: &[],
        indexes: &["OBJECTID"],
    },
    KnownTable {
        entity: "CARPLACES_PARAMS",
        scope: Scope::Region,
        primary_key: "ID",
        foreign_keys: &[("TYPEID", "PARAM_TYPES", "ID")],
        indexes: &["OBJECTID"],
    },
    KnownTable {
        entity: "CHANGE_HISTORY",
        scope: Scope::Region,
        primary_key: "CHANGEID",
        foreign_keys: &[("OPERTYPEID", "OPERATION_TYPES", "ID")],
        indexes: &["OBJECTID"],
    },
    KnownTable {
        entity: "HOUSES",
        scope: Scope::Region,
        primary_key: "ID",
        foreign_keys: &[("HOUSETYPE", "HOUSE_TYPES", "ID")],
        indexes: &["OBJECTID"],
    },
    KnownTable {
        entity: "HOUSES_PARAMS",
        scope: Scope::Region,
        primary_key: "ID",
        foreign_keys: &[("TYPEID", "PARAM_TYPES", "ID")],
        indexes: &["OBJECTID"],
    },
    KnownTable {
        entity: "MUN_HIERARCHY",
        scope: Scope::Region,
        primary_key: "ID",
        foreign_keys: &[],
        indexes: &["OBJECTID", "PARENTOBJID"],
    },
    KnownTable {
        entity: "NORMATIVE_DOCS",
        scope: Scope::Region,
        primary_key: "ID",
        foreign_keys: &[
            ("TYPE", "NORMATIVE_DOCS_TYPES", "ID"),
            ("KIND", "NORMATIVE_DOCS_KINDS", "ID"),
        ],
        indexes: &[],
    },
    KnownTable {
        entity: "ROOMS",
        scope: Scope::Region,
        primary_key: "ID",
        foreign_keys: &[("ROOMTYPE", "ROOM_TYPES", "ID")],
        indexes: &["OBJECTID"],
    },
    KnownTable {
        entity: "ROOMS_PARAMS",
        scope: Scope::Region,
        primary_key: "ID",
        foreign_keys: &[("TYPEID", "PARAM_TYPES", "ID")],
        indexes: &["OBJECTID"],
    },
    KnownTable {
        entity: "STEADS",
        scope: Scope::Region,
        primary_key: "ID",
        foreign_keys: &[],
        indexes: &["OBJECTID"],
    },
    KnownTable {
        entity: "STEADS_PARAMS",
        scope: Scope::Region,
        primary_key: "ID",
        foreign_keys: &[("TYPEID", "PARAM_TYPES", "ID")],
        indexes: &["OBJECTID"],
    },
];

/// Look up a known entity by name (case-insensitive).
pub fn find(entity: &str) -> Option<&'static KnownTable> {
    KNOWN_TABLES
        .iter()
        .find(|t| t.entity.eq_ignore_ascii_case(entity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entities_are_unique() {
        for (i, a) in KNOWN_TABLES.iter().enumerate() {
            for b in &KNOWN_TABLES[i + 1..] {
                assert_ne!(a.entity, b.entity);
            }
        }
    }

    #[test]
    fn foreign_keys_target_known_entities() {
        for table in KNOWN_TABLES {
            for (_, target, _) in table.foreign_keys {
                assert!(find(target).is_some(), "{target} is not a known entity");
            }
        }
    }

    #[test]
    fn common_tables_precede_region_tables() {
        let first_region = KNOWN_TABLES
            .iter()
            .position(|t| t.scope == Scope::Region)
            .unwrap();
        assert!(
            KNOWN_TABLES[first_region..]
                .iter()
                .all(|t| t.scope == Scope::Region)
        );
    }
}
