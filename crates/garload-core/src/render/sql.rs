//! SQL dialect representations (MySQL and PostgreSQL).

use std::fmt::Write as _;

use crate::error::RenderError;
use crate::schema::{ColumnDefinition, ColumnType, TableDefinition};
use crate::source::Batch;

use super::{Representation, RenderOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    MySql,
    Postgres,
}

impl Dialect {
    fn quote_identifier(self, name: &str, out: &mut String) {
        match self {
            // PostgreSQL identifiers are already lower-case, unquoted.
            Dialect::MySql => {
                out.push('`');
                out.push_str(name);
                out.push('`');
            }
            Dialect::Postgres => out.push_str(name),
        }
    }

    fn identifier(self, name: &str) -> String {
        let mut s = String::with_capacity(name.len() + 2);
        self.quote_identifier(name, &mut s);
        s
    }

    fn column_type(self, col: &ColumnDefinition) -> String {
        match (col.semantic, self) {
            (ColumnType::Text, _) => match col.length {
                Some(len) if len <= 1024 => format!("VARCHAR({len})"),
                _ => "TEXT".to_string(),
            },
            // Columns above 9 digits need 64 bits; undeclared precision
            // stays at the 32-bit width.
            (ColumnType::Integer, Dialect::MySql) => {
                if col.precision.unwrap_or(9) > 9 {
                    "BIGINT".to_string()
                } else {
                    "INT".to_string()
                }
            }
            (ColumnType::Integer, Dialect::Postgres) => {
                if col.precision.unwrap_or(9) > 9 {
                    "BIGINT".to_string()
                } else {
                    "INTEGER".to_string()
                }
            }
            (ColumnType::Decimal, Dialect::MySql) => format!(
                "DECIMAL({},{})",
                col.precision.unwrap_or(10),
                col.scale.unwrap_or(0)
            ),
            (ColumnType::Decimal, Dialect::Postgres) => format!(
                "NUMERIC({},{})",
                col.precision.unwrap_or(10),
                col.scale.unwrap_or(0)
            ),
            (ColumnType::Boolean, Dialect::MySql) => "TINYINT(1)".to_string(),
            (ColumnType::Boolean, Dialect::Postgres) => "BOOLEAN".to_string(),
            (ColumnType::DateTime, Dialect::MySql) => "DATETIME".to_string(),
            (ColumnType::DateTime, Dialect::Postgres) => "TIMESTAMP".to_string(),
            (ColumnType::Guid, Dialect::MySql) => "CHAR(36)".to_string(),
            (ColumnType::Guid, Dialect::Postgres) => "UUID".to_string(),
        }
    }

    /// Quote and escape a string literal.
    fn string_literal(self, value: &str, out: &mut String) {
        out.push('\'');
        match self {
            Dialect::MySql => {
                for c in value.chars() {
                    match c {
                        '\'' => out.push_str("\\'"),
                        '"' => out.push_str("\\\""),
                        '\\' => out.push_str("\\\\"),
                        '\n' => out.push_str("\\n"),
                        '\r' => out.push_str("\\r"),
                        '\0' => out.push_str("\\0"),
                        c => out.push(c),
                    }
                }
            }
            // standard_conforming_strings: only the quote doubles.
            Dialect::Postgres => {
                for c in value.chars() {
                    if c == '\'' {
                        out.push_str("''");
                    } else {
                        out.push(c);
                    }
                }
            }
        }
        out.push('\'');
    }

    fn boolean_literal(self, truthy: bool) -> &'static str {
        match (self, truthy) {
            (Dialect::MySql, true) => "1",
            (Dialect::MySql, false) => "0",
            (Dialect::Postgres, true) => "TRUE",
            (Dialect::Postgres, false) => "FALSE",
        }
    }

    fn default_encoding(self) -> &'static str {
        match self {
            Dialect::MySql => "utf8mb4",
            Dialect::Postgres => "UTF8",
        }
    }
}

/// Render one raw value as a SQL literal for its column.
fn literal(
    dialect: Dialect,
    def: &TableDefinition,
    col: &ColumnDefinition,
    value: Option<&str>,
    out: &mut String,
) -> Result<(), RenderError> {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        // Absent and empty values render as the null token for every
        // semantic type; the nullable-text override guarantees this
        // never fails for text columns.
        out.push_str("NULL");
        return Ok(());
    };

    match col.semantic {
        ColumnType::Text | ColumnType::Guid | ColumnType::DateTime => {
            dialect.string_literal(value, out);
        }
        ColumnType::Integer => {
            let digits = value.strip_prefix('-').unwrap_or(value);
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(RenderError::InvalidInteger {
                    table: def.name.clone(),
                    column: col.name.clone(),
                    value: value.to_string(),
                });
            }
            out.push_str(value);
        }
        ColumnType::Decimal => {
            let digits = value.strip_prefix('-').unwrap_or(value);
            let mut dots = 0;
            let valid = !digits.is_empty()
                && digits.bytes().all(|b| {
                    if b == b'.' {
                        dots += 1;
                        true
                    } else {
                        b.is_ascii_digit()
                    }
                })
                && dots <= 1;
            if !valid {
                return Err(RenderError::InvalidDecimal {
                    table: def.name.clone(),
                    column: col.name.clone(),
                    value: value.to_string(),
                });
            }
            out.push_str(value);
        }
        ColumnType::Boolean => {
            let truthy = match value {
                "true" | "1" => true,
                "false" | "0" => false,
                other => {
                    return Err(RenderError::InvalidBoolean {
                        table: def.name.clone(),
                        column: col.name.clone(),
                        value: other.to_string(),
                    });
                }
            };
            out.push_str(dialect.boolean_literal(truthy));
        }
    }
    Ok(())
}

fn render_schema(dialect: Dialect, def: &TableDefinition, opts: &RenderOptions) -> String {
    let table = dialect.identifier(&def.name);
    let mut ddl = String::new();

    if opts.pre_drop {
        let _ = writeln!(ddl, "DROP TABLE IF EXISTS {table};");
    }

    let _ = writeln!(ddl, "CREATE TABLE {table} (");

    let mut clauses: Vec<String> = Vec::with_capacity(def.columns.len() + 2);
    for col in &def.columns {
        let mut clause = format!(
            "  {} {}",
            dialect.identifier(&col.name),
            dialect.column_type(col)
        );
        // Text columns are always nullable: real exports hold empty
        // values in columns their schema declares required.
        let nullable = !col.required || col.semantic == ColumnType::Text;
        if nullable {
            clause.push_str(" DEFAULT NULL");
        } else {
            clause.push_str(" NOT NULL");
        }
        clauses.push(clause);
    }

    let mut trailing_indexes = String::new();
    if opts.include_keys {
        let pk = def
            .primary_key
            .iter()
            .map(|c| dialect.identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        clauses.push(format!("  PRIMARY KEY ({pk})"));

        // Foreign key columns get plain lookup indexes, not
        // constraints; columns already keyed are not indexed twice.
        let mut secondary: Vec<&str> = def.indexes.iter().map(String::as_str).collect();
        for fk in &def.foreign_keys {
            let col = fk.column.as_str();
            if !secondary.contains(&col) && !def.primary_key.iter().any(|k| k == col) {
                secondary.push(col);
            }
        }

        match dialect {
            Dialect::MySql => {
                for index in &secondary {
                    clauses.push(format!(
                        "  KEY `idx_{}_{}` (`{}`)",
                        def.name, index, index
                    ));
                }
            }
            Dialect::Postgres => {
                for index in &secondary {
                    let _ = writeln!(
                        trailing_indexes,
                        "CREATE INDEX idx_{}_{} ON {} ({});",
                        def.name, index, def.name, index
                    );
                }
            }
        }
    }

    ddl.push_str(&clauses.join(",\n"));
    ddl.push('\n');

    match dialect {
        Dialect::MySql => {
            let charset = opts
                .encoding
                .as_deref()
                .unwrap_or_else(|| dialect.default_encoding());
            let _ = writeln!(ddl, ") ENGINE={} DEFAULT CHARSET={};", opts.engine, charset);
        }
        Dialect::Postgres => {
            ddl.push_str(");\n");
            ddl.push_str(&trailing_indexes);
        }
    }

    ddl
}

fn render_batch(
    dialect: Dialect,
    def: &TableDefinition,
    batch: &Batch,
    _opts: &RenderOptions,
) -> Result<Vec<u8>, RenderError> {
    if batch.is_empty() {
        return Ok(Vec::new());
    }

    let columns = def
        .columns
        .iter()
        .map(|c| dialect.identifier(&c.name))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES\n",
        dialect.identifier(&def.name),
        columns
    );

    for (row_idx, record) in batch.rows.iter().enumerate() {
        if row_idx > 0 {
            sql.push_str(",\n");
        }
        sql.push('(');
        for (col_idx, col) in def.columns.iter().enumerate() {
            if col_idx > 0 {
                sql.push_str(", ");
            }
            let value = record.values.get(col_idx).and_then(Option::as_deref);
            literal(dialect, def, col, value, &mut sql)?;
        }
        sql.push(')');
    }
    sql.push_str(";\n");

    Ok(sql.into_bytes())
}

/// MySQL schema and dump representation.
pub struct MySqlRepresentation;

impl Representation for MySqlRepresentation {
    fn key(&self) -> &'static str {
        "mysql"
    }

    fn extension(&self) -> &'static str {
        "sql"
    }

    fn render_schema(&self, def: &TableDefinition, opts: &RenderOptions) -> String {
        render_schema(Dialect::MySql, def, opts)
    }

    fn render_batch(
        &self,
        def: &TableDefinition,
        batch: &Batch,
        opts: &RenderOptions,
    ) -> Result<Vec<u8>, RenderError> {
        render_batch(Dialect::MySql, def, batch, opts)
    }
}

/// PostgreSQL schema and dump representation.
pub struct PostgresRepresentation;

impl Representation for PostgresRepresentation {
    fn key(&self) -> &'static str {
        "psql"
    }

    fn extension(&self) -> &'static str {
        "sql"
    }

    fn render_schema(&self, def: &TableDefinition, opts: &RenderOptions) -> String {
        render_schema(Dialect::Postgres, def, opts)
    }

    fn render_batch(
        &self,
        def: &TableDefinition,
        batch: &Batch,
        opts: &RenderOptions,
    ) -> Result<Vec<u8>, RenderError> {
        render_batch(Dialect::Postgres, def, batch, opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::test_support::{column, table};
    use crate::schema::{ForeignKey, Scope};
    use crate::source::Record;

    fn houses() -> TableDefinition {
        let mut def = table(
            "HOUSES",
            Scope::Region,
            vec![
                column("ID", ColumnType::Integer, true),
                column("OBJECTGUID", ColumnType::Guid, true),
                column("HOUSENUM", ColumnType::Text, true),
                column("ISACTIVE", ColumnType::Boolean, false),
                column("UPDATEDATE", ColumnType::DateTime, true),
            ],
            "id",
        );
        def.indexes.push("objectguid".to_string());
        def.foreign_keys.push(ForeignKey {
            column: "id".to_string(),
            target_table: "house_types".to_string(),
            target_column: "id".to_string(),
        });
        def
    }

    fn record(values: &[Option<&str>]) -> Record {
        Record {
            values: values.iter().map(|v| v.map(ToString::to_string)).collect(),
        }
    }

    #[test]
    fn mysql_ddl_shape() {
        let opts = RenderOptions {
            pre_drop: true,
            ..RenderOptions::default()
        };
        let ddl = MySqlRepresentation.render_schema(&houses(), &opts);

        assert!(ddl.starts_with("DROP TABLE IF EXISTS `houses`;\n"));
        assert!(ddl.contains("CREATE TABLE `houses` (\n"));
        assert!(ddl.contains("`id` INT NOT NULL"));
        assert!(ddl.contains("`objectguid` CHAR(36) NOT NULL"));
        assert!(ddl.contains("`isactive` TINYINT(1) DEFAULT NULL"));
        assert!(ddl.contains("PRIMARY KEY (`id`)"));
        assert!(ddl.contains("KEY `idx_houses_objectguid` (`objectguid`)"));
        // The foreign key on `id` is covered by the primary key.
        assert!(!ddl.contains("KEY `idx_houses_id`"));
        assert!(ddl.ends_with("ENGINE=MyISAM DEFAULT CHARSET=utf8mb4;\n"));
    }

    #[test]
    fn foreign_key_columns_render_as_secondary_indexes() {
        let mut def = table(
            "HOUSES",
            Scope::Region,
            vec![
                column("ID", ColumnType::Integer, true),
                column("HOUSETYPE", ColumnType::Integer, false),
            ],
            "id",
        );
        def.foreign_keys.push(ForeignKey {
            column: "housetype".to_string(),
            target_table: "house_types".to_string(),
            target_column: "id".to_string(),
        });

        let ddl = MySqlRepresentation.render_schema(&def, &RenderOptions::default());
        assert!(ddl.contains("KEY `idx_houses_housetype` (`housetype`)"));
        assert!(!ddl.contains("FOREIGN KEY"));

        let ddl = PostgresRepresentation.render_schema(&def, &RenderOptions::default());
        assert!(ddl.contains("CREATE INDEX idx_houses_housetype ON houses (housetype);"));
        assert!(!ddl.contains("FOREIGN KEY"));
    }

    #[test]
    fn psql_ddl_uses_out_of_line_indexes() {
        let ddl = PostgresRepresentation.render_schema(&houses(), &RenderOptions::default());
        assert!(!ddl.contains("DROP TABLE"));
        assert!(ddl.contains("id INTEGER NOT NULL"));
        assert!(ddl.contains("objectguid UUID NOT NULL"));
        assert!(ddl.contains("isactive BOOLEAN DEFAULT NULL"));
        assert!(ddl.contains("CREATE INDEX idx_houses_objectguid ON houses (objectguid);"));
    }

    #[test]
    fn integer_width_follows_declared_precision() {
        // Undeclared precision renders 32-bit; above 9 digits, 64-bit.
        let mut def = houses();
        assert!(MySqlRepresentation
            .render_schema(&def, &RenderOptions::default())
            .contains("`id` INT NOT NULL"));

        def.columns[0].precision = Some(19);
        assert!(MySqlRepresentation
            .render_schema(&def, &RenderOptions::default())
            .contains("`id` BIGINT NOT NULL"));
        assert!(PostgresRepresentation
            .render_schema(&def, &RenderOptions::default())
            .contains("id BIGINT NOT NULL"));
    }

    #[test]
    fn text_columns_render_nullable_despite_required_flag() {
        // HOUSENUM is declared required but is text-typed.
        let ddl = MySqlRepresentation.render_schema(&houses(), &RenderOptions::default());
        assert!(ddl.contains("`housenum` VARCHAR(100) DEFAULT NULL"));
    }

    #[test]
    fn ddl_rendering_is_deterministic() {
        let def = houses();
        let opts = RenderOptions::default();
        assert_eq!(
            MySqlRepresentation.render_schema(&def, &opts),
            MySqlRepresentation.render_schema(&def, &opts)
        );
        assert_eq!(
            PostgresRepresentation.render_schema(&def, &opts),
            PostgresRepresentation.render_schema(&def, &opts)
        );
    }

    #[test]
    fn no_keys_option_drops_all_keys() {
        let opts = RenderOptions {
            include_keys: false,
            ..RenderOptions::default()
        };
        let ddl = MySqlRepresentation.render_schema(&houses(), &opts);
        assert!(!ddl.contains("PRIMARY KEY"));
        assert!(!ddl.contains("KEY `idx_"));
    }

    #[test]
    fn batch_renders_one_statement() {
        let def = houses();
        let batch = Batch {
            rows: vec![
                record(&[
                    Some("1"),
                    Some("9120d4e4-094a-4a5e-b84a-6c1a78f110f6"),
                    Some("12а"),
                    Some("true"),
                    Some("2024-01-01"),
                ]),
                record(&[Some("2"), None, Some(""), Some("false"), None]),
            ],
        };

        let sql = String::from_utf8(
            MySqlRepresentation
                .render_batch(&def, &batch, &RenderOptions::default())
                .unwrap(),
        )
        .unwrap();

        assert!(sql.starts_with(
            "INSERT INTO `houses` (`id`, `objectguid`, `housenum`, `isactive`, `updatedate`) VALUES\n"
        ));
        assert!(sql.contains("(1, '9120d4e4-094a-4a5e-b84a-6c1a78f110f6', '12а', 1, '2024-01-01')"));
        // Empty text renders as the null token, never an error.
        assert!(sql.contains("(2, NULL, NULL, 0, NULL);"));
        assert_eq!(sql.matches("INSERT INTO").count(), 1);
    }

    #[test]
    fn mysql_escapes_quotes_and_control_characters() {
        let def = table(
            "T",
            Scope::Common,
            vec![
                column("ID", ColumnType::Integer, true),
                column("NAME", ColumnType::Text, false),
            ],
            "id",
        );
        let batch = Batch {
            rows: vec![record(&[Some("1"), Some("O'Neil \"x\"\\\nend")])],
        };
        let sql = String::from_utf8(
            MySqlRepresentation
                .render_batch(&def, &batch, &RenderOptions::default())
                .unwrap(),
        )
        .unwrap();
        assert!(sql.contains(r#"'O\'Neil \"x\"\\\nend'"#));
    }

    #[test]
    fn psql_doubles_single_quotes_only() {
        let def = table(
            "T",
            Scope::Common,
            vec![
                column("ID", ColumnType::Integer, true),
                column("NAME", ColumnType::Text, false),
            ],
            "id",
        );
        let batch = Batch {
            rows: vec![record(&[Some("1"), Some(r"O'Neil \ slash")])],
        };
        let sql = String::from_utf8(
            PostgresRepresentation
                .render_batch(&def, &batch, &RenderOptions::default())
                .unwrap(),
        )
        .unwrap();
        assert!(sql.contains(r"'O''Neil \ slash'"));
    }

    #[test]
    fn invalid_literals_are_render_errors() {
        let def = houses();
        let bad_int = Batch {
            rows: vec![record(&[Some("x1"), None, None, None, None])],
        };
        assert!(matches!(
            MySqlRepresentation.render_batch(&def, &bad_int, &RenderOptions::default()),
            Err(RenderError::InvalidInteger { .. })
        ));

        let bad_bool = Batch {
            rows: vec![record(&[Some("1"), None, None, Some("yes"), None])],
        };
        assert!(matches!(
            MySqlRepresentation.render_batch(&def, &bad_bool, &RenderOptions::default()),
            Err(RenderError::InvalidBoolean { .. })
        ));
    }

    #[test]
    fn empty_batch_renders_nothing() {
        let def = houses();
        let out = PostgresRepresentation
            .render_batch(&def, &Batch::default(), &RenderOptions::default())
            .unwrap();
        assert!(out.is_empty());
    }
}
