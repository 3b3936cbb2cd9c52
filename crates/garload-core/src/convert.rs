//! Conversion driver: streams table files through a representation
//! into routed destinations.
//!
//! One [`Converter`] is built per job and drives one table-and-scope
//! pass at a time. Batches are rendered and written as they are read,
//! so peak memory stays bounded by the configured batch size.

use std::ops::ControlFlow;
use std::time::Instant;

use snafu::prelude::*;
use tracing::info;

use crate::error::{
    CatalogSnafu, ConvertError, OutputSnafu, RenderSnafu, TableParseSnafu, TableSourceSnafu,
};
use crate::output::OutputRouter;
use crate::render::{RenderOptions, RepresentationRef};
use crate::schema::{Catalog, Scope, TableDefinition};
use crate::source::{ParsePolicy, TableReader};
use crate::storage::Storage;

/// Row totals for one converted table file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReport {
    pub table: String,
    pub region: Option<String>,
    pub rows: u64,
    pub skipped: u64,
}

/// Streams tables from a storage source into an output router.
pub struct Converter<'a> {
    catalog: &'a Catalog,
    rep: RepresentationRef,
    opts: RenderOptions,
    policy: ParsePolicy,
}

impl<'a> Converter<'a> {
    pub fn new(
        catalog: &'a Catalog,
        rep: RepresentationRef,
        opts: RenderOptions,
        policy: ParsePolicy,
    ) -> Self {
        Self {
            catalog,
            rep,
            opts,
            policy,
        }
    }

    /// Resolve a table filter against the catalog, in declared order.
    /// `None` selects every loaded table.
    pub fn select_tables(
        &self,
        filter: Option<&[String]>,
    ) -> Result<Vec<&'a TableDefinition>, ConvertError> {
        match filter {
            None => Ok(self.catalog.tables().collect()),
            Some(wanted) => {
                // Validate every requested name, then keep catalog order.
                for name in wanted {
                    self.catalog.lookup(name).context(CatalogSnafu)?;
                }
                Ok(self
                    .catalog
                    .tables()
                    .filter(|def| {
                        wanted
                            .iter()
                            .any(|name| def.name.eq_ignore_ascii_case(name))
                    })
                    .collect())
            }
        }
    }

    /// Render DDL (or the delimited header) for the selected tables.
    pub fn dump_schema(
        &self,
        router: &mut OutputRouter,
        filter: Option<&[String]>,
    ) -> Result<(), ConvertError> {
        for def in self.select_tables(filter)? {
            let ddl = self.rep.render_schema(def, &self.opts);
            router.write(def, None, ddl.as_bytes()).context(OutputSnafu)?;
        }
        Ok(())
    }

    /// Stream one table's data file into the router. `region` is `None`
    /// for common tables and the source root.
    pub fn dump_table(
        &self,
        storage: &mut Storage,
        router: &mut OutputRouter,
        def: &TableDefinition,
        region: Option<&str>,
    ) -> Result<TableReport, ConvertError> {
        let scope = region.unwrap_or("common").to_string();
        let started = Instant::now();

        // Delimited targets carry their column header once per
        // destination, regardless of how many regions feed the file.
        if self.rep.single_table_only() {
            let header = self.rep.render_schema(def, &self.opts);
            router
                .write_header(def, region, header.as_bytes())
                .context(OutputSnafu)?;
        }

        let input = storage
            .open_table(&def.entity, region)
            .context(TableSourceSnafu {
                table: def.name.clone(),
                scope: scope.clone(),
            })?;

        let reader = TableReader::new(def, self.opts.batch_rows, self.policy);
        let mut failure: Option<ConvertError> = None;
        let stats = reader
            .read_batches(input, &mut |batch| {
                let result = self
                    .rep
                    .render_batch(def, &batch, &self.opts)
                    .context(RenderSnafu)
                    .and_then(|bytes| router.write(def, region, &bytes).context(OutputSnafu));
                match result {
                    Ok(()) => ControlFlow::Continue(()),
                    Err(err) => {
                        failure = Some(err);
                        ControlFlow::Break(())
                    }
                }
            })
            .context(TableParseSnafu {
                table: def.name.clone(),
                scope: scope.clone(),
            })?;
        if let Some(err) = failure {
            return Err(err);
        }

        info!(
            table = %def.name,
            scope = %scope,
            rows = stats.rows,
            skipped = stats.skipped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Converted table"
        );

        Ok(TableReport {
            table: def.name.clone(),
            region: region.map(ToString::to_string),
            rows: stats.rows,
            skipped: stats.skipped,
        })
    }

    /// Stream the selected tables for every requested scope: common
    /// tables once, region tables once per region.
    pub fn dump_tables(
        &self,
        storage: &mut Storage,
        router: &mut OutputRouter,
        filter: Option<&[String]>,
        regions: &[String],
    ) -> Result<Vec<TableReport>, ConvertError> {
        let selected = self.select_tables(filter)?;
        let mut reports = Vec::new();

        for def in &selected {
            if def.scope == Scope::Common {
                reports.push(self.dump_table(storage, router, def, None)?);
            }
        }
        for region in regions {
            for def in &selected {
                if def.scope == Scope::Region {
                    reports.push(self.dump_table(storage, router, def, Some(region))?);
                }
            }
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use super::*;
    use crate::output::OutputMode;
    use crate::render::{DelimitedRepresentation, MySqlRepresentation};
    use crate::schema::test_support::{column, table};
    use crate::schema::ColumnType;

    fn catalog() -> Catalog {
        let mut levels = table(
            "OBJECT_LEVELS",
            Scope::Common,
            vec![
                column("LEVEL", ColumnType::Integer, true),
                column("NAME", ColumnType::Text, true),
            ],
            "level",
        );
        levels.root_tag = "OBJECTLEVELS".to_string();
        levels.row_tag = "OBJECTLEVEL".to_string();

        let mut houses = table(
            "HOUSES",
            Scope::Region,
            vec![
                column("ID", ColumnType::Integer, true),
                column("HOUSENUM", ColumnType::Text, false),
            ],
            "id",
        );
        houses.root_tag = "HOUSES".to_string();
        houses.row_tag = "HOUSE".to_string();

        Catalog::from_definitions(vec![levels, houses]).unwrap()
    }

    fn seed_source(root: &std::path::Path) {
        fs::write(
            root.join("AS_OBJECT_LEVELS_20240101.XML"),
            r#"<OBJECTLEVELS><OBJECTLEVEL LEVEL="1" NAME="Region" /></OBJECTLEVELS>"#,
        )
        .unwrap();
        for (region, ids) in [("01", ["1", "2"]), ("02", ["3", "4"])] {
            let dir = root.join(region);
            fs::create_dir(&dir).unwrap();
            let rows: String = ids
                .iter()
                .map(|id| format!(r#"<HOUSE ID="{id}" HOUSENUM="{id}a" />"#))
                .collect();
            fs::write(
                dir.join("AS_HOUSES_20240101.XML"),
                format!("<HOUSES>{rows}</HOUSES>"),
            )
            .unwrap();
        }
    }

    #[test]
    fn common_tables_dump_once_and_regions_fan_out() {
        let source = tempfile::tempdir().unwrap();
        seed_source(source.path());
        let out = tempfile::tempdir().unwrap();

        let catalog = catalog();
        let converter = Converter::new(
            &catalog,
            Arc::new(MySqlRepresentation),
            RenderOptions::default(),
            ParsePolicy::default(),
        );
        let mut storage = Storage::resolve(source.path()).unwrap();
        let mut router = OutputRouter::new(
            out.path(),
            OutputMode::RegionTree,
            Arc::new(MySqlRepresentation),
        )
        .unwrap();

        let reports = converter
            .dump_tables(
                &mut storage,
                &mut router,
                None,
                &["01".to_string(), "02".to_string()],
            )
            .unwrap();
        let paths = router.finish().unwrap();

        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].table, "object_levels");
        assert_eq!(reports[0].region, None);
        assert_eq!(reports[0].rows, 1);
        assert_eq!(reports[1].region.as_deref(), Some("01"));
        assert_eq!(reports[1].rows, 2);
        assert_eq!(paths.len(), 3);

        let dump = fs::read_to_string(out.path().join("01/houses.sql")).unwrap();
        assert!(dump.contains("INSERT INTO `houses`"));
        assert!(dump.contains("'1a'"));
    }

    #[test]
    fn per_table_csv_keeps_one_header_across_regions() {
        let source = tempfile::tempdir().unwrap();
        seed_source(source.path());
        let out = tempfile::tempdir().unwrap();

        let catalog = catalog();
        let converter = Converter::new(
            &catalog,
            Arc::new(DelimitedRepresentation::csv()),
            RenderOptions::default(),
            ParsePolicy::default(),
        );
        let mut storage = Storage::resolve(source.path()).unwrap();
        let mut router = OutputRouter::new(
            out.path(),
            OutputMode::PerTable,
            Arc::new(DelimitedRepresentation::csv()),
        )
        .unwrap();

        let filter = vec!["HOUSES".to_string()];
        converter
            .dump_tables(
                &mut storage,
                &mut router,
                Some(&filter),
                &["01".to_string(), "02".to_string()],
            )
            .unwrap();
        router.finish().unwrap();

        let text = fs::read_to_string(out.path().join("houses.csv")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "id,housenum");
        assert_eq!(lines.len(), 5);
        assert_eq!(text.matches("id,housenum").count(), 1);
    }

    #[test]
    fn table_filter_keeps_catalog_order_and_rejects_unknown() {
        let catalog = catalog();
        let converter = Converter::new(
            &catalog,
            Arc::new(MySqlRepresentation),
            RenderOptions::default(),
            ParsePolicy::default(),
        );

        let filter = vec!["HOUSES".to_string(), "object_levels".to_string()];
        let selected = converter.select_tables(Some(&filter)).unwrap();
        let names: Vec<&str> = selected.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["object_levels", "houses"]);

        let err = converter
            .select_tables(Some(&["rooms".to_string()]))
            .unwrap_err();
        assert!(matches!(err, ConvertError::Catalog { .. }));
    }

    #[test]
    fn missing_region_file_is_a_source_error() {
        let source = tempfile::tempdir().unwrap();
        seed_source(source.path());
        let out = tempfile::tempdir().unwrap();

        let catalog = catalog();
        let converter = Converter::new(
            &catalog,
            Arc::new(MySqlRepresentation),
            RenderOptions::default(),
            ParsePolicy::default(),
        );
        let mut storage = Storage::resolve(source.path()).unwrap();
        let mut router = OutputRouter::new(
            out.path(),
            OutputMode::RegionTree,
            Arc::new(MySqlRepresentation),
        )
        .unwrap();

        let err = converter
            .dump_tables(&mut storage, &mut router, None, &["99".to_string()])
            .unwrap_err();
        match err {
            ConvertError::TableSource { table, scope, .. } => {
                assert_eq!(table, "houses");
                assert_eq!(scope, "99");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
