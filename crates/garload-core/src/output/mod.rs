//! Output routing: maps (table, region) pairs onto destination files.
//!
//! Destinations are opened lazily on the first write and closed exactly
//! once through [`OutputRouter::finish`]. For targets with comment
//! syntax each destination carries deterministic opening and closing
//! markers plus a separator line per table section, so two runs over
//! the same input produce byte-identical files.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use tracing::debug;

use crate::error::{ConfigError, OutputError};
use crate::render::RepresentationRef;
use crate::schema::TableDefinition;

const OPEN_MARKER: &str = "-- garload dump begin\n";
const CLOSE_MARKER: &str = "-- garload dump end\n";

/// How rendered output maps onto files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Everything into one file.
    #[default]
    Direct,
    /// One file per region under the output directory.
    PerRegion,
    /// One file per table under the output directory.
    PerTable,
    /// `<region>/<table>.<ext>` tree under the output directory.
    RegionTree,
}

impl OutputMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::PerRegion => "per_region",
            Self::PerTable => "per_table",
            Self::RegionTree => "region_tree",
        }
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(Self::Direct),
            "per_region" => Ok(Self::PerRegion),
            "per_table" => Ok(Self::PerTable),
            "region_tree" => Ok(Self::RegionTree),
            other => Err(format!(
                "unknown output mode {other}; expected direct, per_region, per_table or region_tree"
            )),
        }
    }
}

struct Destination {
    writer: BufWriter<File>,
    /// Table whose section is currently open, for separator emission.
    current_table: Option<String>,
}

/// Routes rendered bytes to destination files according to the mode.
pub struct OutputRouter {
    base: PathBuf,
    mode: OutputMode,
    rep: RepresentationRef,
    open: BTreeMap<PathBuf, Destination>,
}

impl OutputRouter {
    /// Build a router over `base` (a file path under [`OutputMode::Direct`],
    /// a directory otherwise).
    ///
    /// Targets that cannot mix tables in one destination are rejected
    /// here for the modes that would mix them.
    pub fn new(
        base: impl Into<PathBuf>,
        mode: OutputMode,
        rep: RepresentationRef,
    ) -> Result<Self, ConfigError> {
        if rep.single_table_only()
            && matches!(mode, OutputMode::Direct | OutputMode::PerRegion)
        {
            return Err(ConfigError::MixedTables {
                target: rep.key().to_string(),
            });
        }
        Ok(Self {
            base: base.into(),
            mode,
            rep,
            open: BTreeMap::new(),
        })
    }

    /// The representation this router writes.
    pub fn representation(&self) -> &RepresentationRef {
        &self.rep
    }

    fn destination_path(&self, def: &TableDefinition, region: Option<&str>) -> PathBuf {
        let region = region.unwrap_or("common");
        let ext = self.rep.extension();
        match self.mode {
            OutputMode::Direct => self.base.clone(),
            OutputMode::PerRegion => self.base.join(format!("{region}.{ext}")),
            OutputMode::PerTable => self.base.join(format!("{}.{ext}", def.name)),
            OutputMode::RegionTree => self.base.join(region).join(format!("{}.{ext}", def.name)),
        }
    }

    fn open_destination(&mut self, path: &Path) -> Result<&mut Destination, OutputError> {
        match self.open.entry(path.to_path_buf()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        fs::create_dir_all(parent).map_err(|source| {
                            OutputError::CreateDestination {
                                path: parent.display().to_string(),
                                source,
                            }
                        })?;
                    }
                }
                let file = File::create(path).map_err(|source| OutputError::CreateDestination {
                    path: path.display().to_string(),
                    source,
                })?;
                let mut dest = Destination {
                    writer: BufWriter::new(file),
                    current_table: None,
                };
                if self.rep.includes_meta() {
                    dest.writer
                        .write_all(OPEN_MARKER.as_bytes())
                        .map_err(|source| OutputError::WriteDestination {
                            path: path.display().to_string(),
                            source,
                        })?;
                }
                debug!(path = %path.display(), "Opened destination");
                Ok(entry.insert(dest))
            }
        }
    }

    /// Write a destination's leading header. Only the call that opens
    /// the destination writes it; later passes routed to the same file
    /// are a no-op, so a per-table file fed by several regions carries
    /// the header exactly once.
    pub fn write_header(
        &mut self,
        def: &TableDefinition,
        region: Option<&str>,
        bytes: &[u8],
    ) -> Result<(), OutputError> {
        let path = self.destination_path(def, region);
        if self.open.contains_key(&path) {
            return Ok(());
        }
        let dest = self.open_destination(&path)?;
        dest.writer
            .write_all(bytes)
            .map_err(|source| OutputError::WriteDestination {
                path: path.display().to_string(),
                source,
            })
    }

    /// Append rendered bytes for one table to its destination, emitting
    /// the table separator when the section changes.
    pub fn write(
        &mut self,
        def: &TableDefinition,
        region: Option<&str>,
        bytes: &[u8],
    ) -> Result<(), OutputError> {
        let path = self.destination_path(def, region);
        let includes_meta = self.rep.includes_meta();
        let dest = self.open_destination(&path)?;

        let wrap = |source| OutputError::WriteDestination {
            path: path.display().to_string(),
            source,
        };

        if includes_meta && dest.current_table.as_deref() != Some(def.name.as_str()) {
            let separator = format!("\n-- {}\n", def.entity);
            dest.writer.write_all(separator.as_bytes()).map_err(wrap)?;
            dest.current_table = Some(def.name.clone());
        }
        dest.writer.write_all(bytes).map_err(wrap)
    }

    /// Close every destination, writing closing markers, and return the
    /// created paths in sorted order.
    pub fn finish(mut self) -> Result<Vec<PathBuf>, OutputError> {
        let includes_meta = self.rep.includes_meta();
        let mut paths = Vec::with_capacity(self.open.len());
        for (path, mut dest) in std::mem::take(&mut self.open) {
            let wrap = |source| OutputError::WriteDestination {
                path: path.display().to_string(),
                source,
            };
            if includes_meta {
                dest.writer
                    .write_all(CLOSE_MARKER.as_bytes())
                    .map_err(wrap)?;
            }
            dest.writer.flush().map_err(wrap)?;
            paths.push(path);
        }
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::render::{DelimitedRepresentation, MySqlRepresentation};
    use crate::schema::test_support::{column, table};
    use crate::schema::{ColumnType, Scope};

    fn addr_obj() -> TableDefinition {
        table(
            "ADDR_OBJ",
            Scope::Region,
            vec![column("ID", ColumnType::Integer, true)],
            "id",
        )
    }

    fn houses() -> TableDefinition {
        table(
            "HOUSES",
            Scope::Region,
            vec![column("ID", ColumnType::Integer, true)],
            "id",
        )
    }

    #[test]
    fn direct_mode_frames_sections_with_markers() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("dump.sql");
        let mut router =
            OutputRouter::new(&out, OutputMode::Direct, Arc::new(MySqlRepresentation)).unwrap();

        router.write(&addr_obj(), Some("01"), b"a1\n").unwrap();
        router.write(&addr_obj(), Some("02"), b"a2\n").unwrap();
        router.write(&houses(), Some("01"), b"h1\n").unwrap();
        let paths = router.finish().unwrap();

        assert_eq!(paths, vec![out.clone()]);
        let text = std::fs::read_to_string(&out).unwrap();
        assert_eq!(
            text,
            "-- garload dump begin\n\
             \n-- ADDR_OBJ\na1\na2\n\
             \n-- HOUSES\nh1\n\
             -- garload dump end\n"
        );
    }

    #[test]
    fn region_tree_splits_by_region_and_table() {
        let dir = tempfile::tempdir().unwrap();
        let mut router = OutputRouter::new(
            dir.path(),
            OutputMode::RegionTree,
            Arc::new(MySqlRepresentation),
        )
        .unwrap();

        router.write(&addr_obj(), Some("01"), b"a\n").unwrap();
        router.write(&houses(), Some("02"), b"h\n").unwrap();
        router.write(&addr_obj(), None, b"c\n").unwrap();
        let mut paths = router.finish().unwrap();
        paths.sort();

        assert_eq!(
            paths,
            vec![
                dir.path().join("01/addr_obj.sql"),
                dir.path().join("02/houses.sql"),
                dir.path().join("common/addr_obj.sql"),
            ]
        );
    }

    #[test]
    fn per_table_appends_regions_into_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut router = OutputRouter::new(
            dir.path(),
            OutputMode::PerTable,
            Arc::new(MySqlRepresentation),
        )
        .unwrap();

        router.write(&addr_obj(), Some("01"), b"r1\n").unwrap();
        router.write(&addr_obj(), Some("02"), b"r2\n").unwrap();
        let paths = router.finish().unwrap();

        assert_eq!(paths, vec![dir.path().join("addr_obj.sql")]);
        let text = std::fs::read_to_string(&paths[0]).unwrap();
        // One section: same table, no repeated separator.
        assert_eq!(text.matches("-- ADDR_OBJ").count(), 1);
        assert!(text.contains("r1\nr2\n"));
    }

    #[test]
    fn delimited_targets_reject_mixing_modes() {
        let dir = tempfile::tempdir().unwrap();
        let csv: RepresentationRef = Arc::new(DelimitedRepresentation::csv());

        for mode in [OutputMode::Direct, OutputMode::PerRegion] {
            let err = OutputRouter::new(dir.path(), mode, csv.clone()).err().unwrap();
            assert!(matches!(err, ConfigError::MixedTables { .. }));
        }
        assert!(OutputRouter::new(dir.path(), OutputMode::RegionTree, csv.clone()).is_ok());
        assert!(OutputRouter::new(dir.path(), OutputMode::PerTable, csv).is_ok());
    }

    #[test]
    fn delimited_destinations_carry_no_markers() {
        let dir = tempfile::tempdir().unwrap();
        let mut router = OutputRouter::new(
            dir.path(),
            OutputMode::PerTable,
            Arc::new(DelimitedRepresentation::csv()),
        )
        .unwrap();

        router.write(&addr_obj(), Some("01"), b"1\n").unwrap();
        let paths = router.finish().unwrap();
        let text = std::fs::read_to_string(&paths[0]).unwrap();
        assert_eq!(text, "1\n");
    }

    #[test]
    fn header_is_written_once_per_destination() {
        let dir = tempfile::tempdir().unwrap();
        let mut router = OutputRouter::new(
            dir.path(),
            OutputMode::PerTable,
            Arc::new(DelimitedRepresentation::csv()),
        )
        .unwrap();

        router.write_header(&addr_obj(), Some("01"), b"id\n").unwrap();
        router.write(&addr_obj(), Some("01"), b"1\n").unwrap();
        // Second region routes to the same file; its header is dropped.
        router.write_header(&addr_obj(), Some("02"), b"id\n").unwrap();
        router.write(&addr_obj(), Some("02"), b"2\n").unwrap();
        let paths = router.finish().unwrap();

        let text = std::fs::read_to_string(&paths[0]).unwrap();
        assert_eq!(text, "id\n1\n2\n");
    }

    #[test]
    fn destinations_open_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("dump.sql");
        let router =
            OutputRouter::new(&out, OutputMode::Direct, Arc::new(MySqlRepresentation)).unwrap();
        assert!(!out.exists());
        assert_eq!(router.finish().unwrap(), Vec::<PathBuf>::new());
        assert!(!out.exists());
    }

    #[test]
    fn output_mode_parses_from_str() {
        assert_eq!("per_region".parse::<OutputMode>(), Ok(OutputMode::PerRegion));
        assert_eq!(OutputMode::RegionTree.as_str(), "region_tree");
        assert!("flat".parse::<OutputMode>().is_err());
    }
}
