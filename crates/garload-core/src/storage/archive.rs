//! ZIP archive source, read in place without extraction.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use snafu::prelude::*;
use zip::ZipArchive;

use crate::error::{AmbiguousMemberSnafu, ArchiveSnafu, MemberNotFoundSnafu, SourceError};

use super::{is_region_code, member_matches, scope_label};

pub struct ArchiveStorage {
    archive: ZipArchive<File>,
    path: String,
}

impl ArchiveStorage {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let display = path.display().to_string();
        let file = std::fs::File::open(path).context(crate::error::IoSnafu)?;
        let archive = ZipArchive::new(file).context(ArchiveSnafu { path: &display })?;
        Ok(Self {
            archive,
            path: display,
        })
    }

    pub fn list_regions(&self) -> Vec<String> {
        let mut regions = BTreeSet::new();
        for name in self.archive.file_names() {
            let normalized = name.replace('\\', "/");
            let mut parts: Vec<&str> = normalized.split('/').collect();
            parts.pop(); // drop the file name
            for part in parts {
                if is_region_code(part) {
                    regions.insert(part.to_string());
                }
            }
        }
        regions.into_iter().collect()
    }

    /// Find the single archive member for a table within a scope.
    ///
    /// Schema members (no region) must not live under a region
    /// directory; data members must live under the requested one.
    fn find_member(
        &self,
        table: &str,
        region: Option<&str>,
        ext: &str,
    ) -> Result<String, SourceError> {
        let mut candidates: Vec<String> = Vec::new();
        for name in self.archive.file_names() {
            let normalized = name.replace('\\', "/");
            let (dirs, file_name) = match normalized.rsplit_once('/') {
                Some((dirs, file)) => (dirs, file),
                None => ("", normalized.as_str()),
            };
            if !member_matches(file_name, table, ext) {
                continue;
            }
            let in_scope = match region {
                Some(code) => dirs.split('/').any(|p| p == code),
                None => !dirs.split('/').any(is_region_code),
            };
            if in_scope {
                candidates.push(name.to_string());
            }
        }
        candidates.sort();

        match candidates.len() {
            0 => MemberNotFoundSnafu {
                table,
                scope: scope_label(region),
            }
            .fail(),
            1 => Ok(candidates.pop().unwrap_or_default()),
            _ => AmbiguousMemberSnafu {
                table,
                scope: scope_label(region),
            }
            .fail(),
        }
    }

    pub fn open_member(
        &mut self,
        table: &str,
        region: Option<&str>,
        ext: &str,
    ) -> Result<Box<dyn Read + '_>, SourceError> {
        let member = self.find_member(table, region, ext)?;
        let entry = self
            .archive
            .by_name(&member)
            .context(ArchiveSnafu { path: &self.path })?;
        Ok(Box::new(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_archive(entries: &[(&str, &str)]) -> tempfile::TempPath {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut writer = zip::ZipWriter::new(tmp.reopen().unwrap());
        for (name, content) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
        tmp.into_temp_path()
    }

    #[test]
    fn lists_regions_from_entry_paths() {
        let path = build_archive(&[
            ("AS_ADDR_OBJ.XSD", "<schema/>"),
            ("01/AS_ADDR_OBJ_20240101.XML", "<a/>"),
            ("02/AS_HOUSES_20240101.XML", "<b/>"),
            ("schema/readme.txt", "x"),
        ]);
        let storage = ArchiveStorage::open(&path).unwrap();
        assert_eq!(storage.list_regions(), vec!["01", "02"]);
    }

    #[test]
    fn schema_members_are_found_outside_region_dirs() {
        let path = build_archive(&[
            ("AS_ADDR_OBJ.XSD", "<schema/>"),
            ("77/AS_ADDR_OBJ_20240101.XML", "<data/>"),
        ]);
        let mut storage = ArchiveStorage::open(&path).unwrap();

        let mut schema = String::new();
        storage
            .open_member("ADDR_OBJ", None, "xsd")
            .unwrap()
            .read_to_string(&mut schema)
            .unwrap();
        assert_eq!(schema, "<schema/>");

        let mut data = String::new();
        storage
            .open_member("ADDR_OBJ", Some("77"), "xml")
            .unwrap()
            .read_to_string(&mut data)
            .unwrap();
        assert_eq!(data, "<data/>");
    }

    #[test]
    fn member_from_other_region_is_not_found() {
        let path = build_archive(&[("77/AS_ADDR_OBJ_20240101.XML", "<data/>")]);
        let mut storage = ArchiveStorage::open(&path).unwrap();
        let err = storage
            .open_member("ADDR_OBJ", Some("01"), "xml")
            .err()
            .unwrap();
        assert!(matches!(err, SourceError::MemberNotFound { .. }));
    }
}
