//! Extracted directory tree source.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use snafu::prelude::*;

use crate::error::{AmbiguousMemberSnafu, IoSnafu, MemberNotFoundSnafu, SourceError};

use super::{is_region_code, member_matches, scope_label};

pub struct DirectoryStorage {
    base: PathBuf,
}

impl DirectoryStorage {
    pub fn new(base: &Path) -> Self {
        Self {
            base: base.to_path_buf(),
        }
    }

    pub fn list_regions(&self) -> Result<Vec<String>, SourceError> {
        let mut regions = Vec::new();
        for entry in std::fs::read_dir(&self.base).context(IoSnafu)? {
            let entry = entry.context(IoSnafu)?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if is_region_code(name) && entry.path().is_dir() {
                regions.push(name.to_string());
            }
        }
        regions.sort();
        Ok(regions)
    }

    pub fn open(
        &self,
        table: &str,
        region: Option<&str>,
        ext: &str,
    ) -> Result<Box<dyn Read + '_>, SourceError> {
        let dir = match region {
            Some(code) => self.base.join(code),
            None => self.base.clone(),
        };

        let mut matches: Vec<PathBuf> = Vec::new();
        let entries = std::fs::read_dir(&dir).map_err(|_| SourceError::MemberNotFound {
            table: table.to_string(),
            scope: scope_label(region),
        })?;
        for entry in entries {
            let entry = entry.context(IoSnafu)?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if member_matches(name, table, ext) {
                matches.push(entry.path());
            }
        }
        matches.sort();

        match matches.len() {
            0 => MemberNotFoundSnafu {
                table,
                scope: scope_label(region),
            }
            .fail(),
            1 => {
                let file = File::open(&matches[0]).context(IoSnafu)?;
                Ok(Box::new(file))
            }
            _ => AmbiguousMemberSnafu {
                table,
                scope: scope_label(region),
            }
            .fail(),
        }
    }
}
