//! Source archive acquisition.
//!
//! A source is either a local path, used in place, or an http(s) URL
//! downloaded into a job-scoped scratch directory that is removed when
//! the job ends. `--keep-archive` redirects the download into the
//! artifact directory instead.

use std::path::{Path, PathBuf};

use snafu::prelude::*;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::{
    DownloadSnafu, FetchError, MissingSourceSnafu, ScratchDirSnafu, StatusSnafu, WriteArchiveSnafu,
};

/// An archive ready to open. The scratch directory, when present, is
/// removed on drop.
#[derive(Debug)]
pub enum AcquiredSource {
    Local(PathBuf),
    Downloaded {
        path: PathBuf,
        _scratch: tempfile::TempDir,
    },
    /// Downloaded and kept past the end of the job.
    Kept(PathBuf),
}

impl AcquiredSource {
    pub fn path(&self) -> &Path {
        match self {
            Self::Local(path) | Self::Kept(path) => path,
            Self::Downloaded { path, .. } => path,
        }
    }
}

fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// File name for a downloaded archive, from the last URL path segment.
fn archive_name(url: &str) -> String {
    url.rsplit('/')
        .next()
        .filter(|name| !name.is_empty() && !name.contains('?'))
        .unwrap_or("gar.zip")
        .to_string()
}

/// Resolve a source argument into a local archive path, downloading
/// when it is a URL. `keep_dir` keeps the download in that directory.
pub async fn acquire(source: &str, keep_dir: Option<&Path>) -> Result<AcquiredSource, FetchError> {
    if !is_url(source) {
        let path = PathBuf::from(source);
        ensure!(path.exists(), MissingSourceSnafu { path: source });
        return Ok(AcquiredSource::Local(path));
    }

    match keep_dir {
        Some(dir) => {
            let target = dir.join(archive_name(source));
            download(source, &target).await?;
            Ok(AcquiredSource::Kept(target))
        }
        None => {
            let scratch = tempfile::tempdir().context(ScratchDirSnafu)?;
            let target = scratch.path().join(archive_name(source));
            download(source, &target).await?;
            Ok(AcquiredSource::Downloaded {
                path: target,
                _scratch: scratch,
            })
        }
    }
}

async fn download(url: &str, target: &Path) -> Result<(), FetchError> {
    info!(url, target = %target.display(), "Downloading archive");

    let mut response = reqwest::get(url).await.context(DownloadSnafu { url })?;
    ensure!(
        response.status().is_success(),
        StatusSnafu {
            url,
            status: response.status().as_u16(),
        }
    );

    let mut file = tokio::fs::File::create(target)
        .await
        .context(WriteArchiveSnafu { path: target })?;
    let mut bytes: u64 = 0;
    while let Some(chunk) = response.chunk().await.context(DownloadSnafu { url })? {
        bytes += chunk.len() as u64;
        file.write_all(&chunk)
            .await
            .context(WriteArchiveSnafu { path: target })?;
    }
    file.flush().await.context(WriteArchiveSnafu { path: target })?;

    info!(url, bytes, "Download complete");
    Ok(())
}
