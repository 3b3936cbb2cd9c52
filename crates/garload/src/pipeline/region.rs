//! Per-region conversion and import job.
//!
//! A job renders one region's tables into a scratch dump, imports it,
//! and removes the dump. Failures never propagate past the job: the
//! dump is preserved as `<region>_failed.sql` in the artifact directory
//! and the failure is folded into the job's outcome.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use garload_core::{
    Catalog, CatalogRef, Converter, OutputMode, OutputRouter, ParsePolicy, RenderOptions,
    RepresentationRef, Scope, Storage,
};

use crate::error::PipelineError;
use crate::import::ImportClient;

/// Terminal state of a region job.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Imported,
    Failed {
        error: String,
        artifact: Option<PathBuf>,
    },
    Cancelled,
}

/// One region's result in the job summary.
#[derive(Debug, Clone, Serialize)]
pub struct RegionOutcome {
    pub region: String,
    pub rows: u64,
    pub elapsed_ms: u64,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl RegionOutcome {
    pub fn is_imported(&self) -> bool {
        matches!(self.outcome, Outcome::Imported)
    }
}

/// Everything a region job needs, cloneable across the worker pool.
#[derive(Clone)]
pub struct RegionContext {
    pub source: PathBuf,
    pub catalog: CatalogRef,
    pub rep: RepresentationRef,
    pub render: RenderOptions,
    pub policy: ParsePolicy,
    pub tables: Option<Arc<Vec<String>>>,
    pub workdir: PathBuf,
    pub artifact_dir: PathBuf,
    pub client: Arc<dyn ImportClient>,
    pub limiter: Arc<Semaphore>,
    pub shutdown: CancellationToken,
}

/// Run one region to completion. Never returns an error; failures are
/// encoded in the outcome.
pub async fn run_region(ctx: RegionContext, region: String) -> RegionOutcome {
    let cancelled = |rows| RegionOutcome {
        region: region.clone(),
        rows,
        elapsed_ms: 0,
        outcome: Outcome::Cancelled,
    };

    // Wait for a worker slot, bailing out on shutdown.
    let _permit = tokio::select! {
        biased;

        _ = ctx.shutdown.cancelled() => {
            info!(region = %region, "Skipping region: shutdown requested");
            return cancelled(0);
        }

        permit = ctx.limiter.clone().acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => return cancelled(0),
        },
    };

    let started = Instant::now();
    let dump = ctx.workdir.join(format!("{region}.sql"));

    // CPU-bound render runs off the async workers.
    let render = {
        let ctx = ctx.clone();
        let region = region.clone();
        let dump = dump.clone();
        tokio::task::spawn_blocking(move || {
            render_scope(
                &ctx.source,
                &ctx.catalog,
                ctx.rep.clone(),
                &ctx.render,
                ctx.policy,
                ctx.tables.as_deref().map(Vec::as_slice),
                Some(&region),
                &dump,
            )
        })
        .await
    };

    let rows = match render {
        Ok(Ok(rows)) => rows,
        Ok(Err(err)) => {
            return failed(&region, &dump, &ctx.artifact_dir, started, 0, &err.to_string());
        }
        Err(join_err) => {
            return failed(
                &region,
                &dump,
                &ctx.artifact_dir,
                started,
                0,
                &join_err.to_string(),
            );
        }
    };

    if ctx.shutdown.is_cancelled() {
        let _ = std::fs::remove_file(&dump);
        info!(region = %region, "Dropping rendered region: shutdown requested");
        return cancelled(rows);
    }

    match ctx.client.import(&dump).await {
        Ok(()) => {
            let _ = std::fs::remove_file(&dump);
            let elapsed_ms = started.elapsed().as_millis() as u64;
            info!(region = %region, rows, elapsed_ms, "Region imported");
            RegionOutcome {
                region,
                rows,
                elapsed_ms,
                outcome: Outcome::Imported,
            }
        }
        Err(err) => failed(
            &region,
            &dump,
            &ctx.artifact_dir,
            started,
            rows,
            &err.to_string(),
        ),
    }
}

fn failed(
    region: &str,
    dump: &Path,
    artifact_dir: &Path,
    started: Instant,
    rows: u64,
    message: &str,
) -> RegionOutcome {
    warn!(region = %region, error = %message, "Region failed");
    let artifact = preserve_artifact(region, dump, artifact_dir);
    RegionOutcome {
        region: region.to_string(),
        rows,
        elapsed_ms: started.elapsed().as_millis() as u64,
        outcome: Outcome::Failed {
            error: message.to_string(),
            artifact,
        },
    }
}

/// Move whatever was rendered into the artifact directory for later
/// inspection. Returns the artifact path, or `None` when there is
/// nothing to keep.
pub(super) fn preserve_artifact(
    region: &str,
    dump: &Path,
    artifact_dir: &Path,
) -> Option<PathBuf> {
    if !dump.exists() {
        return None;
    }
    let target = artifact_dir.join(format!("{region}_failed.sql"));
    let preserved = std::fs::create_dir_all(artifact_dir)
        .and_then(|()| std::fs::copy(dump, &target))
        .and_then(|_| std::fs::remove_file(dump));
    match preserved {
        Ok(()) => {
            info!(region = %region, artifact = %target.display(), "Preserved failed dump");
            Some(target)
        }
        Err(err) => {
            error!(region = %region, error = %err, "Could not preserve failed dump");
            None
        }
    }
}

/// Render one scope of the catalog into a single SQL file: common
/// tables when `region` is `None`, that region's tables otherwise.
#[allow(clippy::too_many_arguments)]
pub(super) fn render_scope(
    source: &Path,
    catalog: &Catalog,
    rep: RepresentationRef,
    render: &RenderOptions,
    policy: ParsePolicy,
    tables: Option<&[String]>,
    region: Option<&str>,
    out: &Path,
) -> Result<u64, PipelineError> {
    let mut storage = Storage::resolve(source)?;
    let converter = Converter::new(catalog, rep.clone(), render.clone(), policy);
    let mut router = OutputRouter::new(out, OutputMode::Direct, rep)?;

    let wanted_scope = if region.is_some() {
        Scope::Region
    } else {
        Scope::Common
    };
    let mut rows = 0;
    for def in converter.select_tables(tables)? {
        if def.scope != wanted_scope {
            continue;
        }
        rows += converter
            .dump_table(&mut storage, &mut router, def, region)?
            .rows;
    }
    router.finish()?;
    Ok(rows)
}
