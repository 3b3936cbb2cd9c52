//! Region-parallel conversion and import pipeline.
//!
//! One job: acquire the archive, load the catalog, apply DDL, import
//! the common tables, then fan the region-scoped tables out over a
//! bounded worker pool. A failed region never stops its siblings.
//!
//! Imports are additive. Re-running a job against the same database
//! duplicates rows; use `pre_drop` for a clean reload.

mod region;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use snafu::prelude::*;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use garload_core::error::ConfigError;
use garload_core::{
    Catalog, CatalogRef, Converter, OutputMode, OutputRouter, ParsePolicy, Registry,
    RenderOptions, Storage,
};

use crate::error::{PipelineError, TaskJoinSnafu, WorkspaceSnafu};
use crate::fetch;
use crate::import::ImportClient;

pub use region::{Outcome, RegionOutcome};

use region::{render_scope, RegionContext};

/// Everything one pipeline run needs.
pub struct PipelineOptions {
    /// Archive: local path or http(s) URL.
    pub source: String,
    /// Schema source; `None` reads the XSD members of the archive.
    pub schema: Option<PathBuf>,
    /// Target key; SQL targets only, delimited targets are rejected.
    pub target: String,
    pub tables: Option<Vec<String>>,
    pub regions: Option<Vec<String>>,
    /// Concurrent region workers.
    pub jobs: usize,
    pub artifact_dir: PathBuf,
    pub keep_archive: bool,
    pub render: RenderOptions,
    pub policy: ParsePolicy,
}

/// Aggregated result of a pipeline run.
#[derive(Debug, Serialize)]
pub struct JobSummary {
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Rows imported, common tables included.
    pub rows: u64,
    pub regions: Vec<RegionOutcome>,
}

impl JobSummary {
    pub fn all_imported(&self) -> bool {
        self.failed == 0 && self.cancelled == 0
    }

    pub fn failed_regions(&self) -> impl Iterator<Item = &RegionOutcome> {
        self.regions
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Failed { .. }))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Intersect requested regions with the source, keeping source order.
/// Requests for absent regions fail before any work starts.
fn select_regions(
    available: &[String],
    requested: Option<&[String]>,
) -> Result<Vec<String>, ConfigError> {
    match requested {
        None => Ok(available.to_vec()),
        Some(requested) => {
            let missing: Vec<String> = requested
                .iter()
                .filter(|r| !available.contains(r))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(ConfigError::UnknownRegions { regions: missing });
            }
            Ok(available
                .iter()
                .filter(|r| requested.contains(r))
                .cloned()
                .collect())
        }
    }
}

/// Run the full pipeline to completion.
pub async fn run(
    opts: PipelineOptions,
    client: Arc<dyn ImportClient>,
    shutdown: CancellationToken,
) -> Result<JobSummary, PipelineError> {
    let started = Instant::now();
    let started_at = Utc::now();

    let keep_dir = opts.keep_archive.then(|| opts.artifact_dir.clone());
    let acquired = fetch::acquire(&opts.source, keep_dir.as_deref()).await?;
    let source = acquired.path().to_path_buf();
    let schema_source = opts.schema.clone().unwrap_or_else(|| source.clone());

    let rep = Registry::with_builtins().get(&opts.target)?;
    let tables = opts.tables.clone().map(Arc::new);

    // Catalog load and region listing touch the filesystem; keep them
    // off the async workers.
    let (catalog, available) = {
        let schema_source = schema_source.clone();
        let source = source.clone();
        let tables = tables.clone();
        tokio::task::spawn_blocking(move || -> Result<_, PipelineError> {
            let mut schema_storage = Storage::resolve(&schema_source)?;
            let catalog =
                Catalog::load(&mut schema_storage, tables.as_deref().map(Vec::as_slice))?;
            let available = Storage::resolve(&source)?.list_regions()?;
            Ok((catalog, available))
        })
        .await
        .context(TaskJoinSnafu)??
    };
    let catalog: CatalogRef = Arc::new(catalog);
    let regions = select_regions(&available, opts.regions.as_deref())?;

    info!(
        tables = catalog.len(),
        regions = regions.len(),
        jobs = opts.jobs,
        target = %opts.target,
        "Pipeline starting"
    );

    let workdir = tempfile::tempdir().context(WorkspaceSnafu)?;

    // DDL once per job.
    let ddl = workdir.path().join("schema.sql");
    {
        let catalog = catalog.clone();
        let rep = rep.clone();
        let render = opts.render.clone();
        let policy = opts.policy;
        let tables = tables.clone();
        let ddl = ddl.clone();
        tokio::task::spawn_blocking(move || -> Result<(), PipelineError> {
            let converter = Converter::new(&catalog, rep.clone(), render, policy);
            let mut router = OutputRouter::new(&ddl, OutputMode::Direct, rep)?;
            converter.dump_schema(&mut router, tables.as_deref().map(Vec::as_slice))?;
            router.finish()?;
            Ok(())
        })
        .await
        .context(TaskJoinSnafu)??;
    }
    client.import(&ddl).await?;
    info!("Schema applied");

    // Common tables once, before any region references them.
    let common = workdir.path().join("common.sql");
    let common_rows = {
        let source = source.clone();
        let catalog = catalog.clone();
        let rep = rep.clone();
        let render = opts.render.clone();
        let policy = opts.policy;
        let tables = tables.clone();
        let common = common.clone();
        tokio::task::spawn_blocking(move || {
            render_scope(
                &source,
                &catalog,
                rep,
                &render,
                policy,
                tables.as_deref().map(Vec::as_slice),
                None,
                &common,
            )
        })
        .await
        .context(TaskJoinSnafu)??
    };
    if let Err(err) = client.import(&common).await {
        let _ = region::preserve_artifact("common", &common, &opts.artifact_dir);
        return Err(err.into());
    }
    info!(rows = common_rows, "Common tables imported");

    // Region fan-out over a bounded pool.
    let limiter = Arc::new(Semaphore::new(opts.jobs.max(1)));
    let ctx = RegionContext {
        source,
        catalog,
        rep,
        render: opts.render.clone(),
        policy: opts.policy,
        tables,
        workdir: workdir.path().to_path_buf(),
        artifact_dir: opts.artifact_dir.clone(),
        client,
        limiter,
        shutdown,
    };

    let mut join_set = JoinSet::new();
    for region in regions {
        join_set.spawn(region::run_region(ctx.clone(), region));
    }

    let mut outcomes = Vec::new();
    while let Some(joined) = join_set.join_next().await {
        outcomes.push(joined.context(TaskJoinSnafu)?);
    }
    outcomes.sort_by(|a, b| a.region.cmp(&b.region));

    let succeeded = outcomes.iter().filter(|o| o.is_imported()).count();
    let cancelled = outcomes
        .iter()
        .filter(|o| matches!(o.outcome, Outcome::Cancelled))
        .count();
    let failed = outcomes.len() - succeeded - cancelled;
    let rows = common_rows
        + outcomes
            .iter()
            .filter(|o| o.is_imported())
            .map(|o| o.rows)
            .sum::<u64>();

    let summary = JobSummary {
        started_at,
        elapsed_ms: started.elapsed().as_millis() as u64,
        succeeded,
        failed,
        cancelled,
        rows,
        regions: outcomes,
    };

    if summary.all_imported() {
        info!(
            regions = summary.succeeded,
            rows = summary.rows,
            elapsed_ms = summary.elapsed_ms,
            "Pipeline complete"
        );
    } else {
        for outcome in summary.failed_regions() {
            if let Outcome::Failed { error, artifact } = &outcome.outcome {
                warn!(
                    region = %outcome.region,
                    error = %error,
                    artifact = artifact.as_ref().map(|p| p.display().to_string()),
                    "Region left unimported"
                );
            }
        }
        warn!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "Pipeline finished with failures"
        );
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regions(codes: &[&str]) -> Vec<String> {
        codes.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn region_selection_keeps_source_order() {
        let available = regions(&["01", "02", "77"]);
        let requested = regions(&["77", "01"]);
        assert_eq!(
            select_regions(&available, Some(&requested)).unwrap(),
            regions(&["01", "77"])
        );
        assert_eq!(select_regions(&available, None).unwrap(), available);
    }

    #[test]
    fn unknown_regions_fail_up_front() {
        let available = regions(&["01", "02"]);
        let requested = regions(&["02", "98", "99"]);
        match select_regions(&available, Some(&requested)).unwrap_err() {
            ConfigError::UnknownRegions { regions: missing } => {
                assert_eq!(missing, vec!["98", "99"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
