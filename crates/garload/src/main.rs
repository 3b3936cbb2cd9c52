//! garload CLI entry point.
//!
//! Exit codes: 0 on full success, 1 on fatal errors, 2 when the run
//! finished but left regions unimported or the verification check
//! mismatched.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use garload_core::{Converter, OutputMode, OutputRouter, Registry, Storage};

use garload::cli::{Cli, Command, DumpArgs, PipelineArgs, SchemaArgs, VerifyArgs};
use garload::config::RunOptions;
use garload::error::PipelineError;
use garload::pipeline::{self, PipelineOptions};
use garload::signal::shutdown_signal;
use garload::{init_tracing, verify, PsqlClient};

const EXIT_PARTIAL: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let opts = match cli.run_options() {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("Failed to load options: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Command::Schema(args) => run_schema(args, opts),
        Command::Dump(args) => run_dump(args, opts),
        Command::Pipeline(args) => run_pipeline(args, opts).await,
        Command::Verify(args) => run_verify(args, opts).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_schema(args: SchemaArgs, opts: RunOptions) -> Result<ExitCode, PipelineError> {
    let tables = filter(&args.tables);
    let mut storage = Storage::resolve(&args.source)?;
    let catalog = garload_core::Catalog::load(&mut storage, tables.as_deref())?;

    let rep = Registry::with_builtins().get(&args.render.target)?;
    let mode = if args.output.is_dir() {
        OutputMode::PerTable
    } else {
        OutputMode::Direct
    };
    let converter = Converter::new(&catalog, rep.clone(), opts.render, opts.policy);
    let mut router = OutputRouter::new(&args.output, mode, rep)?;
    converter.dump_schema(&mut router, tables.as_deref())?;
    let paths = router.finish()?;

    info!(files = paths.len(), "Schema rendered");
    Ok(ExitCode::SUCCESS)
}

fn run_dump(args: DumpArgs, opts: RunOptions) -> Result<ExitCode, PipelineError> {
    let tables = filter(&args.tables);
    let mut storage = Storage::resolve(&args.source)?;
    let catalog = garload_core::Catalog::load(&mut storage, tables.as_deref())?;

    let regions = match filter(&args.regions) {
        Some(regions) => regions,
        None => storage.list_regions()?,
    };

    let rep = Registry::with_builtins().get(&args.render.target)?;
    let converter = Converter::new(&catalog, rep.clone(), opts.render, opts.policy);
    let mut router = OutputRouter::new(&args.output, opts.mode, rep)?;
    let reports = converter.dump_tables(&mut storage, &mut router, tables.as_deref(), &regions)?;
    let paths = router.finish()?;

    let rows: u64 = reports.iter().map(|r| r.rows).sum();
    info!(rows, files = paths.len(), "Dump rendered");
    Ok(ExitCode::SUCCESS)
}

async fn run_pipeline(args: PipelineArgs, opts: RunOptions) -> Result<ExitCode, PipelineError> {
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    let jobs = match args.jobs {
        Some(jobs) => jobs,
        None => std::thread::available_parallelism().map_or(1, |n| n.get()),
    };

    let client = Arc::new(PsqlClient::new(opts.database.clone()));
    let summary = pipeline::run(
        PipelineOptions {
            source: args.source,
            schema: args.schema,
            target: args.render.target,
            tables: filter(&args.tables),
            regions: filter(&args.regions),
            jobs,
            artifact_dir: args.artifact_dir,
            keep_archive: args.keep_archive,
            render: opts.render,
            policy: opts.policy,
        },
        client,
        shutdown,
    )
    .await?;

    if args.json {
        match summary.to_json() {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Failed to serialize summary: {e}"),
        }
    }

    if summary.all_imported() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_PARTIAL))
    }
}

async fn run_verify(args: VerifyArgs, opts: RunOptions) -> Result<ExitCode, PipelineError> {
    let client = PsqlClient::new(opts.database.clone());
    let report = verify::run(&client, args.expected, args.tolerance).await?;

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.render_text());
    }

    if report.passed() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_PARTIAL))
    }
}

fn filter(values: &[String]) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values.to_vec())
    }
}
