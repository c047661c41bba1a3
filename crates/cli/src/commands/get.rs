//! get command - Download entries
//!
//! Copies every entry of every root into a local directory, keeping each
//! entry's path relative to its root.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use serde::Serialize;

use s3k_core::fs::LocalFilesystem;
use s3k_core::{File, PoolOptions, Result, WorkerPool};

use super::{feed, parse_roots, Context};
use crate::exit_code::ExitCode;
use crate::output::ProgressBar;

/// Download entries into a local directory
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Roots to download (s3://bucket/prefix or local path)
    #[arg(required = true)]
    pub roots: Vec<String>,

    /// Directory to write into
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,
}

#[derive(Debug, Serialize)]
struct GetLine {
    source: String,
    path: String,
    size: u64,
}

/// Execute the get command
pub async fn execute(args: GetArgs, ctx: &Context) -> ExitCode {
    let roots = match parse_roots(&args.roots) {
        Ok(roots) => roots,
        Err(e) => {
            ctx.formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };

    let target = LocalFilesystem::new(args.output_dir, ctx.options.queue_capacity);
    let progress = Arc::new(ctx.formatter.spinner("downloading"));

    let pool = {
        let ctx = ctx.clone();
        let progress = Arc::clone(&progress);
        WorkerPool::spawn(PoolOptions::from_run(&ctx.options), move |file: File| {
            download(ctx.clone(), target.clone(), Arc::clone(&progress), file)
        })
    };

    let submitted = feed(ctx, &roots, &pool).await;
    let outcome = pool.finish().await;
    progress.finish_and_clear();

    if submitted == 0 && outcome.is_ok() {
        ctx.formatter.println("No files found.");
    }
    tracing::debug!(
        completed = outcome.completed,
        failed = outcome.failed,
        skipped = outcome.skipped,
        "get finished"
    );
    ExitCode::from_outcome(outcome.first_error.as_ref())
}

async fn download(
    ctx: Context,
    target: LocalFilesystem,
    progress: Arc<ProgressBar>,
    file: File,
) -> Result<()> {
    let name = file.to_string();
    let dest = ctx.item_result(&name, target.path_of(file.relative()))?;
    let written = if ctx.options.dry_run {
        file.size()
    } else {
        ctx.item_result(&name, target.create(&file).await)?
    };

    if ctx.formatter.is_json() {
        if !ctx.formatter.is_quiet() {
            ctx.formatter.json(&GetLine {
                source: name,
                path: dest.display().to_string(),
                size: written,
            });
        }
    } else {
        ctx.formatter
            .println(&format!("{name} -> {} ({written} bytes)", dest.display()));
    }
    progress.inc();
    Ok(())
}
