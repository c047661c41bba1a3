//! rm command - Remove entries
//!
//! Remote keys are collected into bulk deletes of up to 1000 keys per
//! bucket. Local files are removed one by one through the worker pool.

use std::sync::Arc;
use std::time::Instant;

use clap::Args;

use s3k_core::{BatchDeleter, Error, ErrorPolicy, File, PoolOptions, Result, Tally, WorkerPool};

use super::{parse_roots, Context};
use crate::exit_code::ExitCode;

/// Remove every entry below roots
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Roots to remove (s3://bucket/prefix or local path)
    #[arg(required = true)]
    pub roots: Vec<String>,
}

/// Execute the rm command
pub async fn execute(args: RmArgs, ctx: &Context) -> ExitCode {
    let roots = match parse_roots(&args.roots) {
        Ok(roots) => roots,
        Err(e) => {
            ctx.formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };

    let started = Instant::now();
    let tally = Arc::new(Tally::new());
    let mut batch = BatchDeleter::new(Arc::clone(&ctx.store), ctx.options.dry_run);

    let pool = {
        let ctx = ctx.clone();
        let tally = Arc::clone(&tally);
        WorkerPool::spawn(PoolOptions::from_run(&ctx.options), move |file: File| {
            remove_local(ctx.clone(), Arc::clone(&tally), file)
        })
    };

    'roots: for root in &roots {
        let mut listing = ctx.filesystem(root).files();
        while let Some(file) = listing.next().await {
            let File::Remote(remote) = &file else {
                if !pool.submit(file).await {
                    break 'roots;
                }
                continue;
            };

            let bucket = remote.bucket();
            if let Err(e) = batch.push(bucket, remote.key()).await {
                ctx.formatter.item_error(&format!("s3://{bucket}/"), &e);
                pool.fail(e);
                break 'roots;
            }
            ctx.formatter.action('D', &file.to_string());
        }
        if let Some(e) = listing.take_error() {
            ctx.report(&e);
            pool.fail(e);
            break;
        }
    }

    match batch.finish().await {
        Ok(report) => {
            tracing::debug!(calls = report.calls, deleted = report.deleted, "Batches flushed");
            tally.deleted_many(report.deleted);
            for (key, message) in &report.failed {
                ctx.formatter.item_error(key, &Error::General(message.clone()));
            }
            if !report.failed.is_empty() && ctx.options.error_policy == ErrorPolicy::Fail {
                pool.fail(Error::General(format!(
                    "{} keys could not be deleted",
                    report.failed.len()
                )));
            }
        }
        Err(e) => {
            ctx.report(&e);
            pool.fail(e);
        }
    }

    let outcome = pool.finish().await;
    ctx.formatter
        .summary(&tally.snapshot(), ctx.options.dry_run, started.elapsed());
    ExitCode::from_outcome(outcome.first_error.as_ref())
}

async fn remove_local(ctx: Context, tally: Arc<Tally>, file: File) -> Result<()> {
    if !ctx.options.dry_run {
        ctx.item_result(&file.to_string(), file.delete().await)?;
    }
    tally.delete();
    ctx.formatter.action('D', &file.to_string());
    Ok(())
}
