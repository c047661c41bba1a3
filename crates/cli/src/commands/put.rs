//! put command - Upload entries
//!
//! `put SRC... DEST` creates every entry of every source root in the
//! destination root, keeping relative paths.

use std::sync::Arc;
use std::time::Instant;

use clap::Args;

use s3k_core::{parse_path, File, Filesystem, PoolOptions, Result, Tally, WorkerPool};

use super::{feed, parse_roots, AclArgs, Context};
use crate::exit_code::ExitCode;
use crate::output::ProgressBar;

/// Upload entries to a destination root
#[derive(Args, Debug)]
pub struct PutArgs {
    /// Source roots followed by the destination root
    #[arg(required = true, num_args = 2.., value_name = "SRC... DEST")]
    pub paths: Vec<String>,

    #[command(flatten)]
    pub acl: AclArgs,
}

/// Execute the put command
pub async fn execute(args: PutArgs, ctx: &Context) -> ExitCode {
    let Some((dest, sources)) = args.paths.split_last() else {
        ctx.formatter.error("put needs at least one source and a destination");
        return ExitCode::UsageError;
    };

    let (sources, dest) = match parse_roots(sources).and_then(|s| Ok((s, parse_path(dest)?))) {
        Ok(parsed) => parsed,
        Err(e) => {
            ctx.formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };

    let started = Instant::now();
    let dest = ctx.filesystem(&dest);
    let tally = Arc::new(Tally::new());
    let progress = Arc::new(ctx.formatter.spinner("uploading"));

    let pool = {
        let ctx = ctx.clone();
        let tally = Arc::clone(&tally);
        let progress = Arc::clone(&progress);
        WorkerPool::spawn(PoolOptions::from_run(&ctx.options), move |file: File| {
            upload(
                ctx.clone(),
                dest.clone(),
                Arc::clone(&tally),
                Arc::clone(&progress),
                file,
            )
        })
    };

    feed(ctx, &sources, &pool).await;
    let outcome = pool.finish().await;
    progress.finish_and_clear();

    ctx.formatter
        .summary(&tally.snapshot(), ctx.options.dry_run, started.elapsed());
    ExitCode::from_outcome(outcome.first_error.as_ref())
}

async fn upload(
    ctx: Context,
    dest: Filesystem,
    tally: Arc<Tally>,
    progress: Arc<ProgressBar>,
    file: File,
) -> Result<()> {
    if !ctx.options.dry_run {
        ctx.item_result(&file.to_string(), dest.create(&file).await)?;
    }
    tally.add();
    progress.inc();
    ctx.formatter.action('A', &file.to_string());
    Ok(())
}
