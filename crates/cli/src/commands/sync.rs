//! sync command - Make a destination match a source
//!
//! The two listings are merged in order; every resulting create, update and
//! delete runs on the worker pool while the merge keeps producing.

use std::sync::Arc;
use std::time::Instant;

use clap::Args;

use s3k_core::{
    parse_path, Action, ActionKind, Filesystem, MergeDiff, PoolOptions, Result, Tally, WorkerPool,
};

use super::{AclArgs, Context};
use crate::exit_code::ExitCode;
use crate::output::ProgressBar;

/// Make a destination root match a source root
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Source root followed by destination root
    #[arg(value_name = "SRC DEST")]
    pub roots: Vec<String>,

    /// Delete destination entries missing from the source
    #[arg(long)]
    pub delete: bool,

    #[command(flatten)]
    pub acl: AclArgs,
}

/// Execute the sync command
pub async fn execute(args: SyncArgs, ctx: &Context) -> ExitCode {
    let [source, dest] = args.roots.as_slice() else {
        ctx.formatter.error("sync needs exactly two roots: SRC DEST");
        return ExitCode::UsageError;
    };

    let (source, dest) = match parse_path(source).and_then(|s| Ok((s, parse_path(dest)?))) {
        Ok(parsed) => parsed,
        Err(e) => {
            ctx.formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };

    let started = Instant::now();
    let source = ctx.filesystem(&source);
    let dest = ctx.filesystem(&dest);
    tracing::debug!(
        source = %source,
        dest = %dest,
        delete = ctx.options.delete_extraneous,
        "Starting sync"
    );

    let tally = Arc::new(Tally::new());
    let progress = Arc::new(ctx.formatter.spinner("syncing"));

    let pool = {
        let ctx = ctx.clone();
        let dest = dest.clone();
        let tally = Arc::clone(&tally);
        let progress = Arc::clone(&progress);
        WorkerPool::spawn(PoolOptions::from_run(&ctx.options), move |action: Action| {
            apply(
                ctx.clone(),
                dest.clone(),
                Arc::clone(&tally),
                Arc::clone(&progress),
                action,
            )
        })
    };

    let mut diff = MergeDiff::new(source.files(), dest.files(), ctx.options.delete_extraneous);
    let mut listing_failed = false;
    loop {
        match diff.next_action().await {
            Ok(Some(action)) => {
                if !pool.submit(action).await {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                ctx.report(&e);
                pool.fail(e);
                listing_failed = true;
                break;
            }
        }
    }
    tally.set_unchanged(diff.unchanged());

    let outcome = pool.finish().await;
    progress.finish_and_clear();

    // Partial counts are meaningless once a listing failed
    if listing_failed {
        return ExitCode::from_outcome(outcome.first_error.as_ref());
    }

    ctx.formatter
        .summary(&tally.snapshot(), ctx.options.dry_run, started.elapsed());
    ExitCode::from_outcome(outcome.first_error.as_ref())
}

async fn apply(
    ctx: Context,
    dest: Filesystem,
    tally: Arc<Tally>,
    progress: Arc<ProgressBar>,
    action: Action,
) -> Result<()> {
    let relative = action.file.relative();
    ctx.item_result(relative, action.apply(&dest, ctx.options.dry_run).await)?;

    match action.kind {
        ActionKind::Create => tally.add(),
        ActionKind::Update => tally.update(),
        ActionKind::Delete => tally.delete(),
    }
    progress.inc();
    ctx.formatter.action(action.kind.marker(), relative);
    Ok(())
}
