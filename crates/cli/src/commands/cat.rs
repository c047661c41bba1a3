//! cat command - Display entry contents
//!
//! Streams every entry of every root to stdout in listing order. Names
//! ending in `.gz` are decompressed on the fly.

use clap::Args;
use tokio::io::AsyncReadExt;

use s3k_core::{File, PoolOptions, Result, WorkerPool};

use super::{feed, parse_roots, Context};
use crate::exit_code::ExitCode;

const CHUNK: usize = 64 * 1024;

/// Print entry contents
#[derive(Args, Debug)]
pub struct CatArgs {
    /// Roots to print (s3://bucket/prefix or local path)
    #[arg(required = true)]
    pub roots: Vec<String>,
}

/// Execute the cat command
pub async fn execute(args: CatArgs, ctx: &Context) -> ExitCode {
    let roots = match parse_roots(&args.roots) {
        Ok(roots) => roots,
        Err(e) => {
            ctx.formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };

    // One worker keeps the output in listing order
    let pool = {
        let ctx = ctx.clone();
        WorkerPool::spawn(PoolOptions::sequential(&ctx.options), move |file: File| {
            let ctx = ctx.clone();
            async move {
                let name = file.to_string();
                let result = stream(&ctx, &file).await;
                ctx.item_result(&name, result)
            }
        })
    };

    feed(ctx, &roots, &pool).await;
    let outcome = pool.finish().await;
    ExitCode::from_outcome(outcome.first_error.as_ref())
}

async fn stream(ctx: &Context, file: &File) -> Result<()> {
    if file.is_directory() {
        return Ok(());
    }
    let mut reader = file.open_decoded().await?;
    let mut buf = vec![0u8; CHUNK];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        ctx.formatter.raw(&buf[..n]);
    }
}
