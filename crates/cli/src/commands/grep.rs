//! grep command - Search entry contents
//!
//! Scans every entry of every root for a literal pattern, in parallel.
//! Names ending in `.gz` are decompressed before searching.

use std::sync::Arc;

use clap::Args;
use serde::Serialize;

use s3k_core::search::search;
use s3k_core::{File, Pattern, PoolOptions, Result, SearchMode, WorkerPool};

use super::{feed, parse_roots, Context};
use crate::exit_code::ExitCode;

/// Search entry contents for a literal pattern
#[derive(Args, Debug)]
pub struct GrepArgs {
    /// Literal text to search for
    pub pattern: String,

    /// Roots to search (s3://bucket/prefix or local path)
    #[arg(required = true)]
    pub roots: Vec<String>,

    /// Only print the names of entries with a match
    #[arg(short = 'l', long)]
    pub files_with_matches: bool,

    /// Do not prefix matching lines with the entry name
    #[arg(long)]
    pub no_filename: bool,

    /// Match ASCII letters case-insensitively
    #[arg(short, long)]
    pub ignore_case: bool,
}

#[derive(Debug, Serialize)]
struct MatchLine<'a> {
    path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct Shape {
    mode: SearchMode,
    with_name: bool,
}

/// Execute the grep command
pub async fn execute(args: GrepArgs, ctx: &Context) -> ExitCode {
    let roots = match parse_roots(&args.roots) {
        Ok(roots) => roots,
        Err(e) => {
            ctx.formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };

    let pattern = Arc::new(Pattern::new(args.pattern.into_bytes(), args.ignore_case));
    let shape = Shape {
        mode: if args.files_with_matches {
            SearchMode::FilesWithMatches
        } else {
            SearchMode::Lines
        },
        with_name: !args.no_filename,
    };

    let pool = {
        let ctx = ctx.clone();
        WorkerPool::spawn(PoolOptions::from_run(&ctx.options), move |file: File| {
            let ctx = ctx.clone();
            let pattern = Arc::clone(&pattern);
            async move {
                let name = file.to_string();
                let result = scan(&ctx, &file, &pattern, shape).await;
                ctx.item_result(&name, result)
            }
        })
    };

    feed(ctx, &roots, &pool).await;
    let outcome = pool.finish().await;
    ExitCode::from_outcome(outcome.first_error.as_ref())
}

async fn scan(ctx: &Context, file: &File, pattern: &Pattern, shape: Shape) -> Result<()> {
    if file.is_directory() {
        return Ok(());
    }

    let mut reader = file.open_decoded().await?;
    let result = search(&mut reader, pattern, shape.mode).await?;
    if !result.matched {
        return Ok(());
    }

    let name = file.to_string();
    if shape.mode == SearchMode::FilesWithMatches {
        if ctx.formatter.is_json() {
            ctx.formatter.json(&MatchLine {
                path: &name,
                line: None,
            });
        } else {
            ctx.formatter.line(&name);
        }
        return Ok(());
    }

    for line in result.lines {
        let line = String::from_utf8_lossy(&line).into_owned();
        if ctx.formatter.is_json() {
            ctx.formatter.json(&MatchLine {
                path: &name,
                line: Some(line),
            });
        } else if shape.with_name {
            ctx.formatter.line(&format!("{name}:{line}"));
        } else {
            ctx.formatter.line(&line);
        }
    }
    Ok(())
}
