//! ls command - List buckets and entries
//!
//! Lists buckets when given no roots, otherwise lists every entry below each
//! root in order, followed by totals.

use clap::Args;
use serde::Serialize;

use s3k_core::{Error, File};

use super::{parse_roots, Context};
use crate::exit_code::ExitCode;

/// List buckets or entries
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Roots to list (s3://bucket/prefix or local path); lists buckets when omitted
    pub roots: Vec<String>,

    /// Show modification time and human-readable size
    #[arg(short, long)]
    pub long: bool,
}

#[derive(Debug, Serialize)]
struct EntryLine {
    path: String,
    size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    modified: Option<jiff::Timestamp>,
}

#[derive(Debug, Serialize)]
struct BucketLine {
    bucket: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    created: Option<jiff::Timestamp>,
}

#[derive(Debug, Default, Serialize)]
struct Totals {
    files: usize,
    bytes: u64,
}

/// Execute the ls command
pub async fn execute(args: LsArgs, ctx: &Context) -> ExitCode {
    if args.roots.is_empty() {
        return list_buckets(ctx).await;
    }

    let roots = match parse_roots(&args.roots) {
        Ok(roots) => roots,
        Err(e) => {
            ctx.formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };

    let mut totals = Totals::default();
    let mut first_error: Option<Error> = None;

    for root in &roots {
        let mut listing = ctx.filesystem(root).files();
        while let Some(file) = listing.next().await {
            print_entry(ctx, &file, args.long);
            totals.files += 1;
            totals.bytes += file.size();
        }
        if let Some(e) = listing.take_error() {
            ctx.report(&e);
            first_error.get_or_insert(e);
        }
    }

    if totals.files == 0 {
        if first_error.is_none() {
            ctx.formatter.println("No files found.");
        }
    } else if ctx.formatter.is_json() {
        ctx.formatter.json(&totals);
    } else {
        ctx.formatter.println(&format!(
            "\n{} files, {} bytes",
            totals.files, totals.bytes
        ));
    }

    ExitCode::from_outcome(first_error.as_ref())
}

async fn list_buckets(ctx: &Context) -> ExitCode {
    match ctx.store.list_buckets().await {
        Ok(buckets) => {
            for bucket in buckets {
                if ctx.formatter.is_json() {
                    ctx.formatter.json(&BucketLine {
                        bucket: bucket.name,
                        created: bucket.created,
                    });
                } else {
                    ctx.formatter.line(&format!("s3://{}/", bucket.name));
                }
            }
            ExitCode::Success
        }
        Err(e) => {
            ctx.formatter.error(&format!("Failed to list buckets: {e}"));
            ExitCode::from_error(&e)
        }
    }
}

fn print_entry(ctx: &Context, file: &File, long: bool) {
    let formatter = &ctx.formatter;
    if formatter.is_json() {
        formatter.json(&EntryLine {
            path: file.to_string(),
            size: file.size(),
            modified: file.modified(),
        });
    } else if formatter.is_quiet() {
        formatter.line(&file.to_string());
    } else if long {
        formatter.line(&long_line(file));
    } else {
        formatter.line(&format!("{file}\t{}b", file.size()));
    }
}

fn long_line(file: &File) -> String {
    let date = file
        .modified()
        .map(|t| t.strftime("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| " ".repeat(19));
    let size = humansize::format_size(file.size(), humansize::BINARY);
    format!("[{date}] {size:>10} {file}")
}
