//! rb command - Remove buckets
//!
//! Buckets must already be empty.

use clap::Args;

use s3k_core::{parse_bucket, Error};

use super::mb::report;
use super::Context;
use crate::exit_code::ExitCode;

/// Remove buckets
#[derive(Args, Debug)]
pub struct RbArgs {
    /// Buckets to remove (s3://bucket or bucket)
    #[arg(required = true)]
    pub buckets: Vec<String>,
}

/// Execute the rb command
pub async fn execute(args: RbArgs, ctx: &Context) -> ExitCode {
    let names = match args
        .buckets
        .iter()
        .map(|b| parse_bucket(b))
        .collect::<Result<Vec<_>, Error>>()
    {
        Ok(names) => names,
        Err(e) => {
            ctx.formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };

    let mut first_error = None;
    for name in &names {
        let result = if ctx.options.dry_run {
            Ok(())
        } else {
            ctx.store.delete_bucket(name).await
        };

        match result {
            Ok(()) => report(ctx, "removed", name),
            Err(e) => {
                ctx.formatter.item_error(&format!("s3://{name}/"), &e);
                first_error.get_or_insert(e);
            }
        }
    }

    ExitCode::from_outcome(first_error.as_ref())
}
