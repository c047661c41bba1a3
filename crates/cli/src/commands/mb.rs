//! mb command - Make buckets
//!
//! Creates each named bucket, applying the canned ACL when one is set.

use clap::Args;
use serde::Serialize;

use s3k_core::{parse_bucket, Error};

use super::{AclArgs, Context};
use crate::exit_code::ExitCode;

/// Create buckets
#[derive(Args, Debug)]
pub struct MbArgs {
    /// Buckets to create (s3://bucket or bucket)
    #[arg(required = true)]
    pub buckets: Vec<String>,

    #[command(flatten)]
    pub acl: AclArgs,
}

#[derive(Debug, Serialize)]
struct BucketStatus<'a> {
    status: &'static str,
    bucket: &'a str,
}

/// Execute the mb command
pub async fn execute(args: MbArgs, ctx: &Context) -> ExitCode {
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
            ctx.store.create_bucket(name, ctx.options.acl).await
        };

        match result {
            Ok(()) => report(ctx, "created", name),
            Err(e) => {
                ctx.formatter.item_error(&format!("s3://{name}/"), &e);
                first_error.get_or_insert(e);
            }
        }
    }

    ExitCode::from_outcome(first_error.as_ref())
}

pub(crate) fn report(ctx: &Context, status: &'static str, bucket: &str) {
    if ctx.formatter.is_json() {
        ctx.formatter.json(&BucketStatus { status, bucket });
    } else {
        ctx.formatter.println(&format!("Bucket s3://{bucket}/ {status}"));
    }
}
