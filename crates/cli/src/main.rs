//! s3k - Swiss army pen-knife for S3
//!
//! Lists, copies, searches, deletes and synchronises objects between
//! buckets and local directory trees.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use s3knife::commands::{self, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries command output
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let exit_code = commands::execute(cli).await;

    std::process::exit(exit_code.as_i32());
}
