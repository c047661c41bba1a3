//! CLI command definitions and execution
//!
//! Every command receives a `Context` carrying the object store, the run
//! options built once from flags and configuration, and the shared output
//! formatter. Bulk commands feed their entries through the core worker pool.

use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use s3k_core::config::Defaults;
use s3k_core::{
    parse_path, CannedAcl, Config, ConfigManager, Error, ErrorPolicy, File, Filesystem,
    ObjectStore, ParsedPath, Result, RunOptions, WorkerPool,
};
use s3k_s3::S3Client;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

mod cat;
pub mod completions;
mod get;
mod grep;
mod ls;
mod mb;
mod put;
mod rb;
mod rm;
mod sync;

/// s3k - Swiss army pen-knife for S3
///
/// Lists, copies, searches, deletes and synchronises objects between
/// buckets and local directory trees.
#[derive(Parser, Debug)]
#[command(name = "s3k")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Disable progress spinner
    #[arg(long, global = true, default_value = "false")]
    pub no_progress: bool,

    /// Suppress per-item progress lines
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    /// Number of concurrent workers
    #[arg(short = 'p', long, global = true, value_name = "N")]
    pub parallel: Option<usize>,

    /// Show what would be done without changing anything
    #[arg(short = 'n', long, global = true, default_value = "false")]
    pub dry_run: bool,

    /// Report failed items and keep going
    #[arg(long, global = true, default_value = "false")]
    pub ignore_errors: bool,

    /// Region of the object store
    #[arg(long, global = true, env = "S3K_REGION")]
    pub region: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List buckets, or the entries below roots
    Ls(ls::LsArgs),

    /// Download entries into a local directory
    Get(get::GetArgs),

    /// Upload entries to a destination root
    Put(put::PutArgs),

    /// Print entry contents
    Cat(cat::CatArgs),

    /// Search entry contents for a literal pattern
    Grep(grep::GrepArgs),

    /// Remove every entry below roots
    Rm(rm::RmArgs),

    /// Create buckets
    Mb(mb::MbArgs),

    /// Remove buckets
    Rb(rb::RbArgs),

    /// Make a destination root match a source root
    Sync(sync::SyncArgs),

    /// Generate shell completion scripts
    Completions(completions::CompletionsArgs),
}

/// Canned access policy for created objects and buckets
#[derive(Args, Debug, Default)]
pub struct AclArgs {
    /// Canned ACL (private, public-read, public-read-write, authenticated-read,
    /// bucket-owner-read, bucket-owner-full-control, log-delivery-write)
    #[arg(long, value_name = "ACL")]
    pub acl: Option<String>,

    /// Shortcut for --acl public-read
    #[arg(short = 'P', long, conflicts_with = "acl")]
    pub public: bool,
}

impl AclArgs {
    /// Validate the requested policy
    pub fn resolve(&self) -> Result<Option<CannedAcl>> {
        if self.public {
            return Ok(Some(CannedAcl::PublicRead));
        }
        self.acl.as_deref().map(str::parse).transpose()
    }
}

/// Everything a command needs for one invocation
#[derive(Clone)]
pub struct Context {
    pub store: Arc<dyn ObjectStore>,
    pub options: RunOptions,
    pub formatter: Formatter,
}

impl Context {
    pub fn new(store: Arc<dyn ObjectStore>, options: RunOptions, formatter: Formatter) -> Self {
        Self {
            store,
            options,
            formatter,
        }
    }

    /// Bind a filesystem to a root locator
    pub fn filesystem(&self, locator: &ParsedPath) -> Filesystem {
        Filesystem::new(locator, Arc::clone(&self.store), &self.options)
    }

    /// Print an error with its root or item prefix
    pub fn report(&self, error: &Error) {
        match error {
            Error::Listing { root, source } => self.formatter.item_error(root, source),
            other => self.formatter.error(&other.to_string()),
        }
    }

    /// Print a failed item before the pool records it
    pub fn item_result<T>(&self, item: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.formatter.item_error(item, e);
        }
        result
    }
}

/// Parse every root locator
pub(crate) fn parse_roots(roots: &[String]) -> Result<Vec<ParsedPath>> {
    roots.iter().map(|root| parse_path(root)).collect()
}

/// Submit every entry of every root to `pool`, in root order
///
/// A failed enumeration is printed against its root and recorded on the pool,
/// which stops the run. Returns the number of submitted entries.
pub(crate) async fn feed(ctx: &Context, roots: &[ParsedPath], pool: &WorkerPool<File>) -> usize {
    let mut submitted = 0;
    for root in roots {
        let mut listing = ctx.filesystem(root).files();
        while let Some(file) = listing.next().await {
            if !pool.submit(file).await {
                return submitted;
            }
            submitted += 1;
        }
        if let Some(e) = listing.take_error() {
            ctx.report(&e);
            pool.fail(e);
            return submitted;
        }
    }
    submitted
}

/// Output settings from flags, strengthened by configured defaults
pub fn output_config(cli: &Cli, defaults: &Defaults) -> OutputConfig {
    OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        no_progress: cli.no_progress,
        quiet: cli.quiet,
    }
    .with_defaults(defaults)
}

/// Build the run options; rejects bad values before any I/O
pub fn run_options(cli: &Cli, config: &Config) -> Result<RunOptions> {
    let parallel = cli.parallel.unwrap_or(config.defaults.parallel);
    if parallel == 0 {
        return Err(Error::Config("--parallel must be at least 1".into()));
    }

    let (acl, delete_extraneous) = match &cli.command {
        Commands::Put(args) => (args.acl.resolve()?, false),
        Commands::Mb(args) => (args.acl.resolve()?, false),
        Commands::Sync(args) => (args.acl.resolve()?, args.delete),
        _ => (None, false),
    };

    Ok(RunOptions {
        parallel,
        queue_capacity: config.defaults.queue_capacity,
        dry_run: cli.dry_run,
        quiet: cli.quiet,
        error_policy: if cli.ignore_errors {
            ErrorPolicy::Ignore
        } else {
            ErrorPolicy::Fail
        },
        delete_extraneous,
        acl: acl.or(config.defaults.acl),
    })
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli) -> ExitCode {
    let config = match ConfigManager::new().and_then(|manager| manager.load()) {
        Ok(config) => config,
        Err(e) => {
            Formatter::new(output_config(&cli, &Defaults::default()))
                .error(&format!("Failed to load configuration: {e}"));
            return ExitCode::from_error(&e);
        }
    };

    let formatter = Formatter::new(output_config(&cli, &config.defaults));
    if config.defaults.color == "always" && !cli.no_color {
        console::set_colors_enabled(true);
    }

    if let Commands::Completions(args) = &cli.command {
        return completions::execute(args);
    }

    let options = match run_options(&cli, &config) {
        Ok(options) => options,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };

    let region = config.s3.resolve_region(cli.region.as_deref());
    let store = match S3Client::new(&config.s3, region).await {
        Ok(client) => client,
        Err(e) => {
            formatter.error(&format!("Failed to create S3 client: {e}"));
            return ExitCode::from_error(&e);
        }
    };

    dispatch(cli.command, Context::new(Arc::new(store), options, formatter)).await
}

/// Execute against an explicit object store
pub async fn execute_with(
    cli: Cli,
    store: Arc<dyn ObjectStore>,
    config: &Config,
    formatter: Formatter,
) -> ExitCode {
    let options = match run_options(&cli, config) {
        Ok(options) => options,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };
    dispatch(cli.command, Context::new(store, options, formatter)).await
}

async fn dispatch(command: Commands, ctx: Context) -> ExitCode {
    match command {
        Commands::Ls(args) => ls::execute(args, &ctx).await,
        Commands::Get(args) => get::execute(args, &ctx).await,
        Commands::Put(args) => put::execute(args, &ctx).await,
        Commands::Cat(args) => cat::execute(args, &ctx).await,
        Commands::Grep(args) => grep::execute(args, &ctx).await,
        Commands::Rm(args) => rm::execute(args, &ctx).await,
        Commands::Mb(args) => mb::execute(args, &ctx).await,
        Commands::Rb(args) => rb::execute(args, &ctx).await,
        Commands::Sync(args) => sync::execute(args, &ctx).await,
        Commands::Completions(args) => completions::execute(&args),
    }
}
