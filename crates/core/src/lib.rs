//! s3k-core: Core library for the s3knife CLI
//!
//! This crate provides the SDK-independent parts of s3knife:
//! - File and Filesystem abstraction over local trees and remote prefixes
//! - Ordered merge-diff between two listings
//! - Bounded worker pool with first-error aggregation
//! - Batched bulk deletion and streaming literal search
//! - Locator parsing, configuration and the ObjectStore collaborator trait
//!
//! The object store is reached only through `ObjectStore`, so everything here
//! runs against the in-memory store in tests.

pub mod batch;
pub mod config;
pub mod diff;
pub mod error;
pub mod file;
pub mod fs;
pub mod memory;
pub mod options;
pub mod path;
pub mod pool;
pub mod search;
pub mod summary;
pub mod traits;

pub use batch::{BatchDeleter, BatchReport, MAX_BATCH};
pub use config::{Config, ConfigManager, S3Settings};
pub use diff::{Action, ActionKind, MergeDiff};
pub use error::{Error, Result};
pub use file::{File, Fingerprint};
pub use fs::{Filesystem, Listing};
pub use memory::MemoryStore;
pub use options::{CannedAcl, ErrorPolicy, RunOptions};
pub use path::{parse_bucket, parse_path, ParsedPath, RemotePath};
pub use pool::{PoolOptions, PoolOutcome, WorkerPool};
pub use search::{Pattern, SearchMode, SearchResult};
pub use summary::{Summary, Tally};
pub use traits::{BucketInfo, ObjectInfo, ObjectStore};
