//! Per-invocation run options
//!
//! Every knob a command needs is carried in one `RunOptions` value that is
//! built once from flags and configuration and passed down explicitly.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::pool::{DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS};

/// Canned access policy applied to created objects and buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CannedAcl {
    Private,
    PublicRead,
    PublicReadWrite,
    AuthenticatedRead,
    BucketOwnerRead,
    BucketOwnerFullControl,
    LogDeliveryWrite,
}

impl CannedAcl {
    pub const ALL: [CannedAcl; 7] = [
        CannedAcl::Private,
        CannedAcl::PublicRead,
        CannedAcl::PublicReadWrite,
        CannedAcl::AuthenticatedRead,
        CannedAcl::BucketOwnerRead,
        CannedAcl::BucketOwnerFullControl,
        CannedAcl::LogDeliveryWrite,
    ];

    /// Wire name of the policy
    pub const fn as_str(self) -> &'static str {
        match self {
            CannedAcl::Private => "private",
            CannedAcl::PublicRead => "public-read",
            CannedAcl::PublicReadWrite => "public-read-write",
            CannedAcl::AuthenticatedRead => "authenticated-read",
            CannedAcl::BucketOwnerRead => "bucket-owner-read",
            CannedAcl::BucketOwnerFullControl => "bucket-owner-full-control",
            CannedAcl::LogDeliveryWrite => "log-delivery-write",
        }
    }
}

impl FromStr for CannedAcl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CannedAcl::ALL
            .into_iter()
            .find(|acl| acl.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = CannedAcl::ALL.iter().map(|a| a.as_str()).collect();
                Error::Config(format!(
                    "acl should be one of: {}, got '{s}'",
                    valid.join(", ")
                ))
            })
    }
}

impl std::fmt::Display for CannedAcl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a bulk operation does when one item fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Record the first error, stop feeding new work and exit non-zero
    #[default]
    Fail,
    /// Print the error and keep going
    Ignore,
}

/// Options threaded through one command invocation
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Number of concurrent workers
    pub parallel: usize,
    /// Bounded queue capacity between producer and workers
    pub queue_capacity: usize,
    /// Report what would happen, skip every mutating call
    pub dry_run: bool,
    /// Suppress per-item progress lines
    pub quiet: bool,
    pub error_policy: ErrorPolicy,
    /// Remove destination entries missing from the source (sync)
    pub delete_extraneous: bool,
    /// Access policy for created objects
    pub acl: Option<CannedAcl>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            parallel: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            dry_run: false,
            quiet: false,
            error_policy: ErrorPolicy::Fail,
            delete_extraneous: false,
            acl: None,
        }
    }
}
