//! ObjectStore trait definition
//!
//! This trait defines the primitives the sync core needs from an
//! S3-compatible store. It keeps the core decoupled from the SDK, and
//! is implemented by the S3 adapter and by the in-memory store.

use std::pin::Pin;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use crate::error::Result;
use crate::options::CannedAcl;

/// Sequential, closable byte stream (dropping it closes the underlying source)
pub type ByteReader = Pin<Box<dyn AsyncRead + Send>>;

/// Metadata for one object in a listing page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Full object key
    pub key: String,

    /// Size in bytes
    pub size: u64,

    /// ETag as returned by the store, without quotes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    /// Storage class
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,

    /// Last modified timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<jiff::Timestamp>,
}

impl ObjectInfo {
    /// Create a new ObjectInfo for a key of the given size
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            etag: None,
            storage_class: None,
            last_modified: None,
        }
    }
}

/// Bucket entry returned by list_buckets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<jiff::Timestamp>,
}

/// One page of a prefix listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListPage {
    /// Objects in ascending key order
    pub objects: Vec<ObjectInfo>,

    /// Whether more pages follow
    pub truncated: bool,

    /// Continuation token for the next page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
}

/// Content and media metadata of a fetched object
pub struct ObjectBody {
    pub reader: ByteReader,
    pub content_type: Option<String>,
    pub storage_class: Option<String>,
}

impl std::fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBody")
            .field("content_type", &self.content_type)
            .field("storage_class", &self.storage_class)
            .finish_non_exhaustive()
    }
}

/// Everything needed to upload one object
pub struct PutObjectRequest {
    pub bucket: String,
    pub key: String,
    pub body: ByteReader,
    /// Exact number of bytes `body` yields
    pub size: u64,
    pub content_type: Option<String>,
    pub storage_class: Option<String>,
    pub acl: Option<CannedAcl>,
}

impl std::fmt::Debug for PutObjectRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PutObjectRequest")
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .field("size", &self.size)
            .field("content_type", &self.content_type)
            .field("storage_class", &self.storage_class)
            .field("acl", &self.acl)
            .finish_non_exhaustive()
    }
}

/// Outcome of a bulk delete call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    /// Keys the store confirmed as deleted
    pub deleted: Vec<String>,
    /// Keys the store refused, with its message
    pub failed: Vec<(String, String)>,
}

/// Trait for S3-compatible storage operations
///
/// This trait is implemented by the S3 adapter and can be mocked for testing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List buckets
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>>;

    /// List one page of objects under `prefix`, recursively
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<ListPage>;

    /// Open an object for sequential reading
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody>;

    /// Upload an object, replacing any existing one
    async fn put_object(&self, request: PutObjectRequest) -> Result<()>;

    /// Delete a single object
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;

    /// Delete up to 1000 objects in one call
    async fn delete_objects(&self, bucket: &str, keys: Vec<String>) -> Result<DeleteReport>;

    /// Create a bucket
    async fn create_bucket(&self, bucket: &str, acl: Option<CannedAcl>) -> Result<()>;

    /// Delete a bucket
    async fn delete_bucket(&self, bucket: &str) -> Result<()>;
}
