//! In-memory object store
//!
//! A complete `ObjectStore` over ordered maps. Listings paginate exactly like
//! a real store, ETags are content MD5s, and bulk-delete calls are counted.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;

use crate::error::{Error, Result};
use crate::file::Fingerprint;
use crate::options::CannedAcl;
use crate::traits::{
    BucketInfo, DeleteReport, ListPage, ObjectBody, ObjectInfo, ObjectStore, PutObjectRequest,
};

/// Default number of keys per listing page, as on S3
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// A stored object
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
    pub storage_class: Option<String>,
    pub acl: Option<CannedAcl>,
}

type Buckets = BTreeMap<String, BTreeMap<String, StoredObject>>;

/// Thread-safe in-memory store
#[derive(Debug)]
pub struct MemoryStore {
    buckets: Mutex<Buckets>,
    page_size: usize,
    batch_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(BTreeMap::new()),
            page_size: DEFAULT_PAGE_SIZE,
            batch_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
        }
    }

    /// Use a smaller page size to exercise pagination
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Buckets> {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create an empty bucket if missing
    pub fn add_bucket(&self, bucket: &str) {
        self.lock().entry(bucket.to_string()).or_default();
    }

    /// Store an object, creating the bucket if needed
    pub fn insert(&self, bucket: &str, key: &str, data: impl Into<Vec<u8>>) {
        self.lock().entry(bucket.to_string()).or_default().insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                content_type: None,
                storage_class: None,
                acl: None,
            },
        );
    }

    /// Fetch a stored object
    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.lock().get(bucket)?.get(key).cloned()
    }

    /// Listing metadata of a stored object
    pub fn object_info(&self, bucket: &str, key: &str) -> Option<ObjectInfo> {
        self.object(bucket, key).map(|obj| info_for(key, &obj))
    }

    /// All keys of a bucket in order
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.lock()
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.lock().contains_key(bucket)
    }

    /// Number of delete_objects calls served
    pub fn batch_delete_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    /// Number of list_objects pages served
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

fn info_for(key: &str, obj: &StoredObject) -> ObjectInfo {
    let mut info = ObjectInfo::new(key, obj.data.len() as u64);
    info.etag = Some(Fingerprint::of(&obj.data).to_hex());
    info.storage_class = obj.storage_class.clone();
    info
}

fn no_such_bucket(bucket: &str) -> Error {
    Error::NotFound(format!("Bucket not found: {bucket}"))
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>> {
        Ok(self
            .lock()
            .keys()
            .map(|name| BucketInfo {
                name: name.clone(),
                created: None,
            })
            .collect())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<ListPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let buckets = self.lock();
        let objects = buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;

        let mut matching = objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| {
                continuation_token
                    .as_deref()
                    .is_none_or(|token| key.as_str() > token)
            });

        let page: Vec<ObjectInfo> = matching
            .by_ref()
            .take(self.page_size)
            .map(|(key, obj)| info_for(key, obj))
            .collect();
        let truncated = matching.next().is_some();
        let continuation_token = if truncated {
            page.last().map(|info| info.key.clone())
        } else {
            None
        };

        Ok(ListPage {
            objects: page,
            truncated,
            continuation_token,
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody> {
        let obj = self
            .lock()
            .get(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("s3://{bucket}/{key}")))?;

        Ok(ObjectBody {
            reader: Box::pin(std::io::Cursor::new(obj.data)),
            content_type: obj.content_type,
            storage_class: obj.storage_class,
        })
    }

    async fn put_object(&self, request: PutObjectRequest) -> Result<()> {
        let PutObjectRequest {
            bucket,
            key,
            mut body,
            size,
            content_type,
            storage_class,
            acl,
        } = request;

        let mut data = Vec::with_capacity(size as usize);
        body.read_to_end(&mut data).await?;

        let mut buckets = self.lock();
        let objects = buckets
            .get_mut(&bucket)
            .ok_or_else(|| no_such_bucket(&bucket))?;
        objects.insert(
            key,
            StoredObject {
                data,
                content_type,
                storage_class,
                acl,
            },
        );
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        let mut buckets = self.lock();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?;
        // S3 reports success for missing keys
        objects.remove(key);
        Ok(())
    }

    async fn delete_objects(&self, bucket: &str, keys: Vec<String>) -> Result<DeleteReport> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if keys.len() > DEFAULT_PAGE_SIZE {
            return Err(Error::General(format!(
                "delete_objects accepts at most {DEFAULT_PAGE_SIZE} keys, got {}",
                keys.len()
            )));
        }

        let mut buckets = self.lock();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?;
        for key in &keys {
            objects.remove(key);
        }
        Ok(DeleteReport {
            deleted: keys,
            failed: Vec::new(),
        })
    }

    async fn create_bucket(&self, bucket: &str, _acl: Option<CannedAcl>) -> Result<()> {
        let mut buckets = self.lock();
        if buckets.contains_key(bucket) {
            return Err(Error::Conflict(format!("Bucket already exists: {bucket}")));
        }
        buckets.insert(bucket.to_string(), BTreeMap::new());
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        let mut buckets = self.lock();
        match buckets.get(bucket) {
            None => Err(no_such_bucket(bucket)),
            Some(objects) if !objects.is_empty() => {
                Err(Error::Conflict(format!("Bucket not empty: {bucket}")))
            }
            Some(_) => {
                buckets.remove(bucket);
                Ok(())
            }
        }
    }
}
