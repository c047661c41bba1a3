//! File entries produced by a Filesystem listing
//!
//! A `File` is either a local file or a remote object. Both expose the same
//! capabilities: relative path, size, content fingerprint, a read stream,
//! self-deletion and a display string.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_compression::tokio::bufread::GzipDecoder;
use md5::{Digest, Md5};
use tokio::io::{AsyncReadExt, BufReader};
use tokio::sync::OnceCell;

use crate::error::Result;
use crate::path::REMOTE_SCHEME;
use crate::traits::{ByteReader, ObjectStore};

const HASH_CHUNK: usize = 64 * 1024;

/// 128-bit content fingerprint (MD5)
///
/// Remote entries take it from the ETag, local entries hash their content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(Vec<u8>);

impl Fingerprint {
    pub fn from_digest(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Derive a fingerprint from an ETag
    ///
    /// Single-part ETags are the hex MD5 of the content. Multipart ETags
    /// (`<hex>-<parts>`) are kept verbatim and never equal a real digest.
    pub fn from_etag(etag: &str) -> Self {
        let etag = etag.trim_matches('"');
        match hex::decode(etag) {
            Ok(bytes) => Self(bytes),
            Err(_) => Self(etag.as_bytes().to_vec()),
        }
    }

    /// Fingerprint of an in-memory buffer
    pub fn of(data: &[u8]) -> Self {
        Self(Md5::digest(data).to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

/// A plain file below a local root
#[derive(Debug, Clone)]
pub struct LocalFile {
    full_path: PathBuf,
    relative: String,
    size: u64,
    modified: Option<jiff::Timestamp>,
    hash: Arc<OnceCell<Fingerprint>>,
}

impl LocalFile {
    pub fn new(
        full_path: impl Into<PathBuf>,
        relative: impl Into<String>,
        size: u64,
        modified: Option<jiff::Timestamp>,
    ) -> Self {
        Self {
            full_path: full_path.into(),
            relative: relative.into(),
            size,
            modified,
            hash: Arc::new(OnceCell::new()),
        }
    }

    pub fn full_path(&self) -> &Path {
        &self.full_path
    }

    async fn compute_hash(&self) -> Result<Fingerprint> {
        let mut file = tokio::fs::File::open(&self.full_path).await?;
        let mut hasher = Md5::new();
        let mut buf = vec![0u8; HASH_CHUNK];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(Fingerprint(hasher.finalize().to_vec()))
    }
}

/// An object below a remote prefix
#[derive(Clone)]
pub struct RemoteFile {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    key: String,
    relative: String,
    size: u64,
    etag: Option<String>,
    storage_class: Option<String>,
    modified: Option<jiff::Timestamp>,
}

impl RemoteFile {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        key: impl Into<String>,
        relative: impl Into<String>,
        size: u64,
        etag: Option<String>,
        storage_class: Option<String>,
        modified: Option<jiff::Timestamp>,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            key: key.into(),
            relative: relative.into(),
            size,
            etag,
            storage_class,
            modified,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn storage_class(&self) -> Option<&str> {
        self.storage_class.as_deref()
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }
}

impl std::fmt::Debug for RemoteFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFile")
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .field("relative", &self.relative)
            .field("size", &self.size)
            .field("etag", &self.etag)
            .finish_non_exhaustive()
    }
}

/// One entry of a Filesystem listing
#[derive(Debug, Clone)]
pub enum File {
    Local(LocalFile),
    Remote(RemoteFile),
}

impl File {
    /// Path relative to the listing root, always `/`-separated
    pub fn relative(&self) -> &str {
        match self {
            File::Local(f) => &f.relative,
            File::Remote(f) => &f.relative,
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            File::Local(f) => f.size,
            File::Remote(f) => f.size,
        }
    }

    pub fn modified(&self) -> Option<jiff::Timestamp> {
        match self {
            File::Local(f) => f.modified,
            File::Remote(f) => f.modified,
        }
    }

    /// Remote directory markers: a zero-byte key ending in `/`
    pub fn is_directory(&self) -> bool {
        match self {
            File::Local(_) => false,
            File::Remote(f) => f.key.ends_with('/') && f.size == 0,
        }
    }

    /// Content fingerprint, computed on first use and cached
    pub async fn content_hash(&self) -> Result<Fingerprint> {
        match self {
            File::Local(f) => f
                .hash
                .get_or_try_init(|| f.compute_hash())
                .await
                .cloned(),
            File::Remote(f) => Ok(f
                .etag
                .as_deref()
                .map(Fingerprint::from_etag)
                .unwrap_or_else(|| Fingerprint(Vec::new()))),
        }
    }

    /// Open a fresh sequential read stream over the content
    pub async fn open(&self) -> Result<ByteReader> {
        match self {
            File::Local(f) => {
                let file = tokio::fs::File::open(&f.full_path).await?;
                Ok(Box::pin(file))
            }
            File::Remote(f) => Ok(f.store.get_object(&f.bucket, &f.key).await?.reader),
        }
    }

    /// Open the content, transparently gunzipping `.gz` entries
    pub async fn open_decoded(&self) -> Result<ByteReader> {
        let reader = self.open().await?;
        if self.is_gzip() {
            Ok(Box::pin(GzipDecoder::new(BufReader::new(reader))))
        } else {
            Ok(reader)
        }
    }

    pub fn is_gzip(&self) -> bool {
        self.relative().ends_with(".gz")
    }

    /// Delete the entry from its own filesystem
    pub async fn delete(&self) -> Result<()> {
        match self {
            File::Local(f) => Ok(tokio::fs::remove_file(&f.full_path).await?),
            File::Remote(f) => f.store.delete_object(&f.bucket, &f.key).await,
        }
    }
}

impl std::fmt::Display for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            File::Local(file) => write!(f, "{}", file.full_path.display()),
            File::Remote(file) => write!(f, "{REMOTE_SCHEME}{}/{}", file.bucket, file.key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use tempfile::TempDir;

    #[test]
    fn test_fingerprint_from_plain_etag() {
        let fp = Fingerprint::from_etag("\"828ef3fdfa96f00ad9f27c383fc9ac7f\"");
        assert_eq!(fp.as_bytes().len(), 16);
        assert_eq!(fp.to_hex(), "828ef3fdfa96f00ad9f27c383fc9ac7f");
    }

    #[test]
    fn test_fingerprint_from_multipart_etag() {
        let fp = Fingerprint::from_etag("d41d8cd98f00b204e9800998ecf8427e-3");
        assert_ne!(fp.as_bytes().len(), 16);
        assert_ne!(fp, Fingerprint::of(b""));
    }

    #[tokio::test]
    async fn test_local_and_remote_fingerprints_agree() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"hello world").unwrap();
        let local = File::Local(LocalFile::new(&path, "hello.txt", 11, None));

        let store = Arc::new(MemoryStore::new());
        store.insert("bucket", "hello.txt", b"hello world".to_vec());
        let info = store.object_info("bucket", "hello.txt").unwrap();
        let store: Arc<dyn ObjectStore> = store;
        let remote = File::Remote(RemoteFile::new(
            store,
            "bucket",
            "hello.txt",
            "hello.txt",
            info.size,
            info.etag,
            None,
            None,
        ));

        assert_eq!(
            local.content_hash().await.unwrap(),
            remote.content_hash().await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_local_hash_is_cached_across_clones() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a");
        std::fs::write(&path, b"one").unwrap();
        let file = File::Local(LocalFile::new(&path, "a", 3, None));
        let first = file.content_hash().await.unwrap();

        std::fs::write(&path, b"two").unwrap();
        let clone = file.clone();
        assert_eq!(clone.content_hash().await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_open_reads_content_repeatedly() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"abc").unwrap();
        let file = File::Local(LocalFile::new(&path, "data.bin", 3, None));

        for _ in 0..2 {
            let mut out = Vec::new();
            file.open().await.unwrap().read_to_end(&mut out).await.unwrap();
            assert_eq!(out, b"abc");
        }
    }

    #[test]
    fn test_directory_marker() {
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        let marker = File::Remote(RemoteFile::new(
            store.clone(),
            "b",
            "dir/",
            "dir/",
            0,
            None,
            None,
            None,
        ));
        assert!(marker.is_directory());
        assert_eq!(marker.to_string(), "s3://b/dir/");

        let object = File::Remote(RemoteFile::new(store, "b", "dir/x", "x", 0, None, None, None));
        assert!(!object.is_directory());
    }
}
