use std::sync::Arc;

use crate::error::Result;
use crate::file::{File, RemoteFile};
use crate::fs::{Listing, ListingSender};
use crate::options::CannedAcl;
use crate::path::RemotePath;
use crate::traits::{ObjectInfo, ObjectStore, PutObjectRequest};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// All objects below a bucket prefix
#[derive(Clone)]
pub struct RemoteFilesystem {
    store: Arc<dyn ObjectStore>,
    root: RemotePath,
    acl: Option<CannedAcl>,
    buffer: usize,
}

impl std::fmt::Debug for RemoteFilesystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFilesystem")
            .field("root", &self.root)
            .field("acl", &self.acl)
            .finish_non_exhaustive()
    }
}

impl RemoteFilesystem {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        root: RemotePath,
        acl: Option<CannedAcl>,
        buffer: usize,
    ) -> Self {
        Self {
            store,
            root,
            acl,
            buffer,
        }
    }

    pub fn root(&self) -> &RemotePath {
        &self.root
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Page through the prefix on a background task
    ///
    /// The store returns keys in ascending order, so entries need no sorting.
    pub fn files(&self) -> Listing {
        let (tx, listing) = Listing::channel(self.root.to_string(), self.buffer);
        let store = Arc::clone(&self.store);
        let root = self.root.clone();
        tokio::spawn(async move {
            if let Err(e) = produce(&store, &root, &tx).await {
                tx.fail(e);
            }
        });
        listing
    }

    pub async fn create(&self, source: &File) -> Result<u64> {
        let key = self.root.join(source.relative());
        let size = source.size();

        let (body, content_type, storage_class) = match source {
            File::Remote(remote) => {
                // Pass media metadata through object-to-object copies
                let body = remote.store().get_object(remote.bucket(), remote.key()).await?;
                let storage_class = body
                    .storage_class
                    .or_else(|| remote.storage_class().map(str::to_string));
                (body.reader, body.content_type, storage_class)
            }
            File::Local(_) => {
                let content_type = mime_guess::from_path(source.relative())
                    .first_raw()
                    .unwrap_or(DEFAULT_CONTENT_TYPE)
                    .to_string();
                (source.open().await?, Some(content_type), None)
            }
        };

        self.store
            .put_object(PutObjectRequest {
                bucket: self.root.bucket.clone(),
                key,
                body,
                size,
                content_type,
                storage_class,
                acl: self.acl,
            })
            .await?;
        Ok(size)
    }

    pub async fn delete(&self, relative: &str) -> Result<()> {
        self.store
            .delete_object(&self.root.bucket, &self.root.join(relative))
            .await
    }
}

async fn produce(store: &Arc<dyn ObjectStore>, root: &RemotePath, tx: &ListingSender) -> Result<()> {
    let mut token = None;
    let mut sent = 0usize;
    // Key equal to a prefix without a trailing `/`: the root may name one object
    let mut exact: Option<ObjectInfo> = None;

    loop {
        let page = store.list_objects(&root.bucket, &root.key, token).await?;
        tracing::debug!(
            root = %root,
            objects = page.objects.len(),
            truncated = page.truncated,
            "Listed page"
        );

        for info in page.objects {
            let relative = match root.relative(&info.key).map(str::to_string) {
                None => continue,
                Some(relative) if relative.is_empty() => {
                    // A marker for the prefix itself is not an entry
                    if !info.key.ends_with('/') {
                        exact = Some(info);
                    }
                    continue;
                }
                Some(relative) => relative,
            };
            sent += 1;
            if !tx.send(entry(store, root, info, relative)).await {
                return Ok(());
            }
        }

        if !page.truncated {
            break;
        }
        match page.continuation_token {
            Some(next) => token = Some(next),
            None => {
                tracing::warn!(root = %root, "Listing truncated without a continuation token");
                break;
            }
        }
    }

    if sent == 0
        && let Some(info) = exact
        && let Some(name) = file_name(&info.key)
    {
        tx.send(entry(store, root, info, name)).await;
    }
    Ok(())
}

fn entry(store: &Arc<dyn ObjectStore>, root: &RemotePath, info: ObjectInfo, relative: String) -> File {
    File::Remote(RemoteFile::new(
        Arc::clone(store),
        root.bucket.clone(),
        info.key,
        relative,
        info.size,
        info.etag,
        info.storage_class,
        info.last_modified,
    ))
}

/// Last segment of a key that names a single object
fn file_name(key: &str) -> Option<String> {
    key.rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::file::LocalFile;
    use crate::memory::MemoryStore;
    use crate::traits::{ListPage, MockObjectStore};
    use tempfile::TempDir;

    fn remote(store: Arc<MemoryStore>, bucket: &str, prefix: &str) -> RemoteFilesystem {
        RemoteFilesystem::new(store, RemotePath::new(bucket, prefix), None, 4)
    }

    #[tokio::test]
    async fn test_listing_flattens_pages() {
        let store = Arc::new(MemoryStore::new().with_page_size(2));
        for key in ["data/a", "data/b", "data/c/d", "data/e", "data/f", "other"] {
            store.insert("bucket", key, "x");
        }

        let files = remote(Arc::clone(&store), "bucket", "data/")
            .files()
            .collect()
            .await
            .unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.relative()).collect();
        assert_eq!(names, vec!["a", "b", "c/d", "e", "f"]);
        assert_eq!(store.list_calls(), 3);
    }

    #[tokio::test]
    async fn test_empty_prefix_lists_nothing() {
        let store = Arc::new(MemoryStore::new());
        store.add_bucket("bucket");
        let files = remote(store, "bucket", "").files().collect().await.unwrap();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_listing_error_surfaces_after_stream() {
        let mut mock = MockObjectStore::new();
        let mut calls = 0;
        mock.expect_list_objects().returning(move |_, _, _| {
            calls += 1;
            if calls == 1 {
                Ok(ListPage {
                    objects: vec![ObjectInfo::new("a", 1)],
                    truncated: true,
                    continuation_token: Some("a".into()),
                })
            } else {
                Err(Error::Network("connection reset".into()))
            }
        });

        let fs = RemoteFilesystem::new(Arc::new(mock), RemotePath::new("b", ""), None, 4);
        let mut listing = fs.files();
        assert_eq!(listing.next().await.unwrap().relative(), "a");
        assert!(listing.next().await.is_none());
        assert!(matches!(listing.take_error(), Some(Error::Listing { .. })));
    }

    #[tokio::test]
    async fn test_create_from_local_guesses_content_type() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.html");
        std::fs::write(&path, "<p>hi</p>").unwrap();
        let source = File::Local(LocalFile::new(&path, "site/index.html", 9, None));

        let store = Arc::new(MemoryStore::new());
        store.add_bucket("web");
        let fs = RemoteFilesystem::new(
            store.clone(),
            RemotePath::new("web", "public"),
            Some(CannedAcl::PublicRead),
            4,
        );

        assert_eq!(fs.create(&source).await.unwrap(), 9);
        let stored = store.object("web", "public/site/index.html").unwrap();
        assert_eq!(stored.data, b"<p>hi</p>");
        assert_eq!(stored.content_type.as_deref(), Some("text/html"));
        assert_eq!(stored.acl, Some(CannedAcl::PublicRead));
    }

    #[tokio::test]
    async fn test_create_from_remote_passes_metadata_through() {
        let store = Arc::new(MemoryStore::new());
        store.add_bucket("src");
        store.add_bucket("dst");
        store
            .put_object(PutObjectRequest {
                bucket: "src".into(),
                key: "blob".into(),
                body: Box::pin(std::io::Cursor::new(b"abc".to_vec())),
                size: 3,
                content_type: Some("image/x-custom".into()),
                storage_class: Some("STANDARD_IA".into()),
                acl: None,
            })
            .await
            .unwrap();

        let source = remote(Arc::clone(&store), "src", "")
            .files()
            .collect()
            .await
            .unwrap()
            .remove(0);
        remote(Arc::clone(&store), "dst", "copy/")
            .create(&source)
            .await
            .unwrap();

        let stored = store.object("dst", "copy/blob").unwrap();
        assert_eq!(stored.content_type.as_deref(), Some("image/x-custom"));
        assert_eq!(stored.storage_class.as_deref(), Some("STANDARD_IA"));
    }

    async fn relatives(store: &Arc<MemoryStore>, bucket: &str, prefix: &str) -> Vec<String> {
        remote(Arc::clone(store), bucket, prefix)
            .files()
            .collect()
            .await
            .unwrap()
            .iter()
            .map(|f| f.relative().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_prefix_marker_is_skipped_and_order_kept() {
        let store = Arc::new(MemoryStore::new());
        for key in ["x/", "x/a", "x/b/", "x/b/c"] {
            store.insert("b", key, if key.ends_with('/') { "" } else { "1" });
        }
        assert_eq!(relatives(&store, "b", "x/").await, vec!["a", "b/", "b/c"]);
    }

    #[tokio::test]
    async fn test_prefix_without_slash_keeps_key_order() {
        let store = Arc::new(MemoryStore::new());
        for key in ["data/z", "data0", "datum"] {
            store.insert("b", key, "1");
        }
        let names = relatives(&store, "b", "data").await;
        assert_eq!(names, vec!["/z", "0"]);
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[tokio::test]
    async fn test_single_object_root_uses_file_name() {
        let store = Arc::new(MemoryStore::new());
        store.insert("b", "logs/today.gz", "x");
        store.insert("b", "other", "y");
        assert_eq!(relatives(&store, "b", "logs/today.gz").await, vec!["today.gz"]);

        store.insert("b", "logs/today.gz.1", "z");
        assert_eq!(relatives(&store, "b", "logs/today.gz").await, vec![".1"]);
    }
}
