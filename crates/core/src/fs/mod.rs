//! Filesystem abstraction over local directories and remote prefixes
//!
//! A `Filesystem` is bound to one root. Its listing runs on a background
//! producer feeding a bounded channel and always yields entries in ascending
//! byte order of their relative path. Enumeration failures are stored on the
//! `Listing` and must be checked once the stream ends.

mod local;
mod remote;

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

pub use local::LocalFilesystem;
pub use remote::RemoteFilesystem;

use crate::error::{Error, Result};
use crate::file::File;
use crate::options::RunOptions;
use crate::path::ParsedPath;
use crate::traits::ObjectStore;

/// Lazy, single-pass, ordered stream of entries
#[derive(Debug)]
pub struct Listing {
    root: String,
    rx: mpsc::Receiver<File>,
    error: Arc<Mutex<Option<Error>>>,
}

impl Listing {
    /// Create a listing and the producer half feeding it
    pub(crate) fn channel(root: impl Into<String>, capacity: usize) -> (ListingSender, Listing) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let error = Arc::new(Mutex::new(None));
        let sender = ListingSender {
            tx,
            error: Arc::clone(&error),
        };
        let listing = Listing {
            root: root.into(),
            rx,
            error,
        };
        (sender, listing)
    }

    /// Next entry, or None once the producer is done
    pub async fn next(&mut self) -> Option<File> {
        self.rx.recv().await
    }

    /// Display string of the listed root
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Whether the producer recorded a failure so far
    pub fn has_error(&self) -> bool {
        self.lock_error().is_some()
    }

    /// Take the enumeration failure, if any
    ///
    /// Only conclusive after `next` returned None.
    pub fn take_error(&self) -> Option<Error> {
        self.lock_error()
            .take()
            .map(|e| Error::listing(self.root.clone(), e))
    }

    /// Drain the whole listing, failing on an enumeration error
    pub async fn collect(mut self) -> Result<Vec<File>> {
        let mut files = Vec::new();
        while let Some(file) = self.next().await {
            files.push(file);
        }
        match self.take_error() {
            Some(e) => Err(e),
            None => Ok(files),
        }
    }

    fn lock_error(&self) -> std::sync::MutexGuard<'_, Option<Error>> {
        self.error.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Producer half of a `Listing`
pub(crate) struct ListingSender {
    tx: mpsc::Sender<File>,
    error: Arc<Mutex<Option<Error>>>,
}

impl ListingSender {
    /// Push an entry; false when the consumer went away
    pub(crate) async fn send(&self, file: File) -> bool {
        self.tx.send(file).await.is_ok()
    }

    /// Push from a blocking thread
    pub(crate) fn blocking_send(&self, file: File) -> bool {
        self.tx.blocking_send(file).is_ok()
    }

    /// Record the failure; the consumer sees it after the stream closes
    pub(crate) fn fail(self, error: Error) {
        *self.error.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }
}

/// One root, local or remote
#[derive(Debug, Clone)]
pub enum Filesystem {
    Local(LocalFilesystem),
    Remote(RemoteFilesystem),
}

impl Filesystem {
    /// Bind a filesystem to a parsed root locator
    pub fn new(locator: &ParsedPath, store: Arc<dyn ObjectStore>, options: &RunOptions) -> Self {
        match locator {
            ParsedPath::Local(path) => {
                Filesystem::Local(LocalFilesystem::new(path.clone(), options.queue_capacity))
            }
            ParsedPath::Remote(remote) => Filesystem::Remote(RemoteFilesystem::new(
                store,
                remote.clone(),
                options.acl,
                options.queue_capacity,
            )),
        }
    }

    /// Start listing every entry below the root
    pub fn files(&self) -> Listing {
        match self {
            Filesystem::Local(fs) => fs.files(),
            Filesystem::Remote(fs) => fs.files(),
        }
    }

    /// Write `source` at its relative path below this root, returning the bytes written
    pub async fn create(&self, source: &File) -> Result<u64> {
        match self {
            Filesystem::Local(fs) => fs.create(source).await,
            Filesystem::Remote(fs) => fs.create(source).await,
        }
    }

    /// Remove the entry at `relative`
    pub async fn delete(&self, relative: &str) -> Result<()> {
        match self {
            Filesystem::Local(fs) => fs.delete(relative).await,
            Filesystem::Remote(fs) => fs.delete(relative).await,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Filesystem::Remote(_))
    }
}

impl std::fmt::Display for Filesystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Filesystem::Local(fs) => write!(f, "{}", fs.root().display()),
            Filesystem::Remote(fs) => write!(f, "{}", fs.root()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::LocalFile;

    #[tokio::test]
    async fn test_listing_reports_error_after_stream_ends() {
        let (tx, mut listing) = Listing::channel("s3://b/", 4);
        tokio::spawn(async move {
            tx.send(File::Local(LocalFile::new("/x/a", "a", 1, None))).await;
            tx.fail(Error::Network("connection reset".into()));
        });

        assert_eq!(listing.next().await.unwrap().relative(), "a");
        assert!(listing.next().await.is_none());
        let err = listing.take_error().unwrap();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("s3://b/"));
        assert!(listing.take_error().is_none());
    }

    #[tokio::test]
    async fn test_collect_surfaces_error() {
        let (tx, listing) = Listing::channel("root", 1);
        tx.fail(Error::Auth("denied".into()));
        assert!(listing.collect().await.is_err());
    }
}
