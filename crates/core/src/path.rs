//! Root locator parsing
//!
//! Handles parsing of root locators in the format: s3://bucket[/prefix]
//! Anything else is a local path and is passed through as-is.

use std::path::PathBuf;

use crate::error::{Error, Result};

/// Scheme marking a remote locator
pub const REMOTE_SCHEME: &str = "s3://";

/// A parsed remote path pointing to an S3 location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePath {
    /// Bucket name
    pub bucket: String,
    /// Key prefix (empty for bucket root)
    pub key: String,
}

impl RemotePath {
    /// Create a new RemotePath
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Whether the path addresses the whole bucket
    pub fn is_bucket_root(&self) -> bool {
        self.key.is_empty()
    }

    /// Key of a child entry given its path relative to this prefix
    pub fn join(&self, relative: &str) -> String {
        let relative = relative.trim_start_matches('/');
        if self.key.is_empty() {
            relative.to_string()
        } else if self.key.ends_with('/') {
            format!("{}{relative}", self.key)
        } else {
            format!("{}/{relative}", self.key)
        }
    }

    /// Path of `key` relative to this prefix, or None when it lies outside
    ///
    /// The prefix is stripped exactly, so relative paths sort like their keys.
    pub fn relative<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.key.as_str())
    }
}

impl std::fmt::Display for RemotePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{REMOTE_SCHEME}{}/{}", self.bucket, self.key)
    }
}

/// Parsed locator that can be either local or remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedPath {
    /// Local filesystem path
    Local(PathBuf),
    /// Remote S3 path
    Remote(RemotePath),
}

impl ParsedPath {
    /// Check if this is a remote path
    pub fn is_remote(&self) -> bool {
        matches!(self, ParsedPath::Remote(_))
    }

    /// Check if this is a local path
    pub fn is_local(&self) -> bool {
        matches!(self, ParsedPath::Local(_))
    }

    /// Get the remote path if this is a remote path
    pub fn as_remote(&self) -> Option<&RemotePath> {
        match self {
            ParsedPath::Remote(p) => Some(p),
            ParsedPath::Local(_) => None,
        }
    }

    /// Get the local path if this is a local path
    pub fn as_local(&self) -> Option<&PathBuf> {
        match self {
            ParsedPath::Local(p) => Some(p),
            ParsedPath::Remote(_) => None,
        }
    }
}

impl std::fmt::Display for ParsedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParsedPath::Local(p) => write!(f, "{}", p.display()),
            ParsedPath::Remote(r) => write!(f, "{r}"),
        }
    }
}

/// Parse a root locator into a ParsedPath
///
/// Remote locators have the format: s3://bucket[/prefix]
/// Everything else is treated as a local path.
pub fn parse_path(path: &str) -> Result<ParsedPath> {
    if path.is_empty() {
        return Err(Error::InvalidPath("Path cannot be empty".into()));
    }

    let Some(rest) = path.strip_prefix(REMOTE_SCHEME) else {
        return Ok(ParsedPath::Local(PathBuf::from(path)));
    };

    let (bucket, key) = match rest.split_once('/') {
        Some((bucket, key)) => (bucket, key),
        None => (rest, ""),
    };

    validate_bucket(bucket, path)?;
    Ok(ParsedPath::Remote(RemotePath::new(bucket, key)))
}

/// Parse a bucket argument for mb/rb, which also accept a bare bucket name
pub fn parse_bucket(path: &str) -> Result<String> {
    let name = path
        .strip_prefix(REMOTE_SCHEME)
        .unwrap_or(path)
        .trim_end_matches('/');

    if name.contains('/') {
        return Err(Error::InvalidPath(format!(
            "'{path}' names a key, expected s3://bucket"
        )));
    }

    validate_bucket(name, path)?;
    Ok(name.to_string())
}

fn validate_bucket(bucket: &str, path: &str) -> Result<()> {
    if bucket.is_empty() {
        return Err(Error::InvalidPath(format!(
            "Bucket name cannot be empty in '{path}'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_remote_path() {
        let path = parse_path("s3://bucket/dir/file.txt").unwrap();
        assert!(path.is_remote());

        let remote = path.as_remote().unwrap();
        assert_eq!(remote.bucket, "bucket");
        assert_eq!(remote.key, "dir/file.txt");
    }

    #[test]
    fn test_parse_remote_bucket_only() {
        for locator in ["s3://bucket", "s3://bucket/"] {
            let path = parse_path(locator).unwrap();
            let remote = path.as_remote().unwrap();
            assert_eq!(remote.bucket, "bucket");
            assert_eq!(remote.key, "");
            assert!(remote.is_bucket_root());
        }
    }

    #[test]
    fn test_parse_local_paths() {
        for locator in ["/home/user/file.txt", "./data", "../up", "plain", "bucket/key"] {
            let path = parse_path(locator).unwrap();
            assert!(path.is_local(), "{locator} should be local");
        }
    }

    #[test]
    fn test_parse_empty_path() {
        assert!(parse_path("").is_err());
    }

    #[test]
    fn test_parse_empty_bucket() {
        assert!(parse_path("s3://").is_err());
        assert!(parse_path("s3:///key").is_err());
    }

    #[test]
    fn test_remote_path_join() {
        assert_eq!(RemotePath::new("b", "").join("a/b.txt"), "a/b.txt");
        assert_eq!(RemotePath::new("b", "dir/").join("x"), "dir/x");
        assert_eq!(RemotePath::new("b", "dir").join("x"), "dir/x");
        assert_eq!(RemotePath::new("b", "dir").join("/x"), "dir/x");
    }

    #[test]
    fn test_remote_path_relative() {
        let root = RemotePath::new("b", "photos/");
        assert_eq!(root.relative("photos/2024/a.jpg"), Some("2024/a.jpg"));
        assert_eq!(root.relative("videos/a.mp4"), None);

        let root = RemotePath::new("b", "photos");
        assert_eq!(root.relative("photos/a.jpg"), Some("/a.jpg"));
        assert_eq!(root.relative("photos0"), Some("0"));
        assert_eq!(root.relative("photos"), Some(""));
    }

    #[test]
    fn test_remote_path_display() {
        let path = RemotePath::new("bucket", "key/file.txt");
        assert_eq!(path.to_string(), "s3://bucket/key/file.txt");
        assert_eq!(RemotePath::new("bucket", "").to_string(), "s3://bucket/");
    }

    #[test]
    fn test_parse_bucket() {
        assert_eq!(parse_bucket("s3://photos/").unwrap(), "photos");
        assert_eq!(parse_bucket("photos").unwrap(), "photos");
        assert!(parse_bucket("s3://photos/key").is_err());
        assert!(parse_bucket("s3://").is_err());
    }
}
