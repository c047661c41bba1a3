use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::file::{File, LocalFile};
use crate::fs::{Listing, ListingSender};

/// A directory tree (or single file) on the local disk
#[derive(Debug, Clone)]
pub struct LocalFilesystem {
    root: PathBuf,
    buffer: usize,
}

impl LocalFilesystem {
    pub fn new(root: impl Into<PathBuf>, buffer: usize) -> Self {
        Self {
            root: root.into(),
            buffer,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the tree on a blocking thread, sort, then stream the entries
    pub fn files(&self) -> Listing {
        let (tx, listing) = Listing::channel(self.root.display().to_string(), self.buffer);
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || produce(&root, tx));
        listing
    }

    /// Location of `relative` below the root
    ///
    /// Relative paths come from other filesystems, including remote keys, so
    /// `..`, absolute and prefix components are refused instead of joined.
    pub fn path_of(&self, relative: &str) -> Result<PathBuf> {
        let mut path = self.root.clone();
        let mut named = false;
        for part in relative.split('/') {
            if part.is_empty() || part == "." {
                continue;
            }
            let mut components = Path::new(part).components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(name)), None) => {
                    path.push(name);
                    named = true;
                }
                _ => {
                    return Err(Error::InvalidPath(format!(
                        "'{relative}' escapes {}",
                        self.root.display()
                    )));
                }
            }
        }
        if !named {
            return Err(Error::InvalidPath(format!("'{relative}' names no entry")));
        }
        Ok(path)
    }

    pub async fn create(&self, source: &File) -> Result<u64> {
        let dest = self.path_of(source.relative())?;

        if source.is_directory() {
            tokio::fs::create_dir_all(&dest).await?;
            return Ok(0);
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut reader = source.open().await?;
        let mut out = tokio::fs::File::create(&dest).await?;
        let written = tokio::io::copy(&mut reader, &mut out).await?;
        out.sync_all().await?;
        Ok(written)
    }

    pub async fn delete(&self, relative: &str) -> Result<()> {
        tokio::fs::remove_file(self.path_of(relative)?).await?;
        Ok(())
    }
}

fn produce(root: &Path, tx: ListingSender) {
    match walk(root) {
        Ok(files) => {
            tracing::debug!(root = %root.display(), count = files.len(), "Listed local tree");
            for file in files {
                if !tx.blocking_send(File::Local(file)) {
                    break;
                }
            }
        }
        Err(e) => tx.fail(e),
    }
}

/// Collect every plain file below `root`, sorted by relative path
fn walk(root: &Path) -> Result<Vec<LocalFile>> {
    let metadata = match std::fs::metadata(root) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    if metadata.is_file() {
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::InvalidPath(format!("{} has no file name", root.display())))?;
        return Ok(vec![entry(root.to_path_buf(), name, &metadata)]);
    }

    // Symlinks are not followed
    let mut found = Vec::new();
    for item in WalkDir::new(root) {
        let item = item.map_err(std::io::Error::from)?;
        if !item.file_type().is_file() {
            continue;
        }
        let metadata = item.metadata().map_err(std::io::Error::from)?;
        let path = item.into_path();
        found.push((relative_path(root, &path), path, metadata));
    }

    // Directory order is unspecified and `/` must sort as a byte
    found.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(found
        .into_iter()
        .map(|(relative, path, metadata)| entry(path, relative, &metadata))
        .collect())
}

fn entry(path: PathBuf, relative: String, metadata: &std::fs::Metadata) -> LocalFile {
    let modified = metadata
        .modified()
        .ok()
        .and_then(|t| jiff::Timestamp::try_from(t).ok());
    LocalFile::new(path, relative, metadata.len(), modified)
}

/// `/`-separated path of `path` below `root`
fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    fn tree(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (rel, content) in files {
            let path = dir.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        dir
    }

    async fn relatives(fs: &LocalFilesystem) -> Vec<String> {
        fs.files()
            .collect()
            .await
            .unwrap()
            .iter()
            .map(|f| f.relative().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_listing_is_sorted_and_repeatable() {
        let dir = tree(&[("z", "1"), ("b/c", "2"), ("a", "3"), ("b-x", "4"), ("b/a/d", "5")]);
        let fs = LocalFilesystem::new(dir.path(), 8);

        let first = relatives(&fs).await;
        assert_eq!(first, vec!["a", "b-x", "b/a/d", "b/c", "z"]);
        assert_eq!(relatives(&fs).await, first);
    }

    #[tokio::test]
    async fn test_missing_root_is_empty() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFilesystem::new(dir.path().join("nope"), 8);
        assert!(relatives(&fs).await.is_empty());
    }

    #[tokio::test]
    async fn test_single_file_root_uses_file_name() {
        let dir = tree(&[("sub/report.csv", "x,y")]);
        let fs = LocalFilesystem::new(dir.path().join("sub/report.csv"), 8);
        let files = fs.files().collect().await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative(), "report.csv");
        assert_eq!(files[0].size(), 3);
    }

    #[tokio::test]
    async fn test_create_makes_parents_and_copies() {
        let src = tree(&[("deep/nested/file.txt", "content")]);
        let dest = TempDir::new().unwrap();
        let source_fs = LocalFilesystem::new(src.path(), 8);
        let dest_fs = LocalFilesystem::new(dest.path(), 8);

        let file = source_fs.files().collect().await.unwrap().remove(0);
        let written = dest_fs.create(&file).await.unwrap();
        assert_eq!(written, 7);

        let copied = dest_fs.files().collect().await.unwrap().remove(0);
        assert_eq!(copied.relative(), "deep/nested/file.txt");
        let mut data = String::new();
        copied.open().await.unwrap().read_to_string(&mut data).await.unwrap();
        assert_eq!(data, "content");
    }

    #[test]
    fn test_path_of_refuses_escapes() {
        let fs = LocalFilesystem::new("/data/out", 8);
        assert_eq!(fs.path_of("a/b.txt").unwrap(), Path::new("/data/out/a/b.txt"));
        assert_eq!(fs.path_of("/z").unwrap(), Path::new("/data/out/z"));
        assert_eq!(fs.path_of("dir/").unwrap(), Path::new("/data/out/dir"));

        for bad in ["x/../../outside", "..", "a/./../b", ""] {
            let err = fs.path_of(bad).unwrap_err();
            assert_eq!(err.exit_code(), 2, "{bad}");
        }
    }

    #[tokio::test]
    async fn test_create_refuses_path_outside_root() {
        let src = tree(&[("evil", "x")]);
        let dest = TempDir::new().unwrap();
        let target = LocalFilesystem::new(dest.path().join("inner"), 8);
        let file = File::Local(LocalFile::new(src.path().join("evil"), "../evil", 1, None));

        assert!(matches!(target.create(&file).await, Err(Error::InvalidPath(_))));
        assert!(!dest.path().join("evil").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_directories_are_not_followed() {
        let dir = tree(&[("real/a", "1")]);
        std::os::unix::fs::symlink(dir.path(), dir.path().join("real/loop")).unwrap();
        let fs = LocalFilesystem::new(dir.path(), 8);
        assert_eq!(relatives(&fs).await, vec!["real/a"]);
    }

    #[tokio::test]
    async fn test_delete_removes_file() {
        let dir = tree(&[("a", "1"), ("b", "2")]);
        let fs = LocalFilesystem::new(dir.path(), 8);
        fs.delete("a").await.unwrap();
        assert_eq!(relatives(&fs).await, vec!["b"]);
        assert!(fs.delete("a").await.unwrap_err().is_not_found());
    }
}
