//! File system access used by the input sources.

use async_trait::async_trait;
use glob::Pattern;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Files directly inside `directory` whose name matches `pattern`, sorted by path.
    async fn list_matching(&self, directory: &Path, pattern: &Pattern) -> io::Result<Vec<PathBuf>>;

    async fn file_size(&self, path: &Path) -> io::Result<u64>;

    async fn read_to_string(&self, path: &Path) -> io::Result<String>;

    async fn exists(&self, path: &Path) -> bool;

    /// Moves `from` to `to`, creating the destination directory when needed.
    async fn move_file(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// The local disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn list_matching(&self, directory: &Path, pattern: &Pattern) -> io::Result<Vec<PathBuf>> {
        let directory = directory.to_path_buf();
        let pattern = pattern.clone();
        tokio::task::spawn_blocking(move || {
            let mut files = Vec::new();
            for entry in WalkDir::new(&directory).min_depth(1).max_depth(1) {
                let entry = entry.map_err(io::Error::from)?;
                if !entry.file_type().is_file() {
                    continue;
                }
                if entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| pattern.matches(name))
                {
                    files.push(entry.into_path());
                }
            }
            files.sort();
            Ok(files)
        })
        .await
        .map_err(io::Error::other)?
    }

    async fn file_size(&self, path: &Path) -> io::Result<u64> {
        Ok(tokio::fs::metadata(path).await?.len())
    }

    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        tokio::fs::read_to_string(path).await
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn move_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(from, to).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_listing_and_move() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.dat"), "x").unwrap();
        std::fs::write(dir.path().join("a.dat"), "xy").unwrap();
        std::fs::write(dir.path().join("a.csv"), "z").unwrap();
        std::fs::create_dir(dir.path().join("sub.dat")).unwrap();

        let fs = LocalFileSystem;
        let pattern = Pattern::new("*.dat").unwrap();
        let files = fs.list_matching(dir.path(), &pattern).await.unwrap();
        assert_eq!(files, vec![dir.path().join("a.dat"), dir.path().join("b.dat")]);
        assert_eq!(fs.file_size(&files[0]).await.unwrap(), 2);

        let target = dir.path().join("Archived").join("a.dat");
        fs.move_file(&files[0], &target).await.unwrap();
        assert!(fs.exists(&target).await);
        assert!(!fs.exists(&files[0]).await);
    }

    #[tokio::test]
    async fn test_listing_a_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = Pattern::new("*.dat").unwrap();
        let result = LocalFileSystem
            .list_matching(&dir.path().join("missing"), &pattern)
            .await;
        assert!(result.is_err());
    }
}
