//! Detects when a file in an input directory has finished being written.

use crate::ingest::fs::FileSystem;
use log::{debug, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Watches file sizes across polls.
///
/// A file is ready once two consecutive polls observe the same non-zero size. Files
/// whose size cannot be read are treated as still being copied.
#[derive(Debug, Default)]
pub struct StabilityTracker {
    source_name: String,
    watched: HashMap<PathBuf, Option<u64>>,
}

impl StabilityTracker {
    pub fn new(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            watched: HashMap::new(),
        }
    }

    /// Runs one poll over the files currently listed in the directory.
    ///
    /// # Arguments
    ///
    /// * `fs` - Where sizes are read from.
    /// * `listed` - The matching files that have not been read yet.
    ///
    /// # Returns
    ///
    /// * `Vec<PathBuf>` - Files that became ready during this poll. They are no longer watched.
    pub async fn poll(&mut self, fs: &dyn FileSystem, listed: &[PathBuf]) -> Vec<PathBuf> {
        self.watched.retain(|path, _| {
            let still_there = listed.contains(path);
            if !still_there {
                warn!(
                    "{} {} was deleted before it was uploaded",
                    self.source_name,
                    path.display()
                );
            }
            still_there
        });

        let mut ready = Vec::new();
        for path in listed {
            let size = self.size_of(fs, path).await;
            match self.watched.get(path).copied() {
                None => {
                    if size == Some(0) {
                        debug!("Ignoring zero-byte file {}", path.display());
                        continue;
                    }
                    debug!("{}: new file found: {}", self.source_name, path.display());
                    self.watched.insert(path.clone(), size);
                }
                Some(previous) => {
                    debug!(
                        "Checking file {} filesize {:?} -> {:?}",
                        path.display(),
                        previous,
                        size
                    );
                    if size.is_some() && previous == size && size != Some(0) {
                        self.watched.remove(path);
                        ready.push(path.clone());
                    } else {
                        self.watched.insert(path.clone(), size);
                    }
                }
            }
        }
        ready
    }

    pub fn is_watching(&self, path: &Path) -> bool {
        self.watched.contains_key(path)
    }

    pub fn watched_count(&self) -> usize {
        self.watched.len()
    }

    async fn size_of(&self, fs: &dyn FileSystem, path: &Path) -> Option<u64> {
        match fs.file_size(path).await {
            Ok(size) => Some(size),
            Err(e) => {
                debug!("Unable to get the size of {}: {}", path.display(), e);
                None
            }
        }
    }
}
