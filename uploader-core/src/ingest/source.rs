use crate::error::{Result, UploadError};
use crate::ingest::feeds::FeedFormat;
use crate::ingest::fs::FileSystem;
use crate::ingest::stability::StabilityTracker;
use async_trait::async_trait;
use glob::Pattern;
use log::{debug, error, info, warn};
use pricing::RawRecord;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const ARCHIVED_FOLDER: &str = "Archived";
pub const ERROR_FOLDER: &str = "Error";

/// What one read of an input source produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceBatch {
    /// What was read, for logs (the files awaiting an outcome, comma separated).
    pub description: String,
    pub records: Vec<RawRecord>,
}

/// A producer of raw price records.
#[async_trait]
pub trait InputSource: Send {
    fn name(&self) -> &str;

    /// Reads whatever is ready.
    ///
    /// # Arguments
    ///
    /// * `cancel` - Observed while waiting between directory retries.
    ///
    /// # Returns
    ///
    /// * `Result<SourceBatch>` - The records read, possibly none.
    async fn read(&mut self, cancel: &CancellationToken) -> Result<SourceBatch>;

    /// Settles everything read since the last call: archived on success, moved aside
    /// on failure.
    async fn report_outcome(&mut self, success: bool) -> Result<()>;
}

/// An input directory polled for files of one feed format.
pub struct FileInputSource<F: FeedFormat> {
    format: F,
    fs: Arc<dyn FileSystem>,
    directory: PathBuf,
    pattern: Pattern,
    retry_attempts: u32,
    initial_retry_delay: Duration,
    tracker: StabilityTracker,
    read_files: Vec<PathBuf>,
}

impl<F: FeedFormat> FileInputSource<F> {
    /// Creates a source matching the format's default file pattern.
    pub fn new(
        format: F,
        fs: Arc<dyn FileSystem>,
        directory: impl Into<PathBuf>,
        retry_attempts: u32,
        initial_retry_delay: Duration,
    ) -> Result<Self> {
        let pattern = format.default_pattern();
        Self::with_pattern(format, fs, directory, pattern, retry_attempts, initial_retry_delay)
    }

    pub fn with_pattern(
        format: F,
        fs: Arc<dyn FileSystem>,
        directory: impl Into<PathBuf>,
        pattern: &str,
        retry_attempts: u32,
        initial_retry_delay: Duration,
    ) -> Result<Self> {
        let pattern = Pattern::new(pattern)
            .map_err(|e| UploadError::Config(format!("Invalid file pattern {:?}: {}", pattern, e)))?;
        let tracker = StabilityTracker::new(format.source_name());
        Ok(Self {
            format,
            fs,
            directory: directory.into(),
            pattern,
            retry_attempts,
            initial_retry_delay,
            tracker,
            read_files: Vec::new(),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Files read and awaiting `report_outcome`.
    pub fn pending_files(&self) -> &[PathBuf] {
        &self.read_files
    }

    fn description(&self) -> String {
        self.read_files
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Lists the input directory, retrying with a doubling delay.
    /// `None` once the retry budget is spent.
    async fn list_with_retry(&self, cancel: &CancellationToken) -> Result<Option<Vec<PathBuf>>> {
        let mut attempt = 0;
        let mut delay = self.initial_retry_delay;
        loop {
            match self.fs.list_matching(&self.directory, &self.pattern).await {
                Ok(files) => return Ok(Some(files)),
                Err(e) => {
                    warn!(
                        "Unable to read {} input directory: {}",
                        self.format.source_name(),
                        e
                    );
                    attempt += 1;
                    if attempt > self.retry_attempts {
                        error!(
                            "Exceeded retry count when trying to read {} directory {}",
                            self.format.source_name(),
                            self.directory.display()
                        );
                        return Ok(None);
                    }
                    info!(
                        "Retrying {} file directory read: {} of {}",
                        self.format.source_name(),
                        attempt,
                        self.retry_attempts
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(UploadError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    delay *= 2;
                }
            }
        }
    }

    /// Reads and parses one ready file. Files that cannot be used are moved out of the
    /// input directory straight away.
    async fn read_ready_file(&self, path: &Path) -> Option<Vec<RawRecord>> {
        let parsed = match self.fs.read_to_string(path).await {
            Ok(contents) => self.format.parse(&contents),
            Err(e) => Err(UploadError::Io(e)),
        };

        match parsed {
            Ok(records) if records.is_empty() => {
                debug!("No option prices in {}", path.display());
                self.settle_quietly(true, path).await;
                None
            }
            Ok(records) => Some(records),
            Err(e) => {
                error!("Failed to read input file {}: {}", path.display(), e);
                self.settle_quietly(false, path).await;
                None
            }
        }
    }

    async fn settle_quietly(&self, success: bool, path: &Path) {
        if let Err(e) = self.move_to_processed_folder(success, path).await {
            warn!("Unable to move {}: {}", path.display(), e);
        }
    }

    async fn move_to_processed_folder(&self, success: bool, path: &Path) -> Result<()> {
        let folder = if success { ARCHIVED_FOLDER } else { ERROR_FOLDER };
        let file_name = path.file_name().ok_or_else(|| {
            UploadError::Parse(format!("{} has no file name", path.display()))
        })?;

        let mut destination = self.directory.join(folder).join(file_name);
        while self.fs.exists(&destination).await {
            let mut name = destination.into_os_string();
            name.push(".copy");
            destination = PathBuf::from(name);
        }

        info!(
            "{}: moving {} to {}",
            self.format.source_name(),
            path.display(),
            destination.display()
        );
        self.fs.move_file(path, &destination).await?;
        Ok(())
    }
}

#[async_trait]
impl<F: FeedFormat> InputSource for FileInputSource<F> {
    fn name(&self) -> &str {
        self.format.source_name()
    }

    async fn read(&mut self, cancel: &CancellationToken) -> Result<SourceBatch> {
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        let Some(listed) = self.list_with_retry(cancel).await? else {
            return Ok(SourceBatch {
                description: self.description(),
                records: Vec::new(),
            });
        };

        let unread: Vec<PathBuf> = listed
            .into_iter()
            .filter(|p| !self.read_files.contains(p))
            .collect();
        let ready = self.tracker.poll(self.fs.as_ref(), &unread).await;

        let mut records = Vec::new();
        for path in ready {
            if let Some(parsed) = self.read_ready_file(&path).await {
                records.extend(parsed);
                self.read_files.push(path);
            }
        }

        Ok(SourceBatch {
            description: self.description(),
            records,
        })
    }

    async fn report_outcome(&mut self, success: bool) -> Result<()> {
        let files = std::mem::take(&mut self.read_files);
        let mut first_error = None;
        for path in files {
            if let Err(e) = self.move_to_processed_folder(success, &path).await {
                // Kept so the file is not read and uploaded a second time
                self.read_files.push(path);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
