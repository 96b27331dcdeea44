//! Input side: feed parsers, the directory poller and the file system seam.

pub mod demo;
pub mod feeds;
pub mod fs;
pub mod source;
pub mod stability;

pub use demo::DemoInputSource;
pub use feeds::{FeedFormat, IceDatFormat, NymexOptionFormat};
pub use fs::{FileSystem, LocalFileSystem};
pub use source::{FileInputSource, InputSource, SourceBatch, ARCHIVED_FOLDER, ERROR_FOLDER};
pub use stability::StabilityTracker;
