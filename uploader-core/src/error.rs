use pricing::{EndpointError, SinkError};
use thiserror::Error;

/// Errors raised by the upload pipeline.
#[derive(Error, Debug)]
pub enum UploadError {
    /// The configuration cannot be used; the process must not start.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An unrecoverable condition; the process must stop.
    #[error("{message}")]
    Fatal {
        message: String,
        #[source]
        source: Option<EndpointError>,
    },

    /// The shutdown signal was observed.
    #[error("Operation cancelled")]
    Cancelled,

    /// A pricing endpoint call failed and no retry policy recovered it.
    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    /// Underlying IO failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A delimited input file could not be read.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// An input field has an unexpected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Deliveries were still running when the shutdown grace period ran out.
    #[error("Shutdown incomplete: {0}")]
    Shutdown(String),

    /// A notification could not be delivered.
    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl UploadError {
    pub fn fatal(message: impl Into<String>, source: EndpointError) -> Self {
        UploadError::Fatal {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Fatal errors stop the whole process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, UploadError::Fatal { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, UploadError::Cancelled)
    }
}

/// A specialized Result type for upload operations.
pub type Result<T> = std::result::Result<T, UploadError>;
