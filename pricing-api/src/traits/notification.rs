use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("Notification failed: {0}")]
pub struct SinkError(pub String);

/// Receives the summary message produced after every delivery.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Sends one message.
    ///
    /// # Arguments
    ///
    /// * `text` - The message body.
    /// * `is_primary` - Whether the delivery being reported went to the primary destination.
    async fn send_message(&self, text: &str, is_primary: bool) -> Result<(), SinkError>;

    /// Flushes and releases the transport. Messages sent afterwards may be dropped.
    async fn close(&self) -> Result<(), SinkError>;
}
