//! Notification sinks for delivery summaries.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use log::{info, warn};
use pricing::{DeliveryResult, Environment, NotificationSink, SinkError};
use std::sync::Arc;
use std::time::Duration;

/// The message sent once a delivery to `environment` completes.
pub fn summary_message(
    source_names: &str,
    environment: Environment,
    completed_at: DateTime<Local>,
    result: &DeliveryResult,
    elapsed: Duration,
) -> String {
    format!(
        "Upload of {} option settlement prices to {} completed at {}\n{}\nTime taken: {}",
        source_names,
        environment,
        completed_at.format("%Y-%m-%d %H:%M:%S"),
        result,
        format_elapsed(elapsed)
    )
}

/// `hh:mm:ss.fff`
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        elapsed.subsec_millis()
    )
}

/// Writes messages to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink {
    primary_only: bool,
}

impl LogSink {
    pub fn new(primary_only: bool) -> Self {
        Self { primary_only }
    }
}

#[async_trait]
impl NotificationSink for LogSink {
    async fn send_message(&self, text: &str, is_primary: bool) -> Result<(), SinkError> {
        if is_primary || !self.primary_only {
            info!("{}", text);
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait]
impl NotificationSink for NullSink {
    async fn send_message(&self, _text: &str, _is_primary: bool) -> Result<(), SinkError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Fans messages out to several sinks. A failing sink is logged and skipped.
#[derive(Default, Clone)]
pub struct CompositeSink {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl CompositeSink {
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl NotificationSink for CompositeSink {
    async fn send_message(&self, text: &str, is_primary: bool) -> Result<(), SinkError> {
        for sink in &self.sinks {
            if let Err(e) = sink.send_message(text, is_primary).await {
                warn!("Failed to send notification: {}", e);
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        for sink in &self.sinks {
            if let Err(e) = sink.close().await {
                warn!("Failed to close notification sink: {}", e);
            }
        }
        Ok(())
    }
}
