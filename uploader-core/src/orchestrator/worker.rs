//! The per-destination delivery queue.

use crate::delivery::DeliveryEngine;
use crate::error::{Result, UploadError};
use crate::ingest::InputSource;
use crate::notify::summary_message;
use log::{debug, error, log, warn, Level};
use pricing::{CanonicalRecord, Clock, DeliveryResult, NotificationSink};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// An input source shared between the cycle that reads it and the primary worker
/// that settles it.
pub type SharedSource = Arc<Mutex<dyn InputSource>>;

pub fn shared_source(source: impl InputSource + 'static) -> SharedSource {
    Arc::new(Mutex::new(source))
}

/// What to do with the sources once the primary delivery completes.
pub(crate) struct Settlement {
    pub(crate) sources: Vec<SharedSource>,
    pub(crate) mark_processed_once_uploaded: bool,
}

impl Settlement {
    /// Failed deliveries always move the files aside. Successful ones archive them
    /// only when asked to.
    pub(crate) async fn settle(self, succeeded: bool) {
        if succeeded && !self.mark_processed_once_uploaded {
            return;
        }
        for source in &self.sources {
            let mut source = source.lock().await;
            if let Err(e) = source.report_outcome(succeeded).await {
                warn!("Data source cleanup failed for {}: {}", source.name(), e);
            }
        }
    }
}

pub(crate) struct DeliveryJob {
    pub(crate) records: Vec<CanonicalRecord>,
    pub(crate) source_names: String,
    pub(crate) settlement: Option<Settlement>,
}

/// Consumes one destination's queue, one delivery at a time.
pub(crate) struct DestinationWorker {
    engine: DeliveryEngine,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    fatal: mpsc::UnboundedSender<UploadError>,
}

impl DestinationWorker {
    pub(crate) fn new(
        engine: DeliveryEngine,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        fatal: mpsc::UnboundedSender<UploadError>,
    ) -> Self {
        Self {
            engine,
            sink,
            clock,
            fatal,
        }
    }

    pub(crate) fn spawn(self, queue: mpsc::UnboundedReceiver<DeliveryJob>) -> JoinHandle<()> {
        tokio::spawn(self.run(queue))
    }

    async fn run(mut self, mut queue: mpsc::UnboundedReceiver<DeliveryJob>) {
        while let Some(job) = queue.recv().await {
            match self.process(job).await {
                Ok(_) => {}
                Err(e) if e.is_fatal() => {
                    let _ = self.fatal.send(e);
                    break;
                }
                Err(e) if e.is_cancelled() => {
                    debug!("Delivery to {} cancelled", self.engine.environment());
                }
                Err(e) => {
                    log!(
                        self.engine.capped(Level::Error),
                        "Delivery to {} failed: {}",
                        self.engine.environment(),
                        e
                    );
                }
            }
        }
        debug!("Delivery queue for {} closed", self.engine.environment());
    }

    async fn process(&mut self, job: DeliveryJob) -> Result<DeliveryResult> {
        if job.records.is_empty() {
            if let Some(settlement) = job.settlement {
                settlement.settle(true).await;
            }
            return Ok(DeliveryResult::empty());
        }

        let environment = self.engine.environment();
        let started = Instant::now();
        log!(
            self.engine.capped(Level::Info),
            "{} option prices to upload to {}",
            job.records.len(),
            environment
        );

        let result = self.engine.deliver(job.records).await?;
        let elapsed = started.elapsed();
        log!(
            self.engine.capped(Level::Info),
            "Uploaded option prices to {} in {:?}: {} successes, {} ignored and {} failures",
            environment,
            elapsed,
            result.successes(),
            result.ignored(),
            result.failures()
        );

        if let Some(settlement) = job.settlement {
            settlement.settle(result.succeeded()).await;
        }

        let text = summary_message(
            &job.source_names,
            environment,
            self.clock.now_local(),
            &result,
            elapsed,
        );
        if let Err(e) = self.sink.send_message(&text, self.engine.is_primary()).await {
            error!("Failed to send the {} summary: {}", environment, e);
        }
        Ok(result)
    }
}
