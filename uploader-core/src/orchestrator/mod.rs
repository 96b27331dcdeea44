//! Upload cycles: read every source, map and gate the records, and queue the merged
//! batch on every destination.

pub mod catalog;
pub mod worker;

use crate::calendar::{BankHolidayLookup, CalendarMath, TradeDateMapper};
use crate::delivery::DeliveryEngine;
use crate::error::{Result, UploadError};
use crate::ingest::InputSource;
use crate::mapping::{apply_throttles, filter_valid, Mapper, StalenessGate};
use crate::settings::{validate_destinations, DestinationSettings, UploadSettings};
use catalog::{PrimaryHolidays, PrimaryLookups, SharedCatalog};
use chrono::NaiveDate;
use futures::future::join_all;
use log::{debug, error, info, warn};
use pricing::{CanonicalRecord, Clock, Connector, NotificationSink};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use worker::{DeliveryJob, DestinationWorker, Settlement};

pub use worker::{shared_source, SharedSource};

const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// A configured destination and the way to reach it.
pub struct Destination {
    pub settings: DestinationSettings,
    pub connector: Arc<dyn Connector>,
}

impl Destination {
    pub fn new(settings: DestinationSettings, connector: Arc<dyn Connector>) -> Self {
        Self {
            settings,
            connector,
        }
    }
}

struct Queue {
    name: String,
    is_primary: bool,
    sender: mpsc::UnboundedSender<DeliveryJob>,
    handle: JoinHandle<()>,
}

/// Everything a cycle needs to turn raw records into deliverable ones.
struct CycleContext {
    catalog: SharedCatalog,
    calendar: CalendarMath,
    mapper: Mapper,
    today: NaiveDate,
}

/// Drives the whole pipeline.
///
/// Each destination gets its own queue and worker task, so construct the orchestrator
/// inside a tokio runtime.
pub struct Orchestrator {
    upload: UploadSettings,
    sources: Vec<SharedSource>,
    queues: Vec<Queue>,
    lookups: Arc<PrimaryLookups>,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
    fatal: mpsc::UnboundedReceiver<UploadError>,
}

impl Orchestrator {
    /// Validates the destination set and starts one worker per destination.
    ///
    /// # Errors
    ///
    /// * `UploadError::Config` - No sources, no destinations, duplicate environments,
    ///   not exactly one primary, or a zero chunk size.
    pub fn new(
        upload: UploadSettings,
        sources: Vec<SharedSource>,
        destinations: Vec<Destination>,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        if sources.is_empty() {
            return Err(UploadError::Config(
                "Please configure at least one input source".to_string(),
            ));
        }
        let settings: Vec<DestinationSettings> =
            destinations.iter().map(|d| d.settings.clone()).collect();
        validate_destinations(&settings)?;

        let primary = destinations
            .iter()
            .find(|d| d.settings.is_primary)
            .map(|d| d.connector.clone())
            .ok_or_else(|| UploadError::Config("No primary pricing endpoint".to_string()))?;
        let lookups = Arc::new(PrimaryLookups::new(primary, cancel.clone()));

        let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();
        let queues = destinations
            .into_iter()
            .map(|destination| {
                let engine = DeliveryEngine::new(
                    &destination.settings,
                    &upload,
                    destination.connector,
                    cancel.clone(),
                );
                let (sender, receiver) = mpsc::unbounded_channel();
                let worker =
                    DestinationWorker::new(engine, sink.clone(), clock.clone(), fatal_tx.clone());
                Queue {
                    name: destination.settings.environment.to_string(),
                    is_primary: destination.settings.is_primary,
                    sender,
                    handle: worker.spawn(receiver),
                }
            })
            .collect();

        Ok(Self {
            upload,
            sources,
            queues,
            lookups,
            sink,
            clock,
            cancel,
            fatal: fatal_rx,
        })
    }

    /// Runs cycles until cancelled or until something fatal happens.
    ///
    /// # Returns
    ///
    /// * `Result<()>` - `Ok` once cancelled, the fatal error otherwise.
    pub async fn run(&mut self, polling_interval: Duration) -> Result<()> {
        info!(
            "Uploader started, polling every {:?} with policy {}",
            polling_interval, self.upload.trade_date_policy
        );
        loop {
            match self.run_cycle().await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => return Ok(()),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => error!("Upload cycle failed: {}", e),
            }

            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                Some(e) = self.fatal.recv() => return Err(e),
                _ = tokio::time::sleep(polling_interval) => {}
            }
        }
    }

    /// Reads every source once and queues whatever survived the gates.
    ///
    /// Deliveries run on the destination workers; this returns once they are queued.
    pub async fn run_cycle(&mut self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }
        if let Ok(e) = self.fatal.try_recv() {
            return Err(e);
        }

        let context = self.cycle_context();
        let batches = join_all(self.sources.iter().map(|s| self.read_source(s, &context))).await;

        let mut merged: Vec<CanonicalRecord> = Vec::new();
        let mut names: Vec<String> = Vec::new();
        for batch in batches {
            let (name, records) = batch?;
            if !records.is_empty() {
                names.push(name);
                merged.extend(records);
            }
        }

        if merged.is_empty() {
            debug!("Nothing to upload this cycle");
            // Files that yielded nothing deliverable are settled behind any delivery
            // still queued on the primary
            if let Some(primary) = self.queues.iter().find(|q| q.is_primary) {
                let job = DeliveryJob {
                    records: Vec::new(),
                    source_names: String::new(),
                    settlement: Some(self.settlement()),
                };
                if primary.sender.send(job).is_err() {
                    warn!("Delivery queue for {} is closed", primary.name);
                }
            }
            return Ok(());
        }

        let source_names = names.join(", ");
        for queue in &self.queues {
            let job = DeliveryJob {
                records: merged.clone(),
                source_names: source_names.clone(),
                settlement: queue.is_primary.then(|| self.settlement()),
            };
            if queue.sender.send(job).is_err() {
                warn!("Delivery queue for {} is closed", queue.name);
            }
        }
        Ok(())
    }

    /// Stops accepting work, waits for queued deliveries to drain and closes the
    /// notification sink.
    ///
    /// Without cancellation every queued delivery runs to completion, retries
    /// included. Once cancelled, workers only get `SHUTDOWN_DRAIN_TIMEOUT` to wind down.
    ///
    /// # Returns
    ///
    /// * `Result<()>` - The first fatal error raised by a destination, or
    ///   `UploadError::Shutdown` when cancelled workers did not finish in time.
    pub async fn shutdown(mut self) -> Result<()> {
        info!("Shutting down the uploader");
        let handles: Vec<JoinHandle<()>> = self
            .queues
            .drain(..)
            .map(|queue| {
                drop(queue.sender);
                queue.handle
            })
            .collect();

        let mut drained = true;
        if self.cancel.is_cancelled() {
            if tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, join_all(handles))
                .await
                .is_err()
            {
                warn!(
                    "Destination queues did not drain within {:?}",
                    SHUTDOWN_DRAIN_TIMEOUT
                );
                drained = false;
            }
        } else {
            join_all(handles).await;
        }

        if let Err(e) = self.sink.close().await {
            warn!("Failed to close notifications: {}", e);
        }

        if let Ok(e) = self.fatal.try_recv() {
            return Err(e);
        }
        if !drained {
            return Err(UploadError::Shutdown(format!(
                "destination queues did not drain within {:?}",
                SHUTDOWN_DRAIN_TIMEOUT
            )));
        }
        Ok(())
    }

    fn cycle_context(&self) -> CycleContext {
        let holidays = Arc::new(BankHolidayLookup::new(Arc::new(PrimaryHolidays::new(
            self.lookups.clone(),
        ))));
        let calendar = CalendarMath::new(holidays);
        let dates = TradeDateMapper::new(
            self.upload.trade_date_policy,
            self.clock.clone(),
            calendar.clone(),
        );
        CycleContext {
            catalog: SharedCatalog::new(self.lookups.clone()),
            calendar,
            mapper: Mapper::new(dates, self.upload.default_pricing_group.clone()),
            today: self.clock.today(),
        }
    }

    fn settlement(&self) -> Settlement {
        Settlement {
            sources: self.sources.clone(),
            mark_processed_once_uploaded: self.upload.mark_processed_once_uploaded,
        }
    }

    /// Reads one source and returns its deliverable records.
    ///
    /// Errors other than fatal or cancellation leave the source without data this
    /// cycle and move its files aside.
    async fn read_source(
        &self,
        source: &SharedSource,
        context: &CycleContext,
    ) -> Result<(String, Vec<CanonicalRecord>)> {
        let mut source = source.lock().await;
        let name = source.name().to_string();

        let outcome = self.prepare(&mut *source, &name, context).await;
        let records = match outcome {
            Ok(Some(records)) => records,
            Ok(None) => {
                report_failure(&mut *source, &name).await;
                Vec::new()
            }
            Err(e) if e.is_fatal() || e.is_cancelled() => return Err(e),
            Err(e) => {
                error!("Failed to read option prices from {}: {}", name, e);
                report_failure(&mut *source, &name).await;
                Vec::new()
            }
        };
        Ok((name, records))
    }

    /// `Ok(None)` when the batch was rejected as stale.
    async fn prepare(
        &self,
        source: &mut (dyn InputSource + 'static),
        name: &str,
        context: &CycleContext,
    ) -> Result<Option<Vec<CanonicalRecord>>> {
        let batch = source.read(&self.cancel).await?;
        if batch.records.is_empty() {
            return Ok(Some(Vec::new()));
        }
        debug!("Read {} option prices from {}", batch.records.len(), name);

        let mapped = context.mapper.map(&batch.records, &context.catalog).await?;
        let valid = filter_valid(mapped, context.today);
        let records = apply_throttles(
            valid,
            self.upload.records_to_skip,
            self.upload.max_records,
        );
        if records.is_empty() {
            return Ok(Some(records));
        }

        let cutoff = context.calendar.previous_working_day(context.today).await?;
        let gate = StalenessGate::new(self.upload.force_upload_old_trade_dates);
        if !gate.admit(name, &batch.description, &records, cutoff) {
            return Ok(None);
        }
        Ok(Some(records))
    }
}

async fn report_failure(source: &mut (dyn InputSource + 'static), name: &str) {
    if let Err(e) = source.report_outcome(false).await {
        warn!("Data source cleanup failed for {}: {}", name, e);
    }
}
