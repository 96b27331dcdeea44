use crate::delivery::chunking::{split_in_two, UploadMethod};
use crate::delivery::retry::{
    self, connectivity, connectivity_containing, message_contains_any, BoundedRetry, PolicyWrap,
    RetryForever,
};
use crate::error::{Result, UploadError};
use crate::settings::{DestinationSettings, UploadSettings};
use log::{error, log, Level};
use pricing::{
    CanonicalRecord, Connector, DeliveryResult, EndpointError, Environment, PricingConnection,
    Submission,
};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

type SubmitPolicy = PolicyWrap<BoundedRetry, RetryForever>;

/// Delivers batches of canonical records to one destination.
///
/// A chunk that still fails once the retry policies give up is halved and each half
/// delivered on its own, down to single records. A single record that cannot be
/// delivered counts as ignored when the endpoint's message says so, as a failure
/// otherwise. Every record of a chunk is therefore counted exactly once unless the
/// delivery is cancelled.
pub struct DeliveryEngine {
    environment: Environment,
    is_primary: bool,
    method: UploadMethod,
    chunk_size: usize,
    connector: Arc<dyn Connector>,
    connection: Mutex<Arc<dyn PricingConnection>>,
    policy: SubmitPolicy,
    ignorable_errors: Vec<String>,
    log_cap: Level,
    dry_run: bool,
    wait_between_batches: Duration,
    cancel: CancellationToken,
}

impl DeliveryEngine {
    pub fn new(
        destination: &DestinationSettings,
        upload: &UploadSettings,
        connector: Arc<dyn Connector>,
        cancel: CancellationToken,
    ) -> Self {
        let policy = PolicyWrap::new(
            BoundedRetry::new(
                destination.connection_failure_retry_count,
                destination.transient_retry_delay(),
                connectivity(),
            ),
            RetryForever::new(
                destination.unavailable_retry_delay(),
                connectivity_containing(&destination.unavailable_errors),
            ),
        );
        let connection = Mutex::new(connector.connect());
        Self {
            environment: destination.environment,
            is_primary: destination.is_primary,
            method: destination.upload_method,
            chunk_size: destination.chunk_size,
            connector,
            connection,
            policy,
            ignorable_errors: destination
                .ignorable_errors
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
            log_cap: destination.max_log_level,
            dry_run: upload.dry_run,
            wait_between_batches: upload.wait_between_batches(),
            cancel,
        }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn is_primary(&self) -> bool {
        self.is_primary
    }

    /// Demotes `level` so it is never more severe than this destination's cap.
    pub fn capped(&self, level: Level) -> Level {
        level.max(self.log_cap)
    }

    /// Delivers `records`, chunked according to the destination's upload method.
    ///
    /// # Returns
    ///
    /// * `Result<DeliveryResult>` - The per-record outcome. A schema mismatch fails the
    ///   whole delivery: fatally on the primary destination, as an endpoint error
    ///   elsewhere. Cancellation fails it with `UploadError::Cancelled`.
    pub async fn deliver(&mut self, records: Vec<CanonicalRecord>) -> Result<DeliveryResult> {
        let adjective = if self.dry_run { "DRY-RUN" } else { "Uploading" };
        let chunks = self.method.chunk(records, self.chunk_size);
        let count = chunks.len();

        let mut total = DeliveryResult::empty();
        for (i, chunk) in chunks.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(UploadError::Cancelled);
            }

            log!(
                self.capped(Level::Debug),
                "{} chunk {} ({} prices) of {} to {}",
                adjective,
                i + 1,
                chunk.len(),
                count,
                self.environment
            );
            self.trace_records(&chunk);

            if self.dry_run {
                total += DeliveryResult::all_succeeded(chunk.len());
                continue;
            }

            total += self.deliver_chunk(chunk).await?;

            if !self.wait_between_batches.is_zero() {
                tokio::select! {
                    _ = self.cancel.cancelled() => return Err(UploadError::Cancelled),
                    _ = tokio::time::sleep(self.wait_between_batches) => {}
                }
            }
        }

        if total.failures() > 0 {
            log!(
                self.capped(Level::Warn),
                "Failed to upload {} option price(s) to {}",
                total.failures(),
                self.environment
            );
        }
        Ok(total)
    }

    /// Delivers one top-level chunk, halving whatever the endpoint keeps refusing.
    async fn deliver_chunk(&mut self, chunk: Vec<CanonicalRecord>) -> Result<DeliveryResult> {
        let mut result = DeliveryResult::empty();
        let mut pending = vec![chunk];

        while let Some(chunk) = pending.pop() {
            let Some(submission) = self.method.submission(&chunk) else {
                continue;
            };

            match self.submit(&submission).await {
                Ok(()) => result += DeliveryResult::all_succeeded(chunk.len()),
                Err(UploadError::Endpoint(e)) if e.is_schema_mismatch() => {
                    return Err(self.escalate(e));
                }
                Err(UploadError::Endpoint(e)) if chunk.len() > 1 => {
                    log!(
                        self.capped(Level::Debug),
                        "Splitting chunk of {} prices for {} after: {}",
                        chunk.len(),
                        self.environment,
                        e
                    );
                    let (first, second) = split_in_two(chunk);
                    pending.push(second);
                    pending.push(first);
                }
                Err(UploadError::Endpoint(e)) => result += self.settle_single(&chunk[0], &e),
                Err(other) => return Err(other),
            }
        }
        Ok(result)
    }

    async fn submit(&mut self, submission: &Submission) -> Result<()> {
        let environment = self.environment;
        let warn_level = self.capped(Level::Warn);
        let connector = &self.connector;
        let connection = &self.connection;

        retry::execute(
            &mut self.policy,
            &self.cancel,
            || {
                let session = lock(connection).clone();
                async move { session.submit_prices(submission).await }
            },
            |e, delay, attempt| {
                log!(
                    warn_level,
                    "Upload to {} failed on attempt {}: {}. Reconnecting, next attempt in {:?}",
                    environment,
                    attempt,
                    e,
                    delay
                );
                *lock(connection) = connector.connect();
            },
        )
        .await
    }

    fn escalate(&self, e: EndpointError) -> UploadError {
        if self.is_primary {
            // Fail-fast messages are never capped
            error!(
                "Unrecoverable pricing endpoint error in primary destination {}: {}",
                self.environment, e
            );
            UploadError::fatal("Unrecoverable pricing endpoint error in primary destination", e)
        } else {
            log!(
                self.capped(Level::Error),
                "Unrecoverable pricing endpoint error in {}: {}",
                self.environment,
                e
            );
            UploadError::Endpoint(e)
        }
    }

    fn settle_single(&self, record: &CanonicalRecord, e: &EndpointError) -> DeliveryResult {
        let details = serde_json::to_string(record).unwrap_or_else(|_| format!("{:?}", record));
        if message_contains_any(e.message(), &self.ignorable_errors) {
            log!(
                self.capped(Level::Info),
                "UPLOAD FAILED for {}: {}",
                details,
                e.message()
            );
            DeliveryResult::single_ignored()
        } else {
            log!(
                self.capped(Level::Error),
                "UPLOAD FAILED for {}: {}",
                details,
                e.message()
            );
            DeliveryResult::single_failure()
        }
    }

    fn trace_records(&self, chunk: &[CanonicalRecord]) {
        let level = self.capped(Level::Trace);
        if !log::log_enabled!(level) {
            return;
        }
        for record in chunk {
            if let Ok(json) = serde_json::to_string(record) {
                log!(level, "{}", json);
            }
        }
    }
}

fn lock(slot: &Mutex<Arc<dyn PricingConnection>>) -> MutexGuard<'_, Arc<dyn PricingConnection>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
