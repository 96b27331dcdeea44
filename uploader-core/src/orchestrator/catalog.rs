//! Reference data read from the primary destination: the instrument catalog and the
//! bank-holiday calendar.

use crate::calendar::HolidayCalendar;
use crate::delivery::retry::{self, all_but_schema_mismatch, RetryForever};
use crate::error::{Result, UploadError};
use crate::mapping::{CatalogSource, InstrumentLookup};
use async_trait::async_trait;
use chrono::NaiveDate;
use log::{error, info, warn};
use pricing::{Connector, EndpointError, Instrument, PricingConnection};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

const CATALOG_RETRY_DELAY: Duration = Duration::from_secs(30);
const HOLIDAY_RETRY_DELAY: Duration = Duration::from_secs(1);

/// A session with the primary destination dedicated to lookups.
///
/// Every error but a schema mismatch is retried until it clears; what escapes is fatal.
pub struct PrimaryLookups {
    connector: Arc<dyn Connector>,
    connection: Mutex<Arc<dyn PricingConnection>>,
    cancel: CancellationToken,
}

impl PrimaryLookups {
    pub fn new(connector: Arc<dyn Connector>, cancel: CancellationToken) -> Self {
        let connection = Mutex::new(connector.connect());
        Self {
            connector,
            connection,
            cancel,
        }
    }

    pub async fn instrument_catalog(&self) -> Result<Vec<Instrument>> {
        let mut policy = RetryForever::new(CATALOG_RETRY_DELAY, all_but_schema_mismatch());
        let result = retry::execute(
            &mut policy,
            &self.cancel,
            || {
                let session = self.session();
                async move { session.fetch_instrument_catalog().await }
            },
            |e, delay, _| {
                warn!(
                    "Instrument catalog fetch failed: {}. Retrying in {:?}",
                    e, delay
                );
                self.reconnect();
            },
        )
        .await;
        escalate(result)
    }

    pub async fn is_holiday(&self, date: NaiveDate) -> Result<bool> {
        let mut policy = RetryForever::new(HOLIDAY_RETRY_DELAY, all_but_schema_mismatch());
        let result = retry::execute(
            &mut policy,
            &self.cancel,
            || {
                let session = self.session();
                async move { session.is_holiday(date).await }
            },
            |e, delay, _| {
                warn!(
                    "Bank holiday lookup for {} failed: {}. Retrying in {:?}",
                    date, e, delay
                );
                self.reconnect();
            },
        )
        .await;
        escalate(result)
    }

    fn session(&self) -> Arc<dyn PricingConnection> {
        lock(&self.connection).clone()
    }

    fn reconnect(&self) {
        *lock(&self.connection) = self.connector.connect();
    }
}

fn lock(slot: &Mutex<Arc<dyn PricingConnection>>) -> MutexGuard<'_, Arc<dyn PricingConnection>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn escalate<T>(result: Result<T>) -> Result<T> {
    match result {
        Err(UploadError::Endpoint(e)) => Err(fatal(e)),
        other => other,
    }
}

fn fatal(e: EndpointError) -> UploadError {
    error!(
        "Unrecoverable pricing endpoint error in primary destination: {}",
        e
    );
    UploadError::fatal("Unrecoverable pricing endpoint error in primary destination", e)
}

/// The instrument catalog of one upload cycle, fetched once by whichever source
/// needs it first.
pub struct SharedCatalog {
    lookups: Arc<PrimaryLookups>,
    cell: OnceCell<Arc<InstrumentLookup>>,
}

impl SharedCatalog {
    pub fn new(lookups: Arc<PrimaryLookups>) -> Self {
        Self {
            lookups,
            cell: OnceCell::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }
}

#[async_trait]
impl CatalogSource for SharedCatalog {
    async fn instruments(&self) -> Result<Arc<InstrumentLookup>> {
        self.cell
            .get_or_try_init(|| async {
                let instruments = self.lookups.instrument_catalog().await?;
                info!("Fetched {} instruments from the primary destination", instruments.len());
                Ok::<_, UploadError>(Arc::new(InstrumentLookup::new(instruments)))
            })
            .await
            .map(Arc::clone)
    }
}

/// Holiday calendar answered by the primary destination.
pub struct PrimaryHolidays {
    lookups: Arc<PrimaryLookups>,
}

impl PrimaryHolidays {
    pub fn new(lookups: Arc<PrimaryLookups>) -> Self {
        Self { lookups }
    }
}

#[async_trait]
impl HolidayCalendar for PrimaryHolidays {
    async fn is_holiday(&self, date: NaiveDate) -> Result<bool> {
        self.lookups.is_holiday(date).await
    }
}
