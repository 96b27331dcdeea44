//! A simulated pricing endpoint.
//!
//! Serves its instrument catalog from a JSON file, treats a fixed list of dates as
//! bank holidays and accepts every submission.

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, info, warn};
use pricing::{Connector, EndpointError, Environment, Instrument, PricingConnection, Submission};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uploader_core::settings::EndpointSettings;

struct PaperState {
    environment: Environment,
    catalog: Vec<Instrument>,
    holidays: HashSet<NaiveDate>,
    accepted: AtomicUsize,
}

#[derive(Clone)]
pub struct PaperConnector {
    state: Arc<PaperState>,
}

impl PaperConnector {
    pub fn new(environment: Environment, catalog: Vec<Instrument>, holidays: Vec<NaiveDate>) -> Self {
        Self {
            state: Arc::new(PaperState {
                environment,
                catalog,
                holidays: holidays.into_iter().collect(),
                accepted: AtomicUsize::new(0),
            }),
        }
    }

    pub fn from_settings(environment: Environment, settings: &EndpointSettings) -> anyhow::Result<Self> {
        let catalog = match &settings.catalog_file {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read instrument catalog {}", path.display()))?;
                let catalog: Vec<Instrument> = serde_json::from_str(&json)
                    .with_context(|| format!("Invalid instrument catalog {}", path.display()))?;
                info!(
                    "Paper endpoint {} serving {} instruments from {}",
                    environment,
                    catalog.len(),
                    path.display()
                );
                catalog
            }
            None => {
                warn!("Paper endpoint {} has no instrument catalog", environment);
                Vec::new()
            }
        };
        Ok(Self::new(environment, catalog, settings.holidays.clone()))
    }

    /// Prices accepted so far, across every session.
    pub fn accepted(&self) -> usize {
        self.state.accepted.load(Ordering::SeqCst)
    }
}

impl Connector for PaperConnector {
    fn connect(&self) -> Arc<dyn PricingConnection> {
        debug!("Opening paper session with {}", self.state.environment);
        Arc::new(PaperSession {
            state: self.state.clone(),
        })
    }
}

struct PaperSession {
    state: Arc<PaperState>,
}

#[async_trait]
impl PricingConnection for PaperSession {
    async fn fetch_instrument_catalog(&self) -> Result<Vec<Instrument>, EndpointError> {
        Ok(self.state.catalog.clone())
    }

    async fn submit_prices(&self, submission: &Submission) -> Result<(), EndpointError> {
        let count = submission.record_count();
        self.state.accepted.fetch_add(count, Ordering::SeqCst);
        info!(
            "Paper endpoint {} accepted {} {} price(s)",
            self.state.environment,
            count,
            if submission.is_bulk() { "bulk" } else { "standard" }
        );
        Ok(())
    }

    async fn is_holiday(&self, date: NaiveDate) -> Result<bool, EndpointError> {
        Ok(self.state.holidays.contains(&date))
    }
}
