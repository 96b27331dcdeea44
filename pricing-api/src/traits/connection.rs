//! Defines the contract of a remote pricing system.
//!
//! A `PricingConnection` is one live session with a pricing endpoint. A `Connector`
//! creates sessions; the uploader recreates the session through it whenever a
//! connectivity problem makes the current one suspect.

use crate::model::instrument::Instrument;
use crate::model::submission::Submission;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use thiserror::Error;

/// Errors reported by a pricing endpoint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EndpointError {
    /// The endpoint could not be reached, or the call failed in transit.
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// The endpoint's contract no longer matches what this client sends.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The endpoint refused the submitted prices for a business reason.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Any other failure reported by the endpoint.
    #[error("Endpoint error: {0}")]
    Other(String),
}

impl EndpointError {
    /// The message reported by the endpoint, without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            EndpointError::Connectivity(m)
            | EndpointError::SchemaMismatch(m)
            | EndpointError::Rejected(m)
            | EndpointError::Other(m) => m,
        }
    }

    pub fn is_schema_mismatch(&self) -> bool {
        matches!(self, EndpointError::SchemaMismatch(_))
    }

    pub fn is_connectivity(&self) -> bool {
        matches!(self, EndpointError::Connectivity(_))
    }
}

#[async_trait]
pub trait PricingConnection: Send + Sync {
    /// Fetches every option instrument the endpoint knows about.
    ///
    /// # Returns
    ///
    /// * `Result<Vec<Instrument>, EndpointError>` - The catalog, in the endpoint's order.
    async fn fetch_instrument_catalog(&self) -> Result<Vec<Instrument>, EndpointError>;

    /// Submits one chunk of prices.
    ///
    /// # Arguments
    ///
    /// * `submission` - The prices, either one row per record or a bulk payload.
    async fn submit_prices(&self, submission: &Submission) -> Result<(), EndpointError>;

    /// Asks the endpoint whether `date` is a bank holiday.
    async fn is_holiday(&self, date: NaiveDate) -> Result<bool, EndpointError>;
}

/// Creates sessions with one pricing endpoint.
pub trait Connector: Send + Sync {
    /// Opens a fresh session. Connection failures surface on the first call made
    /// through the returned session.
    fn connect(&self) -> Arc<dyn PricingConnection>;
}
