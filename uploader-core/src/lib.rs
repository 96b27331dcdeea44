//! # Uploader Core
//!
//! Reads option settlement prices from exchange files and delivers them to one or
//! more pricing endpoints.
//!
//! ## Modules
//! - `ingest`: Feed parsers, the input-directory poller and file stability detection.
//! - `calendar`: Bank holidays, working-day arithmetic and trade-date policies.
//! - `mapping`: Instrument resolution and the gates deciding what may be delivered.
//! - `delivery`: Chunking, retry policies and the adaptive delivery engine.
//! - `orchestrator`: Upload cycles and the per-destination delivery queues.
//! - `notify`: Delivery summaries and notification sinks.
//! - `settings`: Service configuration.

pub mod calendar;
pub mod delivery;
pub mod error;
pub mod ingest;
pub mod mapping;
pub mod notify;
pub mod orchestrator;
pub mod settings;

#[cfg(any(test, feature = "test-utils"))]
pub mod testkit;

pub use error::{Result, UploadError};
pub use orchestrator::{shared_source, Destination, Orchestrator, SharedSource};
