//! Canonical mapping: instrument resolution, trade-date expansion and the delivery gate.

pub mod gate;
pub mod lookup;
pub mod mapper;

pub use gate::{apply_throttles, filter_valid, is_valid_for_upload, StalenessGate};
pub use lookup::InstrumentLookup;
pub use mapper::{CatalogSource, Mapper};
