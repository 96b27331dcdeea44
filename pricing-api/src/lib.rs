//! # Pricing API
//!
//! The vocabulary shared by the settlement-price uploader and the remote pricing system.
//!
//! ## Modules
//! - `model`: Instruments, raw and canonical price records, delivery counters and the
//!   payload shapes submitted to a pricing endpoint.
//! - `traits`: The collaborator seams (pricing connection, notification sink, clock) that
//!   concrete transports implement.

pub mod model;
pub mod traits;

pub use model::delivery::DeliveryResult;
pub use model::environment::Environment;
pub use model::instrument::{Instrument, InstrumentType};
pub use model::record::{CanonicalRecord, OptionType, RawRecord};
pub use model::submission::{BulkPrice, PriceRow, Submission};
pub use traits::clock::{Clock, SystemClock};
pub use traits::connection::{Connector, EndpointError, PricingConnection};
pub use traits::notification::{NotificationSink, SinkError};
