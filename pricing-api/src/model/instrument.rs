//! Defines the option instruments known to the remote pricing system.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// The option family an instrument belongs to in the remote catalog.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentType {
    /// European option.
    EO,
    /// Exchange traded option.
    ETO,
    /// Average (Asian) option.
    AO,
}

impl InstrumentType {
    /// Order in which the catalog partitions are searched when resolving a feed code.
    pub const LOOKUP_ORDER: [InstrumentType; 3] =
        [InstrumentType::EO, InstrumentType::ETO, InstrumentType::AO];

    /// The option-type string the pricing system expects on submitted prices.
    pub fn option_type_code(&self) -> &'static str {
        match self {
            InstrumentType::EO => "option-eo",
            InstrumentType::ETO => "option-eto",
            InstrumentType::AO => "option-ao",
        }
    }
}

impl fmt::Display for InstrumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstrumentType::EO => "EO",
            InstrumentType::ETO => "ETO",
            InstrumentType::AO => "AO",
        };
        write!(f, "{}", s)
    }
}

/// An option instrument from the primary destination's catalog.
///
/// The `code` is the identity: two instruments with the same code are the same
/// instrument, whatever their name or type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    instrument_type: InstrumentType,
    name: String,
    code: String,
}

impl Instrument {
    pub fn new(
        instrument_type: InstrumentType,
        name: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            instrument_type,
            name: name.into(),
            code: code.into(),
        }
    }

    pub fn instrument_type(&self) -> InstrumentType {
        self.instrument_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> &str {
        &self.code
    }
}

impl PartialEq for Instrument {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for Instrument {}

impl Hash for Instrument {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code.hash(state);
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {})", self.name, self.instrument_type, self.code)
    }
}
