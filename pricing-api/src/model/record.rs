//! Price records, before and after mapping onto the pricing system's catalog.
//!
//! A `RawRecord` is what a feed parser extracts from one row of a settlement file.
//! A `CanonicalRecord` is what gets delivered: the instrument is resolved, the option
//! type is known and the trade date has been through the configured date policy.

use crate::model::instrument::Instrument;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionType {
    Put,
    Call,
}

impl OptionType {
    /// Resolves the option type from a feed's contract-type column.
    ///
    /// Only the first character matters, case-insensitively: `P...` is a put and
    /// `C...` is a call. Anything else (including an empty string) is unresolved.
    pub fn from_contract_type(contract_type: &str) -> Option<Self> {
        match contract_type.chars().next()?.to_ascii_uppercase() {
            'P' => Some(OptionType::Put),
            'C' => Some(OptionType::Call),
            _ => None,
        }
    }

    pub fn is_call(&self) -> bool {
        matches!(self, OptionType::Call)
    }
}

/// A feed-specific row, as parsed from an input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    instrument_code: String,
    contract_type: String,
    pricing_group: Option<String>,
    trade_date: NaiveDate,
    strip_date: NaiveDate,
    expiration_date: Option<NaiveDate>,
    settlement_price: Decimal,
    strike_price: Decimal,
    is_bal_mo_or_cso: bool,
}

impl RawRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        instrument_code: impl Into<String>,
        contract_type: impl Into<String>,
        pricing_group: Option<String>,
        trade_date: NaiveDate,
        strip_date: NaiveDate,
        expiration_date: Option<NaiveDate>,
        settlement_price: Decimal,
        strike_price: Decimal,
        is_bal_mo_or_cso: bool,
    ) -> Self {
        Self {
            instrument_code: instrument_code.into(),
            contract_type: contract_type.into(),
            pricing_group,
            trade_date,
            strip_date,
            expiration_date,
            settlement_price,
            strike_price,
            is_bal_mo_or_cso,
        }
    }

    pub fn instrument_code(&self) -> &str {
        &self.instrument_code
    }

    pub fn contract_type(&self) -> &str {
        &self.contract_type
    }

    pub fn pricing_group(&self) -> Option<&str> {
        self.pricing_group.as_deref()
    }

    pub fn trade_date(&self) -> NaiveDate {
        self.trade_date
    }

    pub fn strip_date(&self) -> NaiveDate {
        self.strip_date
    }

    pub fn expiration_date(&self) -> Option<NaiveDate> {
        self.expiration_date
    }

    pub fn settlement_price(&self) -> Decimal {
        self.settlement_price
    }

    pub fn strike_price(&self) -> Decimal {
        self.strike_price
    }

    pub fn is_bal_mo_or_cso(&self) -> bool {
        self.is_bal_mo_or_cso
    }
}

/// A price record ready for delivery to a pricing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    instrument: Instrument,
    option_type: OptionType,
    trade_date: NaiveDate,
    strip_date: NaiveDate,
    expiration_date: Option<NaiveDate>,
    settlement_price: Decimal,
    strike_price: Decimal,
    pricing_group: String,
    is_bal_mo_or_cso: bool,
}

impl CanonicalRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        instrument: Instrument,
        option_type: OptionType,
        trade_date: NaiveDate,
        strip_date: NaiveDate,
        expiration_date: Option<NaiveDate>,
        settlement_price: Decimal,
        strike_price: Decimal,
        pricing_group: impl Into<String>,
        is_bal_mo_or_cso: bool,
    ) -> Self {
        Self {
            instrument,
            option_type,
            trade_date,
            strip_date,
            expiration_date,
            settlement_price,
            strike_price,
            pricing_group: pricing_group.into(),
            is_bal_mo_or_cso,
        }
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn option_type(&self) -> OptionType {
        self.option_type
    }

    pub fn trade_date(&self) -> NaiveDate {
        self.trade_date
    }

    pub fn strip_date(&self) -> NaiveDate {
        self.strip_date
    }

    pub fn expiration_date(&self) -> Option<NaiveDate> {
        self.expiration_date
    }

    pub fn settlement_price(&self) -> Decimal {
        self.settlement_price
    }

    pub fn strike_price(&self) -> Decimal {
        self.strike_price
    }

    pub fn pricing_group(&self) -> &str {
        &self.pricing_group
    }

    pub fn is_bal_mo_or_cso(&self) -> bool {
        self.is_bal_mo_or_cso
    }

    /// True when the trade date is not older than `cutoff`.
    pub fn is_trade_date_on_or_after(&self, cutoff: NaiveDate) -> bool {
        self.trade_date >= cutoff
    }
}
