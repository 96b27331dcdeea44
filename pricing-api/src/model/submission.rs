//! Payload shapes submitted to a pricing endpoint.
//!
//! A `Standard` submission carries one `PriceRow` per record. A `Bulk` submission
//! carries the fields a group of records shares once, plus a semicolon-delimited
//! `price_data` field with `date;price;strike;isCall` repeated for every record.

use crate::model::record::CanonicalRecord;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const PRICE_DATA_DATE_FORMAT: &str = "%Y-%m-%d";

/// One price as the pricing endpoint receives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub instrument: String,
    pub option_type: String,
    pub trade_date: NaiveDate,
    pub strip_date: NaiveDate,
    pub expiration_date: Option<NaiveDate>,
    pub settlement_price: Decimal,
    pub strike_price: Decimal,
    pub is_call: bool,
    pub pricing_group: String,
}

impl PriceRow {
    pub fn from_record(record: &CanonicalRecord) -> Self {
        Self {
            instrument: record.instrument().name().to_string(),
            option_type: record
                .instrument()
                .instrument_type()
                .option_type_code()
                .to_string(),
            trade_date: record.trade_date(),
            strip_date: record.strip_date(),
            expiration_date: record.expiration_date(),
            settlement_price: record.settlement_price().normalize(),
            strike_price: record.strike_price().normalize(),
            is_call: record.option_type().is_call(),
            pricing_group: record.pricing_group().to_string(),
        }
    }
}

/// Several prices that share instrument, strip, pricing group and expiration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkPrice {
    pub instrument: String,
    pub option_type: String,
    pub strip_date: NaiveDate,
    pub pricing_group: String,
    pub expiration_date: Option<NaiveDate>,
    pub price_data: String,
    pub count: usize,
}

impl BulkPrice {
    /// Builds the bulk payload of a group of records.
    ///
    /// The shared fields are taken from the first record; callers group records by
    /// (instrument, strip date, pricing group, expiration date) beforehand.
    /// Returns `None` for an empty group.
    pub fn from_records(records: &[CanonicalRecord]) -> Option<Self> {
        let first = records.first()?;
        let price_data = records
            .iter()
            .map(|r| {
                format!(
                    "{};{};{};{}",
                    r.trade_date().format(PRICE_DATA_DATE_FORMAT),
                    r.settlement_price().normalize(),
                    r.strike_price().normalize(),
                    r.option_type().is_call()
                )
            })
            .collect::<Vec<_>>()
            .join(";");

        Some(Self {
            instrument: first.instrument().name().to_string(),
            option_type: first
                .instrument()
                .instrument_type()
                .option_type_code()
                .to_string(),
            strip_date: first.strip_date(),
            pricing_group: first.pricing_group().to_string(),
            expiration_date: first.expiration_date(),
            price_data,
            count: records.len(),
        })
    }
}

/// A single call to a pricing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Submission {
    Standard(Vec<PriceRow>),
    Bulk(BulkPrice),
}

impl Submission {
    pub fn standard(records: &[CanonicalRecord]) -> Self {
        Submission::Standard(records.iter().map(PriceRow::from_record).collect())
    }

    pub fn is_bulk(&self) -> bool {
        matches!(self, Submission::Bulk(_))
    }

    /// Number of prices carried by this submission.
    pub fn record_count(&self) -> usize {
        match self {
            Submission::Standard(rows) => rows.len(),
            Submission::Bulk(bulk) => bulk.count,
        }
    }
}
