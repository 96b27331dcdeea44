//! Parsers for the settlement-price feeds.

pub mod ice;
pub mod nymex;

use crate::error::{Result, UploadError};
use csv::StringRecord;
use pricing::RawRecord;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

pub use ice::IceDatFormat;
pub use nymex::NymexOptionFormat;

/// A settlement-price file format.
pub trait FeedFormat: Send + Sync {
    /// The source name used in logs and summary messages.
    fn source_name(&self) -> &'static str;

    /// File-name pattern of this feed's files.
    fn default_pattern(&self) -> &'static str;

    /// Parses a whole file, returning only the rows that hold a usable option price.
    ///
    /// A malformed file is an error: nothing from it is kept.
    fn parse(&self, contents: &str) -> Result<Vec<RawRecord>>;
}

/// Maps header names to column positions.
pub(crate) struct Columns {
    positions: HashMap<String, usize>,
}

impl Columns {
    pub(crate) fn new(headers: &StringRecord, normalize: impl Fn(&str) -> String) -> Self {
        let positions = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (normalize(h), i))
            .collect();
        Self { positions }
    }

    pub(crate) fn position(&self, name: &str) -> Result<usize> {
        self.positions
            .get(name)
            .copied()
            .ok_or_else(|| UploadError::Parse(format!("missing column {}", name)))
    }
}

/// A required field; empty is an error.
pub(crate) fn required<'r>(row: &'r StringRecord, position: usize, name: &str) -> Result<&'r str> {
    match row.get(position) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(UploadError::Parse(format!(
            "missing value for {} on line {}",
            name,
            line_of(row)
        ))),
    }
}

/// An optional decimal field; empty is `None`, garbage is an error.
pub(crate) fn optional_decimal(row: &StringRecord, position: usize, name: &str) -> Result<Option<Decimal>> {
    match row.get(position) {
        None | Some("") => Ok(None),
        Some(value) => Decimal::from_str(value).map(Some).map_err(|e| {
            UploadError::Parse(format!(
                "invalid {} {:?} on line {}: {}",
                name,
                value,
                line_of(row),
                e
            ))
        }),
    }
}

fn line_of(row: &StringRecord) -> u64 {
    row.position().map(|p| p.line()).unwrap_or_default()
}
