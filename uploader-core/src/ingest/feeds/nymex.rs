//! NYMEX/CME option settlement `.s.csv` files: comma-delimited, quoted, ISO dates.

use crate::error::{Result, UploadError};
use crate::ingest::feeds::{optional_decimal, required, Columns, FeedFormat};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use pricing::RawRecord;
use rust_decimal::Decimal;

const DATE_FORMAT: &str = "%Y-%m-%d";
const OPTION_SECURITY_TYPE: &str = "OOF";

/// Settlement price the exchange publishes for deep out-of-the-money options.
const SETTLED_OUT_OF_THE_MONEY: i64 = 9_999_999;

#[derive(Debug, Clone, Copy, Default)]
pub struct NymexOptionFormat;

struct NymexColumns {
    business_date: usize,
    id: usize,
    strike: usize,
    security_type: usize,
    maturity: usize,
    put_call: usize,
    settlement_price: usize,
}

impl NymexColumns {
    fn resolve(headers: &StringRecord) -> Result<Self> {
        let columns = Columns::new(headers, str::to_string);
        Ok(Self {
            business_date: columns.position("BizDt")?,
            id: columns.position("ID")?,
            strike: columns.position("StrkPx")?,
            security_type: columns.position("SecTyp")?,
            maturity: columns.position("MMY")?,
            put_call: columns.position("PutCall")?,
            settlement_price: columns.position("SettlePrice")?,
        })
    }
}

impl FeedFormat for NymexOptionFormat {
    fn source_name(&self) -> &'static str {
        "Nymex Option File"
    }

    fn default_pattern(&self) -> &'static str {
        "*.s.csv"
    }

    fn parse(&self, contents: &str) -> Result<Vec<RawRecord>> {
        let mut reader = ReaderBuilder::new()
            .delimiter(b',')
            .has_headers(true)
            .trim(Trim::All)
            .flexible(true)
            .from_reader(contents.trim_start().as_bytes());

        let columns = NymexColumns::resolve(reader.headers()?)?;

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            let business_date = required(&row, columns.business_date, "BizDt")?;
            let trade_date = NaiveDate::parse_from_str(business_date, DATE_FORMAT).map_err(|e| {
                UploadError::Parse(format!("invalid BizDt {:?}: {}", business_date, e))
            })?;
            let strip_date = strip_date(required(&row, columns.maturity, "MMY")?)?;
            let put_call = put_call(row.get(columns.put_call).unwrap_or_default())?;
            let strike = optional_decimal(&row, columns.strike, "StrkPx")?;
            let settlement = optional_decimal(&row, columns.settlement_price, "SettlePrice")?;
            let security_type = row.get(columns.security_type).unwrap_or_default();

            let (Some(is_call), Some(strike), Some(settlement)) = (put_call, strike, settlement) else {
                continue;
            };
            if security_type != OPTION_SECURITY_TYPE {
                continue;
            }

            // Symbols match the pricing system's codes, no remapping
            let code = row.get(columns.id).unwrap_or_default();
            records.push(RawRecord::new(
                code,
                if is_call { "C" } else { "P" },
                None,
                trade_date,
                strip_date,
                None,
                normalize_settlement(settlement),
                strike,
                false,
            ));
        }
        Ok(records)
    }
}

/// MMY is either `yyyyMM` (first of the month) or `yyyyMMdd`.
fn strip_date(mmy: &str) -> Result<NaiveDate> {
    let invalid = || UploadError::Parse(format!("invalid MMY {:?}", mmy));
    let value: u32 = mmy.parse().map_err(|_| invalid())?;
    let digits = value.to_string();
    let full = match digits.len() {
        6 => format!("{}01", digits),
        8 => digits,
        _ => return Err(invalid()),
    };
    NaiveDate::parse_from_str(&full, "%Y%m%d").map_err(|_| invalid())
}

fn put_call(value: &str) -> Result<Option<bool>> {
    match value.to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "1" | "true" => Ok(Some(true)),
        "0" | "false" => Ok(Some(false)),
        other => Err(UploadError::Parse(format!("invalid PutCall {:?}", other))),
    }
}

/// Out-of-the-money options are uploaded at 0.01.
fn normalize_settlement(price: Decimal) -> Decimal {
    if price >= Decimal::from(SETTLED_OUT_OF_THE_MONEY) {
        Decimal::new(1, 2)
    } else {
        price
    }
}
