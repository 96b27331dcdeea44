//! ICE end-of-day `.dat` files: pipe-delimited, US-style dates, headers with spaces.

use crate::error::{Result, UploadError};
use crate::ingest::feeds::{optional_decimal, required, Columns, FeedFormat};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use pricing::{OptionType, RawRecord};

const DATE_FORMAT: &str = "%m/%d/%Y";

#[derive(Debug, Clone, Copy, Default)]
pub struct IceDatFormat;

struct IceColumns {
    trade_date: usize,
    hub: usize,
    strip: usize,
    contract: usize,
    contract_type: usize,
    strike: usize,
    settlement_price: usize,
    expiration_date: usize,
}

impl IceColumns {
    fn resolve(headers: &StringRecord) -> Result<Self> {
        // "TRADE DATE" -> "tradedate"
        let columns = Columns::new(headers, |h| h.replace(' ', "").to_lowercase());
        Ok(Self {
            trade_date: columns.position("tradedate")?,
            hub: columns.position("hub")?,
            strip: columns.position("strip")?,
            contract: columns.position("contract")?,
            contract_type: columns.position("contracttype")?,
            strike: columns.position("strike")?,
            settlement_price: columns.position("settlementprice")?,
            expiration_date: columns.position("expirationdate")?,
        })
    }
}

impl FeedFormat for IceDatFormat {
    fn source_name(&self) -> &'static str {
        "ICE Dat file"
    }

    fn default_pattern(&self) -> &'static str {
        "*.dat"
    }

    fn parse(&self, contents: &str) -> Result<Vec<RawRecord>> {
        let mut reader = ReaderBuilder::new()
            .delimiter(b'|')
            .has_headers(true)
            .trim(Trim::All)
            .flexible(true)
            .from_reader(contents.trim_start().as_bytes());

        let columns = IceColumns::resolve(reader.headers()?)?;

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            let trade_date = parse_date(&row, columns.trade_date, "trade date")?;
            let strip_date = parse_date(&row, columns.strip, "strip")?;
            let expiration_date = parse_date(&row, columns.expiration_date, "expiration date")?;
            let strike = optional_decimal(&row, columns.strike, "strike")?;
            let settlement = optional_decimal(&row, columns.settlement_price, "settlement price")?;
            let contract_type = row.get(columns.contract_type).unwrap_or_default();

            // Futures rows have no strike
            let (Some(strike), Some(settlement)) = (strike, settlement) else {
                continue;
            };
            if OptionType::from_contract_type(contract_type).is_none() {
                continue;
            }

            let hub = row.get(columns.hub).unwrap_or_default();
            let contract = row.get(columns.contract).unwrap_or_default();
            records.push(RawRecord::new(
                map_contract_code(contract),
                contract_type,
                None,
                trade_date,
                strip_date,
                Some(expiration_date),
                settlement,
                strike,
                is_bal_mo_or_cso(hub),
            ));
        }
        Ok(records)
    }
}

fn parse_date(row: &StringRecord, position: usize, name: &str) -> Result<NaiveDate> {
    let value = required(row, position, name)?;
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| UploadError::Parse(format!("invalid {} {:?}: {}", name, value, e)))
}

/// Balance-of-month hubs contain "- End", calendar spreads contain " CSO".
fn is_bal_mo_or_cso(hub: &str) -> bool {
    let hub = hub.to_uppercase();
    hub.contains("- END") || hub.contains(" CSO")
}

fn map_contract_code(contract: &str) -> &str {
    match contract {
        "B" => "BRN",
        "T" => "WBS",
        "HOF" => "HO",
        other => other,
    }
}
