//! Filters that decide which canonical records may be delivered.

use crate::calendar::start_of_month;
use chrono::NaiveDate;
use log::error;
use pricing::CanonicalRecord;

const MAX_STALE_RECORDS_TO_LOG: usize = 50;

/// Whether a price falls inside the delivery window.
///
/// * An expiration date, when given, must be on or after both the trade date and today.
/// * The strip must start after the current month, or at the start of the current
///   month for balance-of-month and calendar-spread options.
pub fn is_valid_for_upload(
    today: NaiveDate,
    expiration_date: Option<NaiveDate>,
    trade_date: NaiveDate,
    strip_date: NaiveDate,
    is_bal_mo_or_cso: bool,
) -> bool {
    let valid_expiry = expiration_date
        .map(|expiry| trade_date <= expiry && expiry >= today)
        .unwrap_or(true);
    let month_start = start_of_month(today);
    let valid_strip = strip_date > month_start || (strip_date == month_start && is_bal_mo_or_cso);
    valid_expiry && valid_strip
}

pub fn filter_valid(records: Vec<CanonicalRecord>, today: NaiveDate) -> Vec<CanonicalRecord> {
    records
        .into_iter()
        .filter(|r| {
            is_valid_for_upload(
                today,
                r.expiration_date(),
                r.trade_date(),
                r.strip_date(),
                r.is_bal_mo_or_cso(),
            )
        })
        .collect()
}

/// Skips the first `records_to_skip` records and keeps at most `max_records` of the rest.
/// A zero disables the corresponding throttle.
pub fn apply_throttles(
    records: Vec<CanonicalRecord>,
    records_to_skip: usize,
    max_records: usize,
) -> Vec<CanonicalRecord> {
    let take = if max_records > 0 { max_records } else { usize::MAX };
    records.into_iter().skip(records_to_skip).take(take).collect()
}

/// Rejects a whole source batch when any of its records is older than the cutoff.
#[derive(Debug, Clone, Copy)]
pub struct StalenessGate {
    force_upload_old_trade_dates: bool,
}

impl StalenessGate {
    pub fn new(force_upload_old_trade_dates: bool) -> Self {
        Self {
            force_upload_old_trade_dates,
        }
    }

    /// Returns `true` when the batch may be delivered.
    ///
    /// # Arguments
    ///
    /// * `source_name` - The source the batch was read from.
    /// * `description` - What was read (file names), for the log.
    /// * `records` - The batch, after validity filtering and throttling.
    /// * `cutoff` - The previous working day; older trade dates are stale.
    pub fn admit(
        &self,
        source_name: &str,
        description: &str,
        records: &[CanonicalRecord],
        cutoff: NaiveDate,
    ) -> bool {
        if self.force_upload_old_trade_dates {
            return true;
        }

        let stale: Vec<&CanonicalRecord> = records
            .iter()
            .filter(|r| !r.is_trade_date_on_or_after(cutoff))
            .collect();
        if stale.is_empty() {
            return true;
        }

        let details = stale
            .iter()
            .take(MAX_STALE_RECORDS_TO_LOG)
            .map(|r| serde_json::to_string(r).unwrap_or_else(|e| format!("<{}>", e)))
            .collect::<Vec<_>>()
            .join(" , ");
        error!(
            "{} stale trade dates found for {} in {} and force_upload_old_trade_dates not set, upload aborted. Details: [ {} ]",
            stale.len(),
            source_name,
            description,
            details
        );
        false
    }
}
