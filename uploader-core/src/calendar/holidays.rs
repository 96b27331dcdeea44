use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use log::debug;
use std::sync::Arc;

/// Answers whether a date is a bank holiday.
#[async_trait]
pub trait HolidayCalendar: Send + Sync {
    async fn is_holiday(&self, date: NaiveDate) -> Result<bool>;
}

/// Memoizing cache over a (remote, slow) `HolidayCalendar`.
///
/// Entries never expire. Build a fresh lookup for every upload cycle so that calendar
/// changes on the remote side are picked up by the next cycle.
pub struct BankHolidayLookup {
    calendar: Arc<dyn HolidayCalendar>,
    cache: DashMap<NaiveDate, bool>,
}

impl BankHolidayLookup {
    pub fn new(calendar: Arc<dyn HolidayCalendar>) -> Self {
        Self {
            calendar,
            cache: DashMap::new(),
        }
    }

    pub async fn is_bank_holiday(&self, date: NaiveDate) -> Result<bool> {
        if let Some(cached) = self.cache.get(&date).map(|entry| *entry) {
            return Ok(cached);
        }

        let is_holiday = self.calendar.is_holiday(date).await?;
        debug!("Bank holiday lookup for {}: {}", date, is_holiday);
        self.cache.insert(date, is_holiday);
        Ok(is_holiday)
    }

    /// Number of dates resolved so far.
    pub fn cached_dates(&self) -> usize {
        self.cache.len()
    }
}
