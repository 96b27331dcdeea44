use crate::calendar::holidays::BankHolidayLookup;
use crate::error::Result;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::sync::Arc;

/// First day of the month containing `date`.
pub fn start_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Working-day arithmetic over weekends and the bank holidays of a lookup.
#[derive(Clone)]
pub struct CalendarMath {
    holidays: Arc<BankHolidayLookup>,
}

impl CalendarMath {
    pub fn new(holidays: Arc<BankHolidayLookup>) -> Self {
        Self { holidays }
    }

    pub async fn is_holiday(&self, date: NaiveDate) -> Result<bool> {
        self.holidays.is_bank_holiday(date).await
    }

    /// Weekends are never looked up in the holiday calendar.
    pub async fn is_working_day(&self, date: NaiveDate) -> Result<bool> {
        if is_weekend(date) {
            return Ok(false);
        }
        Ok(!self.is_holiday(date).await?)
    }

    pub async fn previous_working_day(&self, date: NaiveDate) -> Result<NaiveDate> {
        self.step_to_working_day(date, -1).await
    }

    pub async fn next_working_day(&self, date: NaiveDate) -> Result<NaiveDate> {
        self.step_to_working_day(date, 1).await
    }

    /// `date` itself when it is a working day, the next working day otherwise.
    pub async fn adjust_to_working_day(&self, date: NaiveDate) -> Result<NaiveDate> {
        if self.is_working_day(date).await? {
            Ok(date)
        } else {
            self.next_working_day(date).await
        }
    }

    async fn step_to_working_day(&self, date: NaiveDate, step: i64) -> Result<NaiveDate> {
        let mut current = date;
        loop {
            current += Duration::days(step);
            if self.is_working_day(current).await? {
                return Ok(current);
            }
        }
    }
}
