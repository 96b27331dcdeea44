use crate::calendar::math::CalendarMath;
use crate::error::{Result, UploadError};
use chrono::NaiveDate;
use pricing::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// How the trade date read from a feed becomes the trade date(s) that get uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeDatePolicy {
    /// Upload with the date from the file.
    AsInFile,
    /// Upload against the working day after the date from the file.
    NextWorkingDay,
    /// Upload against today, moved forward to a working day.
    Today,
    /// Upload twice: with the date from the file, and against today (or the next
    /// working day when the file was published today).
    AsInFileAndToday,
}

impl FromStr for TradeDatePolicy {
    type Err = UploadError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "AsInFile" => Ok(TradeDatePolicy::AsInFile),
            "NextWorkingDay" => Ok(TradeDatePolicy::NextWorkingDay),
            "Today" => Ok(TradeDatePolicy::Today),
            "AsInFileAndToday" => Ok(TradeDatePolicy::AsInFileAndToday),
            other => Err(UploadError::Config(format!(
                "Unknown trade date policy: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for TradeDatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TradeDatePolicy::AsInFile => "AsInFile",
            TradeDatePolicy::NextWorkingDay => "NextWorkingDay",
            TradeDatePolicy::Today => "Today",
            TradeDatePolicy::AsInFileAndToday => "AsInFileAndToday",
        };
        write!(f, "{}", s)
    }
}

/// Expands a feed trade date into the dates prices are uploaded against.
#[derive(Clone)]
pub struct TradeDateMapper {
    policy: TradeDatePolicy,
    clock: Arc<dyn Clock>,
    calendar: CalendarMath,
}

impl TradeDateMapper {
    pub fn new(policy: TradeDatePolicy, clock: Arc<dyn Clock>, calendar: CalendarMath) -> Self {
        Self {
            policy,
            clock,
            calendar,
        }
    }

    pub fn policy(&self) -> TradeDatePolicy {
        self.policy
    }

    /// Maps one trade date.
    ///
    /// # Arguments
    ///
    /// * `trade_date` - The trade date read from the feed.
    ///
    /// # Returns
    ///
    /// * `Result<Vec<NaiveDate>>` - One date, or two for `AsInFileAndToday` (file date first).
    pub async fn map(&self, trade_date: NaiveDate) -> Result<Vec<NaiveDate>> {
        match self.policy {
            TradeDatePolicy::AsInFile => Ok(vec![trade_date]),
            TradeDatePolicy::NextWorkingDay => {
                Ok(vec![self.calendar.next_working_day(trade_date).await?])
            }
            TradeDatePolicy::Today => {
                let today = self.clock.today();
                Ok(vec![self.calendar.adjust_to_working_day(today).await?])
            }
            TradeDatePolicy::AsInFileAndToday => {
                let today = self.clock.today();
                // Published today: seed the next working day's price as well.
                let second = if trade_date == today {
                    self.calendar.next_working_day(today).await?
                } else {
                    self.calendar.adjust_to_working_day(today).await?
                };
                Ok(vec![trade_date, second])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::holidays::{BankHolidayLookup, HolidayCalendar};
    use async_trait::async_trait;
    use chrono::{DateTime, Local, TimeZone, Utc};

    struct MondayHoliday(NaiveDate);

    #[async_trait]
    impl HolidayCalendar for MondayHoliday {
        async fn is_holiday(&self, date: NaiveDate) -> Result<bool> {
            Ok(date == self.0)
        }
    }

    struct FixedToday(NaiveDate);

    impl Clock for FixedToday {
        fn now_local(&self) -> DateTime<Local> {
            Local
                .from_local_datetime(&self.0.and_hms_opt(12, 0, 0).unwrap())
                .unwrap()
        }

        fn now_utc(&self) -> DateTime<Utc> {
            Utc.from_utc_datetime(&self.0.and_hms_opt(12, 0, 0).unwrap())
        }

        fn today(&self) -> NaiveDate {
            self.0
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // Friday 2018-08-24, Saturday 2018-08-25, holiday Monday 2018-08-27
    fn mapper(policy: TradeDatePolicy, today: NaiveDate) -> TradeDateMapper {
        let lookup = BankHolidayLookup::new(Arc::new(MondayHoliday(ymd(2018, 8, 27))));
        TradeDateMapper::new(
            policy,
            Arc::new(FixedToday(today)),
            CalendarMath::new(Arc::new(lookup)),
        )
    }

    #[tokio::test]
    async fn test_as_in_file_and_today_the_day_after() {
        let m = mapper(TradeDatePolicy::AsInFileAndToday, ymd(2018, 8, 25));
        let dates = m.map(ymd(2018, 8, 24)).await.unwrap();
        assert_eq!(dates, vec![ymd(2018, 8, 24), ymd(2018, 8, 28)]);
    }

    #[tokio::test]
    async fn test_as_in_file_and_today_on_publication_day() {
        let m = mapper(TradeDatePolicy::AsInFileAndToday, ymd(2018, 8, 24));
        let dates = m.map(ymd(2018, 8, 24)).await.unwrap();
        assert_eq!(dates, vec![ymd(2018, 8, 24), ymd(2018, 8, 28)]);

        let m = mapper(TradeDatePolicy::AsInFileAndToday, ymd(2018, 8, 22));
        let dates = m.map(ymd(2018, 8, 22)).await.unwrap();
        assert_eq!(dates, vec![ymd(2018, 8, 22), ymd(2018, 8, 23)]);
    }

    #[tokio::test]
    async fn test_single_date_policies() {
        let trade_date = ymd(2018, 8, 24);
        let today = ymd(2018, 8, 26);

        let dates = mapper(TradeDatePolicy::AsInFile, today).map(trade_date).await.unwrap();
        assert_eq!(dates, vec![trade_date]);

        let dates = mapper(TradeDatePolicy::NextWorkingDay, today).map(trade_date).await.unwrap();
        assert_eq!(dates, vec![ymd(2018, 8, 28)]);

        let dates = mapper(TradeDatePolicy::Today, today).map(trade_date).await.unwrap();
        assert_eq!(dates, vec![ymd(2018, 8, 28)]);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "AsInFileAndToday".parse::<TradeDatePolicy>().unwrap(),
            TradeDatePolicy::AsInFileAndToday
        );
        let err = "Yesterday".parse::<TradeDatePolicy>().unwrap_err();
        assert!(matches!(err, UploadError::Config(_)));
    }
}
