use chrono::{DateTime, Local, NaiveDate, Utc};

/// Supplies the current time.
pub trait Clock: Send + Sync {
    fn now_local(&self) -> DateTime<Local>;

    fn now_utc(&self) -> DateTime<Utc>;

    /// The local calendar date.
    fn today(&self) -> NaiveDate {
        self.now_local().date_naive()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_local(&self) -> DateTime<Local> {
        Local::now()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
