//! Calendar-aware date handling: the bank-holiday cache, working-day arithmetic and
//! the trade-date policies built on top of them.

pub mod holidays;
pub mod math;
pub mod trade_date;

pub use holidays::{BankHolidayLookup, HolidayCalendar};
pub use math::{is_weekend, start_of_month, CalendarMath};
pub use trade_date::{TradeDateMapper, TradeDatePolicy};
