//! A source that needs no input files: every read yields the same two Brent calls
//! traded today. Used to exercise a deployment end to end.

use crate::calendar::start_of_month;
use crate::error::{Result, UploadError};
use crate::ingest::source::{InputSource, SourceBatch};
use async_trait::async_trait;
use chrono::{Days, Months, NaiveDate};
use log::debug;
use pricing::{Clock, RawRecord};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const DEMO_SOURCE_NAME: &str = "Demo input";
const DEMO_CODE: &str = "BRN";

pub struct DemoInputSource {
    clock: Arc<dyn Clock>,
}

impl DemoInputSource {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Two calls on the strip two months out, expiring six days before it starts.
    pub fn records(today: NaiveDate) -> Vec<RawRecord> {
        let month_start = start_of_month(today);
        let strip = month_start
            .checked_add_months(Months::new(2))
            .unwrap_or(month_start);
        let expiration = strip.checked_sub_days(Days::new(6)).unwrap_or(strip);

        [(Decimal::new(1233, 1), 64), (Decimal::new(1244, 1), 66)]
            .into_iter()
            .map(|(settlement, strike)| {
                RawRecord::new(
                    DEMO_CODE,
                    "C",
                    None,
                    today,
                    strip,
                    Some(expiration),
                    settlement,
                    Decimal::from(strike),
                    false,
                )
            })
            .collect()
    }
}

#[async_trait]
impl InputSource for DemoInputSource {
    fn name(&self) -> &str {
        DEMO_SOURCE_NAME
    }

    async fn read(&mut self, cancel: &CancellationToken) -> Result<SourceBatch> {
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }
        Ok(SourceBatch {
            description: "demo data".to_string(),
            records: Self::records(self.clock.today()),
        })
    }

    async fn report_outcome(&mut self, success: bool) -> Result<()> {
        debug!("{} delivery outcome: success={}", DEMO_SOURCE_NAME, success);
        Ok(())
    }
}
