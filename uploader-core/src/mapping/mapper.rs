use crate::calendar::TradeDateMapper;
use crate::error::Result;
use crate::mapping::lookup::InstrumentLookup;
use async_trait::async_trait;
use log::debug;
use pricing::{CanonicalRecord, OptionType, RawRecord};
use std::sync::Arc;

/// Supplies the instrument catalog, fetching it on first use.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn instruments(&self) -> Result<Arc<InstrumentLookup>>;
}

/// Turns feed records into canonical records.
#[derive(Clone)]
pub struct Mapper {
    dates: TradeDateMapper,
    default_pricing_group: String,
}

impl Mapper {
    pub fn new(dates: TradeDateMapper, default_pricing_group: impl Into<String>) -> Self {
        Self {
            dates,
            default_pricing_group: default_pricing_group.into(),
        }
    }

    /// Maps a batch of raw records.
    ///
    /// A record whose option type or instrument cannot be resolved is dropped. Every
    /// other record yields one canonical record per date produced by the trade-date
    /// policy. The catalog is only requested when there is something to map.
    pub async fn map(
        &self,
        records: &[RawRecord],
        catalog: &dyn CatalogSource,
    ) -> Result<Vec<CanonicalRecord>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let lookup = catalog.instruments().await?;

        let mut mapped = Vec::with_capacity(records.len());
        for record in records {
            let option_type = OptionType::from_contract_type(record.contract_type());
            let instrument = lookup.lookup(record.instrument_code());
            let (Some(option_type), Some(instrument)) = (option_type, instrument) else {
                debug!(
                    "Dropping unresolvable record {} / {:?}",
                    record.instrument_code(),
                    record.contract_type()
                );
                continue;
            };

            let pricing_group = record
                .pricing_group()
                .unwrap_or(&self.default_pricing_group);

            for trade_date in self.dates.map(record.trade_date()).await? {
                mapped.push(CanonicalRecord::new(
                    instrument.clone(),
                    option_type,
                    trade_date,
                    record.strip_date(),
                    record.expiration_date(),
                    record.settlement_price(),
                    record.strike_price(),
                    pricing_group,
                    record.is_bal_mo_or_cso(),
                ));
            }
        }
        Ok(mapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{BankHolidayLookup, CalendarMath, HolidayCalendar, TradeDatePolicy};
    use crate::error::UploadError;
    use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
    use pricing::{Clock, Instrument, InstrumentType};
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoHolidays;

    #[async_trait]
    impl HolidayCalendar for NoHolidays {
        async fn is_holiday(&self, _date: NaiveDate) -> Result<bool> {
            Ok(false)
        }
    }

    struct Today(NaiveDate);

    impl Clock for Today {
        fn now_local(&self) -> DateTime<Local> {
            Local
                .from_local_datetime(&self.0.and_hms_opt(9, 0, 0).unwrap())
                .unwrap()
        }

        fn now_utc(&self) -> DateTime<Utc> {
            Utc.from_utc_datetime(&self.0.and_hms_opt(9, 0, 0).unwrap())
        }

        fn today(&self) -> NaiveDate {
            self.0
        }
    }

    struct StaticCatalog {
        lookup: Arc<InstrumentLookup>,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl CatalogSource for StaticCatalog {
        async fn instruments(&self) -> Result<Arc<InstrumentLookup>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.lookup.clone())
        }
    }

    struct BrokenCatalog;

    #[async_trait]
    impl CatalogSource for BrokenCatalog {
        async fn instruments(&self) -> Result<Arc<InstrumentLookup>> {
            Err(UploadError::Parse("catalog unavailable".into()))
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn mapper(policy: TradeDatePolicy) -> Mapper {
        let calendar = CalendarMath::new(Arc::new(BankHolidayLookup::new(Arc::new(NoHolidays))));
        let dates = TradeDateMapper::new(policy, Arc::new(Today(ymd(2018, 7, 20))), calendar);
        Mapper::new(dates, "Default Group")
    }

    fn catalog() -> StaticCatalog {
        StaticCatalog {
            lookup: Arc::new(InstrumentLookup::new(vec![
                Instrument::new(InstrumentType::EO, "instrumentName1", "ins1"),
                Instrument::new(InstrumentType::EO, "instrumentName2", "ins2"),
            ])),
            fetches: AtomicUsize::new(0),
        }
    }

    fn raw(code: &str, contract_type: &str, pricing_group: Option<&str>) -> RawRecord {
        RawRecord::new(
            code,
            contract_type,
            pricing_group.map(str::to_string),
            ymd(2018, 7, 19),
            ymd(2018, 9, 1),
            None,
            dec!(1.23),
            dec!(69),
            false,
        )
    }

    #[tokio::test]
    async fn test_resolved_records_are_mapped() {
        let catalog = catalog();
        let records = vec![raw("ins1", "C", None), raw("ins2", "Put", Some("Group B"))];

        let mapped = mapper(TradeDatePolicy::AsInFile)
            .map(&records, &catalog)
            .await
            .unwrap();

        assert_eq!(mapped.len(), 2);
        assert_eq!(mapped[0].instrument().name(), "instrumentName1");
        assert_eq!(mapped[0].option_type(), OptionType::Call);
        assert_eq!(mapped[0].pricing_group(), "Default Group");
        assert_eq!(mapped[1].option_type(), OptionType::Put);
        assert_eq!(mapped[1].pricing_group(), "Group B");
        assert_eq!(catalog.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unresolvable_records_are_dropped() {
        let records = vec![
            raw("unknown", "C", None),
            raw("ins1", "F", None),
            raw("ins1", "", None),
            raw("ins2", "c", None),
        ];

        let mapped = mapper(TradeDatePolicy::AsInFile)
            .map(&records, &catalog())
            .await
            .unwrap();

        assert_eq!(mapped.len(), 1);
        assert_eq!(mapped[0].instrument().code(), "ins2");
    }

    #[tokio::test]
    async fn test_expansion_yields_two_records_per_raw_record() {
        let mapped = mapper(TradeDatePolicy::AsInFileAndToday)
            .map(&[raw("ins1", "C", None)], &catalog())
            .await
            .unwrap();

        let dates: Vec<_> = mapped.iter().map(|r| r.trade_date()).collect();
        assert_eq!(dates, vec![ymd(2018, 7, 19), ymd(2018, 7, 20)]);
        assert_eq!(mapped[0].strip_date(), mapped[1].strip_date());
        assert_eq!(mapped[0].settlement_price(), mapped[1].settlement_price());
    }

    #[tokio::test]
    async fn test_catalog_is_not_fetched_for_empty_input() {
        let mapped = mapper(TradeDatePolicy::AsInFile)
            .map(&[], &BrokenCatalog)
            .await
            .unwrap();
        assert!(mapped.is_empty());

        let err = mapper(TradeDatePolicy::AsInFile)
            .map(&[raw("ins1", "C", None)], &BrokenCatalog)
            .await;
        assert!(err.is_err());
    }
}
