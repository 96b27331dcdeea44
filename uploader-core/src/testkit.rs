//! In-memory collaborators for tests.

use crate::error::{self, UploadError};
use crate::ingest::{FileSystem, InputSource, SourceBatch};
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, Utc};
use glob::Pattern;
use pricing::{
    CanonicalRecord, Clock, Connector, EndpointError, Instrument, InstrumentType,
    NotificationSink, OptionType, PricingConnection, RawRecord, SinkError, Submission,
};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// An ETO instrument named after its code.
pub fn instrument(code: &str) -> Instrument {
    Instrument::new(InstrumentType::ETO, code, code)
}

/// A call traded on 2018-07-02, priced 1.5 at strike 70, pricing group "ICE".
pub fn canonical(code: &str, strip_date: NaiveDate) -> CanonicalRecord {
    CanonicalRecord::new(
        instrument(code),
        OptionType::Call,
        ymd(2018, 7, 2),
        strip_date,
        None,
        Decimal::new(15, 1),
        Decimal::from(70),
        "ICE",
        false,
    )
}

/// A raw call priced 1.5 at strike 70.
pub fn raw(code: &str, trade_date: NaiveDate, strip_date: NaiveDate) -> RawRecord {
    RawRecord::new(
        code,
        "C",
        None,
        trade_date,
        strip_date,
        None,
        Decimal::new(15, 1),
        Decimal::from(70),
        false,
    )
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

/// A scripted answer, consumed before the fake's default behaviour applies.
#[derive(Debug, Clone)]
pub enum Scripted {
    Succeed,
    Fail(EndpointError),
}

#[derive(Default)]
struct EndpointState {
    catalog: Vec<Instrument>,
    holidays: HashSet<NaiveDate>,
    submit_script: VecDeque<Scripted>,
    catalog_script: VecDeque<Scripted>,
    holiday_script: VecDeque<Scripted>,
    max_accepted_chunk: Option<usize>,
    failing_submissions: Option<EndpointError>,
    rejected_instruments: Vec<(String, String)>,
    submissions: Vec<Submission>,
    connects: usize,
    catalog_fetches: usize,
    holiday_lookups: usize,
}

/// A pricing endpoint kept in memory. Clones share state, as do all the sessions it
/// hands out.
#[derive(Clone, Default)]
pub struct FakeConnector {
    state: Arc<Mutex<EndpointState>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_catalog(&self, catalog: Vec<Instrument>) {
        lock(&self.state).catalog = catalog;
    }

    pub fn set_holidays(&self, holidays: Vec<NaiveDate>) {
        lock(&self.state).holidays = holidays.into_iter().collect();
    }

    pub fn push_submit(&self, answer: Scripted) {
        lock(&self.state).submit_script.push_back(answer);
    }

    pub fn push_catalog(&self, answer: Scripted) {
        lock(&self.state).catalog_script.push_back(answer);
    }

    pub fn push_holiday(&self, answer: Scripted) {
        lock(&self.state).holiday_script.push_back(answer);
    }

    /// Fails every submission with `error` once the script is used up.
    pub fn fail_all_submissions(&self, error: EndpointError) {
        lock(&self.state).failing_submissions = Some(error);
    }

    /// Rejects every submission carrying more than `max` prices.
    pub fn reject_submissions_larger_than(&self, max: usize) {
        lock(&self.state).max_accepted_chunk = Some(max);
    }

    /// Rejects every submission containing a price for `instrument_name`.
    pub fn reject_instrument(&self, instrument_name: &str, message: &str) {
        lock(&self.state)
            .rejected_instruments
            .push((instrument_name.to_string(), message.to_string()));
    }

    /// Every submission attempt, failed ones included.
    pub fn submissions(&self) -> Vec<Submission> {
        lock(&self.state).submissions.clone()
    }

    pub fn connect_count(&self) -> usize {
        lock(&self.state).connects
    }

    pub fn catalog_fetches(&self) -> usize {
        lock(&self.state).catalog_fetches
    }

    pub fn holiday_lookups(&self) -> usize {
        lock(&self.state).holiday_lookups
    }
}

impl Connector for FakeConnector {
    fn connect(&self) -> Arc<dyn PricingConnection> {
        lock(&self.state).connects += 1;
        Arc::new(FakeConnection {
            state: self.state.clone(),
        })
    }
}

struct FakeConnection {
    state: Arc<Mutex<EndpointState>>,
}

fn instruments_of(submission: &Submission) -> Vec<&str> {
    match submission {
        Submission::Standard(rows) => rows.iter().map(|r| r.instrument.as_str()).collect(),
        Submission::Bulk(bulk) => vec![bulk.instrument.as_str()],
    }
}

#[async_trait]
impl PricingConnection for FakeConnection {
    async fn fetch_instrument_catalog(&self) -> Result<Vec<Instrument>, EndpointError> {
        let mut state = lock(&self.state);
        state.catalog_fetches += 1;
        match state.catalog_script.pop_front() {
            Some(Scripted::Fail(e)) => Err(e),
            _ => Ok(state.catalog.clone()),
        }
    }

    async fn submit_prices(&self, submission: &Submission) -> Result<(), EndpointError> {
        let mut state = lock(&self.state);
        state.submissions.push(submission.clone());
        match state.submit_script.pop_front() {
            Some(Scripted::Fail(e)) => return Err(e),
            Some(Scripted::Succeed) => return Ok(()),
            None => {}
        }

        if let Some(e) = &state.failing_submissions {
            return Err(e.clone());
        }
        if let Some(max) = state.max_accepted_chunk {
            if submission.record_count() > max {
                return Err(EndpointError::Rejected(format!(
                    "Too many prices in one request: {}",
                    submission.record_count()
                )));
            }
        }
        let instruments = instruments_of(submission);
        if let Some((_, message)) = state
            .rejected_instruments
            .iter()
            .find(|(name, _)| instruments.contains(&name.as_str()))
        {
            return Err(EndpointError::Rejected(message.clone()));
        }
        Ok(())
    }

    async fn is_holiday(&self, date: NaiveDate) -> Result<bool, EndpointError> {
        let mut state = lock(&self.state);
        state.holiday_lookups += 1;
        match state.holiday_script.pop_front() {
            Some(Scripted::Fail(e)) => Err(e),
            _ => Ok(state.holidays.contains(&date)),
        }
    }
}

#[derive(Default)]
struct FileState {
    files: BTreeMap<PathBuf, String>,
    size_overrides: BTreeMap<PathBuf, u64>,
    failing_sizes: HashSet<PathBuf>,
    fail_listing: bool,
    listing_calls: usize,
}

/// A file system kept in memory.
#[derive(Default)]
pub struct InMemoryFileSystem {
    state: Mutex<FileState>,
}

impl InMemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, contents: &str) {
        lock(&self.state)
            .files
            .insert(path.as_ref().to_path_buf(), contents.to_string());
    }

    /// Reports `size` instead of the content length, to simulate a file being written.
    pub fn override_size(&self, path: impl AsRef<Path>, size: u64) {
        lock(&self.state)
            .size_overrides
            .insert(path.as_ref().to_path_buf(), size);
    }

    pub fn fail_size_of(&self, path: impl AsRef<Path>, fail: bool) {
        let mut state = lock(&self.state);
        let path = path.as_ref().to_path_buf();
        if fail {
            state.failing_sizes.insert(path);
        } else {
            state.failing_sizes.remove(&path);
        }
    }

    pub fn fail_listing(&self, fail: bool) {
        lock(&self.state).fail_listing = fail;
    }

    pub fn listing_calls(&self) -> usize {
        lock(&self.state).listing_calls
    }

    pub fn remove(&self, path: impl AsRef<Path>) {
        lock(&self.state).files.remove(path.as_ref());
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        lock(&self.state).files.contains_key(path.as_ref())
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        lock(&self.state).files.keys().cloned().collect()
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{} not found", path.display()))
}

#[async_trait]
impl FileSystem for InMemoryFileSystem {
    async fn list_matching(&self, directory: &Path, pattern: &Pattern) -> io::Result<Vec<PathBuf>> {
        let mut state = lock(&self.state);
        state.listing_calls += 1;
        if state.fail_listing {
            return Err(io::Error::other("directory unavailable"));
        }
        Ok(state
            .files
            .keys()
            .filter(|p| p.parent() == Some(directory))
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| pattern.matches(n))
            })
            .cloned()
            .collect())
    }

    async fn file_size(&self, path: &Path) -> io::Result<u64> {
        let state = lock(&self.state);
        if state.failing_sizes.contains(path) {
            return Err(io::Error::other("file is locked"));
        }
        let contents = state.files.get(path).ok_or_else(|| not_found(path))?;
        Ok(state
            .size_overrides
            .get(path)
            .copied()
            .unwrap_or(contents.len() as u64))
    }

    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        lock(&self.state)
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| not_found(path))
    }

    async fn exists(&self, path: &Path) -> bool {
        lock(&self.state).files.contains_key(path)
    }

    async fn move_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut state = lock(&self.state);
        let contents = state.files.remove(from).ok_or_else(|| not_found(from))?;
        state.files.insert(to.to_path_buf(), contents);
        Ok(())
    }
}

/// A clock stopped at noon UTC of one day.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    today: NaiveDate,
}

impl FixedClock {
    pub fn on(today: NaiveDate) -> Self {
        Self { today }
    }
}

impl Clock for FixedClock {
    fn now_local(&self) -> DateTime<Local> {
        self.now_utc().with_timezone(&Local)
    }

    fn now_utc(&self) -> DateTime<Utc> {
        self.today
            .and_hms_opt(12, 0, 0)
            .unwrap_or_default()
            .and_utc()
    }

    fn today(&self) -> NaiveDate {
        self.today
    }
}

/// Keeps every message it is sent. Once closed it refuses further messages.
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<(String, bool)>>,
    closed: Mutex<bool>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(String, bool)> {
        lock(&self.messages).clone()
    }

    pub fn is_closed(&self) -> bool {
        *lock(&self.closed)
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send_message(&self, text: &str, is_primary: bool) -> Result<(), SinkError> {
        if *lock(&self.closed) {
            return Err(SinkError(format!("sink closed, dropping: {}", text)));
        }
        lock(&self.messages).push((text.to_string(), is_primary));
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        *lock(&self.closed) = true;
        Ok(())
    }
}

/// Outcomes reported to a `StaticSource`, readable after the source is handed over.
#[derive(Clone, Default)]
pub struct OutcomeLog(Arc<Mutex<Vec<bool>>>);

impl OutcomeLog {
    pub fn outcomes(&self) -> Vec<bool> {
        lock(&self.0).clone()
    }
}

/// A source that yields a fixed batch on its first read and nothing afterwards, or on
/// every read when built with `repeating`.
///
/// Like a file source, only outcomes for data it handed out are recorded.
pub struct StaticSource {
    name: String,
    description: String,
    pending: Vec<RawRecord>,
    repeat: bool,
    awaiting_outcome: bool,
    outcomes: OutcomeLog,
    failing_cleanup: bool,
}

impl StaticSource {
    pub fn new(name: &str, records: Vec<RawRecord>) -> Self {
        Self {
            name: name.to_string(),
            description: format!("{} test input", name),
            pending: records,
            repeat: false,
            awaiting_outcome: false,
            outcomes: OutcomeLog::default(),
            failing_cleanup: false,
        }
    }

    /// Hands out the same batch on every read.
    pub fn repeating(mut self) -> Self {
        self.repeat = true;
        self
    }

    /// Makes `report_outcome` fail after recording the outcome.
    pub fn with_failing_cleanup(mut self) -> Self {
        self.failing_cleanup = true;
        self
    }

    pub fn outcome_log(&self) -> OutcomeLog {
        self.outcomes.clone()
    }
}

#[async_trait]
impl InputSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&mut self, cancel: &CancellationToken) -> error::Result<SourceBatch> {
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }
        let records = if self.repeat {
            self.pending.clone()
        } else {
            std::mem::take(&mut self.pending)
        };
        self.awaiting_outcome |= !records.is_empty();
        Ok(SourceBatch {
            description: self.description.clone(),
            records,
        })
    }

    async fn report_outcome(&mut self, success: bool) -> error::Result<()> {
        if !std::mem::take(&mut self.awaiting_outcome) {
            return Ok(());
        }
        lock(&self.outcomes.0).push(success);
        if self.failing_cleanup {
            return Err(UploadError::Io(not_found(Path::new(&self.description))));
        }
        Ok(())
    }
}
