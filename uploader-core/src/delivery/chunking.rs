//! How a batch of records is cut into submissions.

use pricing::{BulkPrice, CanonicalRecord, Submission};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Submission style of a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UploadMethod {
    /// Fixed-size chunks, one row per record.
    #[default]
    Standard,
    /// One chunk per (instrument, strip date, pricing group, expiration date) group.
    Bulk,
}

impl UploadMethod {
    /// Cuts `records` into top-level chunks, keeping their order.
    pub fn chunk(self, records: Vec<CanonicalRecord>, chunk_size: usize) -> Vec<Vec<CanonicalRecord>> {
        match self {
            UploadMethod::Standard => fixed_chunks(records, chunk_size),
            UploadMethod::Bulk => bulk_groups(records),
        }
    }

    /// The submission carrying `chunk`, `None` for an empty chunk.
    pub fn submission(self, chunk: &[CanonicalRecord]) -> Option<Submission> {
        if chunk.is_empty() {
            return None;
        }
        match self {
            UploadMethod::Standard => Some(Submission::standard(chunk)),
            UploadMethod::Bulk => BulkPrice::from_records(chunk).map(Submission::Bulk),
        }
    }
}

impl fmt::Display for UploadMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadMethod::Standard => write!(f, "Standard"),
            UploadMethod::Bulk => write!(f, "Bulk"),
        }
    }
}

fn fixed_chunks(records: Vec<CanonicalRecord>, chunk_size: usize) -> Vec<Vec<CanonicalRecord>> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::with_capacity(records.len().div_ceil(chunk_size));
    let mut records = records.into_iter().peekable();
    while records.peek().is_some() {
        chunks.push(records.by_ref().take(chunk_size).collect());
    }
    chunks
}

type GroupKey = (String, chrono::NaiveDate, String, Option<chrono::NaiveDate>);

fn group_key(record: &CanonicalRecord) -> GroupKey {
    (
        record.instrument().code().to_string(),
        record.strip_date(),
        record.pricing_group().to_string(),
        record.expiration_date(),
    )
}

/// Groups in order of first appearance.
fn bulk_groups(records: Vec<CanonicalRecord>) -> Vec<Vec<CanonicalRecord>> {
    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut groups: Vec<Vec<CanonicalRecord>> = Vec::new();
    for record in records {
        let slot = *index.entry(group_key(&record)).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(record);
    }
    groups
}

/// Splits into a first half of `ceil(n/2)` and a second of `floor(n/2)` records.
pub fn split_in_two(mut records: Vec<CanonicalRecord>) -> (Vec<CanonicalRecord>, Vec<CanonicalRecord>) {
    let second = records.split_off(records.len().div_ceil(2));
    (records, second)
}
