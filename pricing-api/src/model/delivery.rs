use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Outcome counters of delivering price records to one destination.
///
/// Results from independent deliveries combine with `+`; `DeliveryResult::empty()` is
/// the identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeliveryResult {
    successes: usize,
    ignored: usize,
    failures: usize,
}

impl DeliveryResult {
    pub fn new(successes: usize, ignored: usize, failures: usize) -> Self {
        Self {
            successes,
            ignored,
            failures,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn all_succeeded(count: usize) -> Self {
        Self::new(count, 0, 0)
    }

    pub fn single_success() -> Self {
        Self::new(1, 0, 0)
    }

    pub fn single_ignored() -> Self {
        Self::new(0, 1, 0)
    }

    pub fn single_failure() -> Self {
        Self::new(0, 0, 1)
    }

    pub fn successes(&self) -> usize {
        self.successes
    }

    pub fn ignored(&self) -> usize {
        self.ignored
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Number of records this result accounts for.
    pub fn total(&self) -> usize {
        self.successes + self.ignored + self.failures
    }

    /// A delivery succeeded when nothing failed; ignored records do not count against it.
    pub fn succeeded(&self) -> bool {
        self.failures == 0
    }
}

impl Add for DeliveryResult {
    type Output = DeliveryResult;

    fn add(self, rhs: DeliveryResult) -> DeliveryResult {
        DeliveryResult::new(
            self.successes + rhs.successes,
            self.ignored + rhs.ignored,
            self.failures + rhs.failures,
        )
    }
}

impl AddAssign for DeliveryResult {
    fn add_assign(&mut self, rhs: DeliveryResult) {
        *self = *self + rhs;
    }
}

impl Sum for DeliveryResult {
    fn sum<I: Iterator<Item = DeliveryResult>>(iter: I) -> Self {
        iter.fold(DeliveryResult::empty(), Add::add)
    }
}

impl fmt::Display for DeliveryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} successes, {} ignored, {} failures",
            self.successes, self.ignored, self.failures
        )
    }
}
