use std::num::NonZeroUsize;
use std::time::Duration;

use indexmap::IndexMap;

use tracing::warn;

use crate::error::{ErrorKind, ReadError, Result};
use crate::validator::Reading;

/// Default number of attempts of [`read_with_retry`].
pub const MAX_ATTEMPTS: NonZeroUsize = NonZeroUsize::new(10).unwrap();

/// Pause between two consecutive attempts of [`read_with_retry`].
pub const MIN_READ_INTERVAL: Duration = Duration::from_millis(2_500);

/// A sensor that can be read repeatedly.
pub trait Sensor {
    /// Performs a single read, verifying the checksum when
    /// `check_checksum` is set.
    ///
    /// # Errors
    ///
    /// Returns the [`ReadError`] classifying the failure.
    fn read(&mut self, check_checksum: bool) -> Result<Reading>;

    /// Waits `duration` before the next read.
    fn pause(&mut self, duration: Duration);
}

struct FailureRecord {
    // The first failure observed for its kind.
    error: ReadError,
    count: usize,
}

// Occurrences of each failure kind, in first-seen order.
#[derive(Default)]
struct FailureTally(IndexMap<ErrorKind, FailureRecord>);

impl FailureTally {
    fn record(&mut self, error: ReadError) {
        let _ = self
            .0
            .entry(error.kind())
            .and_modify(|record| record.count += 1)
            .or_insert(FailureRecord { error, count: 1 });
    }

    // Ties go to the kind observed first.
    fn most_frequent(self) -> Option<ReadError> {
        let mut best: Option<FailureRecord> = None;
        for record in self.0.into_values() {
            if best.as_ref().is_none_or(|best| record.count > best.count) {
                best = Some(record);
            }
        }
        best.map(|record| record.error)
    }
}

/// Reads `sensor` with checksum verification until a read succeeds or
/// `max_attempts` reads have failed.
///
/// Consecutive attempts are separated by [`MIN_READ_INTERVAL`]. The first
/// successful [`Reading`] is returned immediately.
///
/// # Errors
///
/// When every attempt fails, returns a failure of the most frequent
/// [`ErrorKind`] observed; the other failures are discarded.
pub fn read_with_retry<S>(sensor: &mut S, max_attempts: NonZeroUsize) -> Result<Reading>
where
    S: Sensor + ?Sized,
{
    let max_attempts = max_attempts.get();
    let mut tally = FailureTally::default();

    for attempt in 1..=max_attempts {
        match sensor.read(true) {
            Ok(reading) => return Ok(reading),
            Err(e) => {
                warn!("Read attempt {attempt}/{max_attempts} failed: {e}");
                tally.record(e);
            }
        }

        if attempt < max_attempts {
            sensor.pause(MIN_READ_INTERVAL);
        }
    }

    match tally.most_frequent() {
        Some(error) => Err(error),
        None => unreachable!("{max_attempts} failed attempts left no failure behind"),
    }
}
