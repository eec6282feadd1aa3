use std::time::{Duration, Instant};

/// A monotonic clock used to measure pulse widths and read intervals.
///
/// The resolution must be finer than the bit-discrimination threshold
/// (50 µs), otherwise `0` and `1` bits cannot be told apart.
pub trait PulseTimer: Sync {
    /// An opaque point in time.
    type Instant: Copy + Send;

    /// Returns the current instant.
    fn now(&self) -> Self::Instant;

    /// Returns the nanoseconds elapsed since `since`.
    fn elapsed_ns(&self, since: Self::Instant) -> u64;

    /// Blocks the current thread for `duration`.
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    /// Returns the time elapsed since `since` as a [`Duration`].
    #[inline]
    fn elapsed(&self, since: Self::Instant) -> Duration {
        Duration::from_nanos(self.elapsed_ns(since))
    }
}

/// A [`PulseTimer`] backed by [`std::time::Instant`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicTimer;

impl PulseTimer for MonotonicTimer {
    type Instant = Instant;

    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn elapsed_ns(&self, since: Instant) -> u64 {
        // Saturates after ~584 years.
        u64::try_from(since.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}
