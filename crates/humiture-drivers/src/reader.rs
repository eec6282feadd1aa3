use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::decoder::{ProtocolDecoder, StopFlag};
use crate::error::{ErrorKind, ReadError, Result};
use crate::pin::PinSignal;
use crate::retry::{self, Sensor};
use crate::timer::PulseTimer;
use crate::validator::{self, Reading};

/// Bounded wait for the decoder to deliver a frame.
pub const ACQUISITION_TIMEOUT: Duration = Duration::from_secs(2);

/// Minimum time between two read attempts enforced by
/// [`SensorReader::read`].
pub const RATE_LIMIT_INTERVAL: Duration = Duration::from_millis(2_000);

/// Phase a read is in, or ended in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No read has been attempted yet.
    Idle,
    /// Waiting for the decoder to deliver a frame.
    AwaitingFrame,
    /// Checking the checksum and the operating ranges.
    Validating,
    /// The last read produced a valid [`Reading`].
    Success,
    /// The last read failed.
    Failed,
}

// Outcome of the previous reads.
#[derive(Debug)]
struct ReaderState<I> {
    last_reading: Option<Reading>,
    last_attempt: Option<I>,
    phase: Phase,
}

/// A `DHT22` sensor reader.
///
/// Each [`read`](Self::read) runs one exchange on a dedicated worker
/// thread bounded by [`ACQUISITION_TIMEOUT`], and then validates the
/// decoded frame. The reader owns the pin: only one exchange is ever in
/// flight.
pub struct SensorReader<P, T>
where
    P: PinSignal,
    T: PulseTimer,
{
    pin: P,
    timer: T,
    acquisition_timeout: Duration,
    state: ReaderState<T::Instant>,
}

impl<P, T> SensorReader<P, T>
where
    P: PinSignal,
    T: PulseTimer,
{
    /// Creates a [`SensorReader`] for the sensor wired to `pin`.
    #[must_use]
    pub fn new(pin: P, timer: T) -> Self {
        Self {
            pin,
            timer,
            acquisition_timeout: ACQUISITION_TIMEOUT,
            state: ReaderState {
                last_reading: None,
                last_attempt: None,
                phase: Phase::Idle,
            },
        }
    }

    /// Returns the last successful [`Reading`], if any.
    #[must_use]
    pub const fn last_reading(&self) -> Option<Reading> {
        self.state.last_reading
    }

    /// Returns the [`Phase`] the last read ended in.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Performs a single read.
    ///
    /// The checksum is verified only when `check_checksum` is set.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::RateLimited`] if the previous attempt started less
    ///   than [`RATE_LIMIT_INTERVAL`] ago; the sensor is left untouched
    /// - [`ErrorKind::AcquisitionTimeout`] if no frame was decoded within
    ///   [`ACQUISITION_TIMEOUT`]
    /// - [`ErrorKind::ChecksumMismatch`] if the frame is corrupted
    /// - [`ErrorKind::OutOfRange`] if a value is outside the operating range
    pub fn read(&mut self, check_checksum: bool) -> Result<Reading> {
        let outcome = self.check_rate_limit().and_then(|()| {
            self.state.last_attempt = Some(self.timer.now());
            self.acquire(check_checksum)
        });

        match outcome {
            Ok(reading) => {
                self.state.last_reading = Some(reading);
                self.state.last_attempt = Some(self.timer.now());
                self.state.phase = Phase::Success;
                debug!("{reading}");
                Ok(reading)
            }
            Err(e) => {
                self.state.phase = Phase::Failed;
                Err(e)
            }
        }
    }

    /// Reads with checksum verification, retrying up to
    /// [`MAX_ATTEMPTS`](crate::retry::MAX_ATTEMPTS) times.
    ///
    /// # Errors
    ///
    /// Returns the most frequent failure if every attempt fails.
    pub fn read_with_retry(&mut self) -> Result<Reading> {
        retry::read_with_retry(self, retry::MAX_ATTEMPTS)
    }

    fn check_rate_limit(&self) -> Result<()> {
        let Some(last_attempt) = self.state.last_attempt else {
            return Ok(());
        };

        let elapsed = self.timer.elapsed(last_attempt);
        if elapsed < RATE_LIMIT_INTERVAL {
            return Err(ReadError::new(
                ErrorKind::RateLimited,
                format!(
                    "last read was {} ms ago, wait at least {} ms between reads",
                    elapsed.as_millis(),
                    RATE_LIMIT_INTERVAL.as_millis()
                ),
            ));
        }

        Ok(())
    }

    fn acquire(&mut self, check_checksum: bool) -> Result<Reading> {
        self.state.phase = Phase::AwaitingFrame;

        let stop_flag = StopFlag::new();
        let stop = &stop_flag;
        let (sender, receiver) = mpsc::sync_channel(1);
        let pin = &mut self.pin;
        let timer = &self.timer;
        let timeout = self.acquisition_timeout;

        // The scope joins the worker on every exit path, and the decoder
        // releases the line before the worker ends.
        let outcome = thread::scope(|scope| {
            // The worker owns the sender: the channel disconnects as soon
            // as the worker ends without a frame.
            let _worker = scope.spawn(move || {
                let frame = ProtocolDecoder::new(pin, timer, stop).decode();
                let _ = sender.send(frame);
            });

            let outcome = receiver.recv_timeout(timeout);
            if outcome.is_err() {
                stop.stop();
            }
            outcome
        });

        let frame = match outcome {
            Ok(Ok(frame)) => frame,
            Ok(Err(cancelled)) => {
                return Err(ReadError::new(
                    ErrorKind::AcquisitionTimeout,
                    cancelled.to_string(),
                ));
            }
            Err(RecvTimeoutError::Timeout) => {
                return Err(ReadError::new(
                    ErrorKind::AcquisitionTimeout,
                    format!("no frame received within {} ms", timeout.as_millis()),
                ));
            }
            // The worker ended without a frame: it panicked, and the scope
            // resumed that panic on exit.
            Err(RecvTimeoutError::Disconnected) => {
                unreachable!("the decoder worker ended without a frame")
            }
        };

        self.state.phase = Phase::Validating;
        validator::validate(&frame, check_checksum)
    }
}

impl<P, T> Sensor for SensorReader<P, T>
where
    P: PinSignal,
    T: PulseTimer,
{
    #[inline]
    fn read(&mut self, check_checksum: bool) -> Result<Reading> {
        SensorReader::read(self, check_checksum)
    }

    #[inline]
    fn pause(&mut self, duration: Duration) {
        self.timer.sleep(duration);
    }
}
