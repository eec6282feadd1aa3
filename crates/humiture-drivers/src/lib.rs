//! `humiture-drivers` is a library crate that acquires humidity and
//! temperature readings from a `DHT22` / `AM2302` sensor by bit-banging its
//! single-wire protocol on a digital pin.
//!
//! The acquisition pipeline is split into small components:
//!
//! - [`pin::PinSignal`] abstracts the digital line
//! - [`timer::PulseTimer`] measures pulse widths with nanosecond resolution
//! - [`decoder::ProtocolDecoder`] performs the start/response handshake and
//!   decodes the 40-bit frame
//! - [`validator`] checks the frame checksum and the physical ranges
//! - [`reader::SensorReader`] runs one bounded acquisition on a dedicated
//!   worker thread and enforces the minimum interval between reads
//! - [`retry`] repeats acquisitions and reports the most frequent failure
//!
//! Pin backends are pluggable: any type implementing [`pin::PinSignal`] can
//! drive the sensor. A Raspberry Pi backend is provided behind the `rpi`
//! feature.

#![deny(missing_docs)]

/// The single-wire protocol decoder.
pub mod decoder;
/// Error management.
pub mod error;
/// Digital line abstraction.
pub mod pin;
/// Scheduling priority elevation for timing-critical sections.
pub mod priority;
/// Sensor reader owning the last-known-good state.
pub mod reader;
/// Bounded retries over sensor reads.
pub mod retry;
/// Monotonic pulse-width measurement.
pub mod timer;
/// Checksum and operating-range validation.
pub mod validator;

/// Raspberry Pi GPIO backend.
#[cfg(feature = "rpi")]
pub mod rpi;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ErrorKind, ReadError};
pub use reader::SensorReader;
pub use retry::{MAX_ATTEMPTS, Sensor, read_with_retry};
pub use validator::Reading;
