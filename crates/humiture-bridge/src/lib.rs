//! The `humiture-bridge` library crate republishes the readings of a
//! `DHT22` sensor to an `MQTT` broker.
//!
//! At every cycle the sensor is read through the bounded-retry loop of
//! [`humiture_drivers`], and a successful reading is published as two
//! plain-text values:
//!
//! - `<prefix>/temperature` in degrees Celsius
//! - `<prefix>/humidity` in percent of relative humidity
//!
//! A cycle whose reads all fail is logged and skipped; the next cycle tries
//! again.
//!
//! Sensor reads busy-wait on the data line, so they run on the blocking
//! thread pool of `tokio` while the `MQTT` event loop keeps running on the
//! asynchronous executor.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// Command line configuration.
pub mod config;
/// Error management.
pub mod error;
/// `MQTT` publishing of sensor values.
pub mod publisher;
/// The periodic acquire-then-publish cycle.
pub mod relay;
