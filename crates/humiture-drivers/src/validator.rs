use std::fmt;
use std::ops::{Range, RangeInclusive};

use crate::decoder::RawFrame;
use crate::error::{ErrorKind, ReadError, Result};

/// Operating humidity range in % RH.
pub const HUMIDITY_RANGE: RangeInclusive<f64> = 0.0..=100.0;
/// Operating temperature range in °C.
pub const TEMPERATURE_RANGE: Range<f64> = -40.0..85.0;

/// A validated humidity and temperature measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    humidity: f64,
    temperature: f64,
}

impl Reading {
    /// Relative humidity as a percentage (% RH).
    #[must_use]
    pub const fn humidity(&self) -> f64 {
        self.humidity
    }

    /// Temperature in degrees Celsius (°C).
    #[must_use]
    pub const fn temperature(&self) -> f64 {
        self.temperature
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Humidity={:.1}%, Temperature={:.1}°C",
            self.humidity, self.temperature
        )
    }
}

/// Converts a pair of frame bytes into a decimal value.
///
/// The bytes form a big-endian signed 16-bit integer holding ten times the
/// value.
#[inline]
#[must_use]
pub fn reading_value(high: u8, low: u8) -> f64 {
    f64::from(i16::from_be_bytes([high, low])) / 10.0
}

/// Checks that the checksum byte equals the low 8 bits of the sum of the
/// four data bytes.
///
/// # Errors
///
/// Returns a [`ErrorKind::ChecksumMismatch`] error on mismatch.
pub fn validate_checksum(frame: &RawFrame) -> Result<()> {
    let [hh, hl, th, tl, checksum] = frame.bytes();
    let sum = hh.wrapping_add(hl).wrapping_add(th).wrapping_add(tl);

    if sum == checksum {
        Ok(())
    } else {
        Err(ReadError::new(
            ErrorKind::ChecksumMismatch,
            format!("expected {sum:#04x}, found {checksum:#04x}"),
        ))
    }
}

/// Extracts the measurement from `frame` and checks it against the sensor
/// operating ranges.
///
/// Humidity is checked before temperature: the first offending value is
/// reported.
///
/// # Errors
///
/// Returns a [`ErrorKind::OutOfRange`] error if either value lies outside
/// its operating range.
pub fn validate_range(frame: &RawFrame) -> Result<Reading> {
    let (high, low) = frame.humidity();
    let humidity = reading_value(high, low);
    if !HUMIDITY_RANGE.contains(&humidity) {
        return Err(ReadError::new(
            ErrorKind::OutOfRange,
            format!("humidity {humidity:.1}% outside [0, 100]"),
        ));
    }

    let (high, low) = frame.temperature();
    let temperature = reading_value(high, low);
    if !TEMPERATURE_RANGE.contains(&temperature) {
        return Err(ReadError::new(
            ErrorKind::OutOfRange,
            format!("temperature {temperature:.1}°C outside [-40, 85)"),
        ));
    }

    Ok(Reading {
        humidity,
        temperature,
    })
}

/// Validates a decoded `frame`.
///
/// The checksum is verified only when `check_checksum` is set; range
/// validation always applies.
///
/// # Errors
///
/// See [`validate_checksum`] and [`validate_range`].
pub fn validate(frame: &RawFrame, check_checksum: bool) -> Result<Reading> {
    if check_checksum {
        validate_checksum(frame)?;
    }
    validate_range(frame)
}
