//! # Single-wire protocol decoder
//!
//! This module drives one physical exchange with the `DHT22` sensor and
//! turns the pulse widths on the data line into a 5-byte frame.
//!
//! The exchange is made of three phases:
//!
//! 1. **Start signal**: the host pulls the line low for at least 10 ms and
//!    then releases it.
//! 2. **Response**: the sensor pulls the line low for ~80 µs and then high
//!    for ~80 µs.
//! 3. **Data**: 40 bits, each one a ~50 µs low period followed by a high
//!    pulse whose width encodes the bit value: ~26 µs for `0`, ~70 µs
//!    for `1`.
//!
//! Every wait is a tight polling loop on the pin level. No wait enforces a
//! timeout on its own: the caller bounds the whole exchange and aborts it
//! through a [`StopFlag`], which every polling loop checks.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::pin::{Direction, Level, PinSignal};
use crate::priority;
use crate::timer::PulseTimer;

/// Width of the longest high pulse still decoded as a `0` bit, in
/// nanoseconds.
pub const LONGEST_ZERO_NS: u64 = 50_000;

// The host holds the line low for at least this long to wake the sensor.
const START_SIGNAL_LOW_MS: u32 = 10;
// Bits in a frame: 2 humidity bytes, 2 temperature bytes, 1 checksum byte.
const FRAME_BITS: usize = 40;

/// The five bytes captured from one exchange.
///
/// Layout: humidity high, humidity low, temperature high, temperature low,
/// checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrame([u8; 5]);

impl RawFrame {
    /// Creates a [`RawFrame`] from its five bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 5]) -> Self {
        Self(bytes)
    }

    /// Returns the five bytes of the frame.
    #[must_use]
    pub const fn bytes(&self) -> [u8; 5] {
        self.0
    }

    /// Returns the humidity bytes: `(high, low)`.
    #[must_use]
    pub const fn humidity(&self) -> (u8, u8) {
        (self.0[0], self.0[1])
    }

    /// Returns the temperature bytes: `(high, low)`.
    #[must_use]
    pub const fn temperature(&self) -> (u8, u8) {
        (self.0[2], self.0[3])
    }

    /// Returns the checksum byte.
    #[must_use]
    pub const fn checksum(&self) -> u8 {
        self.0[4]
    }
}

/// The exchange was aborted through its [`StopFlag`] before a full frame
/// was decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("the exchange was cancelled before the frame was complete")]
pub struct Cancelled;

/// A cooperative stop request shared between a decoder and its caller.
#[derive(Debug, Default)]
pub struct StopFlag(AtomicBool);

impl StopFlag {
    /// Creates a cleared [`StopFlag`].
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Requests the decoder to stop as soon as possible.
    #[inline]
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns `true` once a stop has been requested.
    #[inline]
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// Leaves the line driven high (idle, end of transmission) whenever it goes
// out of scope, whatever path the exchange took.
struct IdleOnDrop<P: PinSignal>(P);

impl<P: PinSignal> IdleOnDrop<P> {
    fn new(mut pin: P) -> Self {
        release(&mut pin);
        Self(pin)
    }
}

impl<P: PinSignal> Deref for IdleOnDrop<P> {
    type Target = P;

    fn deref(&self) -> &P {
        &self.0
    }
}

impl<P: PinSignal> DerefMut for IdleOnDrop<P> {
    fn deref_mut(&mut self) -> &mut P {
        &mut self.0
    }
}

impl<P: PinSignal> Drop for IdleOnDrop<P> {
    fn drop(&mut self) {
        release(&mut self.0);
    }
}

#[inline]
fn release<P: PinSignal>(pin: &mut P) {
    pin.set_direction(Direction::Output);
    pin.write(Level::High);
}

/// Decodes a single bit from the width of its high pulse.
#[inline]
#[must_use]
pub const fn decode_bit(high_ns: u64) -> u8 {
    if high_ns > LONGEST_ZERO_NS { 1 } else { 0 }
}

/// The `DHT22` protocol decoder.
///
/// A decoder performs exactly one exchange: [`decode`](Self::decode)
/// consumes it.
pub struct ProtocolDecoder<'a, P, T>
where
    P: PinSignal,
    T: PulseTimer,
{
    line: IdleOnDrop<P>,
    timer: &'a T,
    stop: &'a StopFlag,
}

impl<'a, P, T> ProtocolDecoder<'a, P, T>
where
    P: PinSignal,
    T: PulseTimer,
{
    /// Creates a [`ProtocolDecoder`] owning `pin` for one exchange.
    ///
    /// The line is driven high immediately so the start signal always
    /// begins from the idle level.
    pub fn new(pin: P, timer: &'a T, stop: &'a StopFlag) -> Self {
        Self {
            line: IdleOnDrop::new(pin),
            timer,
            stop,
        }
    }

    /// Runs the exchange and returns the decoded [`RawFrame`].
    ///
    /// The calling thread is elevated to the highest available scheduling
    /// priority while the exchange runs. The line is left driven high on
    /// return.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if the [`StopFlag`] is raised before the last
    /// bit is decoded.
    pub fn decode(mut self) -> Result<RawFrame, Cancelled> {
        let _priority = priority::elevate();

        self.send_start_signal();
        self.wait_for_response()?;
        self.read_frame()
    }

    fn send_start_signal(&mut self) {
        self.line.set_direction(Direction::Output);
        self.line.write(Level::Low);
        self.line.delay_ms(START_SIGNAL_LOW_MS);
        self.line.write(Level::High);
    }

    fn wait_for_response(&mut self) -> Result<(), Cancelled> {
        self.line.set_direction(Direction::Input);

        // Line released, until the sensor pulls it down.
        self.wait_while(Level::High)?;
        // Sensor response: ~80 µs low, then ~80 µs high.
        self.wait_while(Level::Low)?;
        self.wait_while(Level::High)
    }

    fn read_frame(&mut self) -> Result<RawFrame, Cancelled> {
        let mut bytes = [0u8; 5];

        for i in 0..FRAME_BITS {
            // The low period preceding every bit is not timed.
            self.wait_while(Level::Low)?;

            let start = self.timer.now();
            self.wait_while(Level::High)?;
            let high_ns = self.timer.elapsed_ns(start);

            // Bits are transmitted MSB first.
            bytes[i / 8] <<= 1;
            bytes[i / 8] |= decode_bit(high_ns);
        }

        Ok(RawFrame::new(bytes))
    }

    #[inline]
    fn wait_while(&mut self, level: Level) -> Result<(), Cancelled> {
        loop {
            if self.stop.is_stopped() {
                return Err(Cancelled);
            }
            if !self.line.is(level) {
                return Ok(());
            }
        }
    }
}
