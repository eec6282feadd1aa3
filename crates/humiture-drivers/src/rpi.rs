//! A [`PinSignal`] backend for the Raspberry Pi GPIO header, built on
//! [`rppal`].
//!
//! Pins are addressed with BCM numbers: the wiringPi pin 5 is BCM 24.

use std::thread;
use std::time::Duration;

use rppal::gpio::{Gpio, IoPin, Mode};

use crate::pin::{Direction, Level, PinSignal};

pub use rppal::gpio::Error;

/// A Raspberry Pi GPIO pin driving a sensor data line.
#[derive(Debug)]
pub struct RpiPin {
    pin: IoPin,
}

impl RpiPin {
    /// Acquires the BCM pin `bcm` and drives it high (idle).
    ///
    /// # Errors
    ///
    /// Fails if the GPIO peripheral cannot be accessed or the pin is
    /// already in use.
    pub fn new(bcm: u8) -> Result<Self, Error> {
        let mut pin = Gpio::new()?.get(bcm)?.into_io(Mode::Output);
        pin.set_high();
        Ok(Self { pin })
    }
}

impl PinSignal for RpiPin {
    #[inline]
    fn set_direction(&mut self, direction: Direction) {
        self.pin.set_mode(match direction {
            Direction::Input => Mode::Input,
            Direction::Output => Mode::Output,
        });
    }

    #[inline]
    fn write(&mut self, level: Level) {
        self.pin.write(match level {
            Level::Low => rppal::gpio::Level::Low,
            Level::High => rppal::gpio::Level::High,
        });
    }

    #[inline]
    fn read(&mut self) -> Level {
        match self.pin.read() {
            rppal::gpio::Level::Low => Level::Low,
            rppal::gpio::Level::High => Level::High,
        }
    }

    #[inline]
    fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}
