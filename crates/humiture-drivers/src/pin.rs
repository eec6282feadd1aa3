/// Logic level of a digital line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Logic low.
    Low,
    /// Logic high.
    High,
}

/// Direction of a digital line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The host samples the line.
    Input,
    /// The host drives the line.
    Output,
}

/// A single digital pin used as the sensor data line.
///
/// All operations except [`delay_ms`](PinSignal::delay_ms) are expected to
/// complete in well under a microsecond. Hardware failures after a
/// successful initialization are not modelled: a backend either
/// constructs successfully or not at all.
///
/// The pin is exclusively owned by the in-flight acquisition, hence the
/// [`Send`] bound: the decoder runs on its own worker thread.
pub trait PinSignal: Send {
    /// Sets the line direction.
    fn set_direction(&mut self, direction: Direction);

    /// Drives the line to the given level.
    ///
    /// Only meaningful when the direction is [`Direction::Output`].
    fn write(&mut self, level: Level);

    /// Samples the current line level.
    fn read(&mut self) -> Level;

    /// Blocks the current thread for at least `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);

    /// Returns `true` when the line is at `level`.
    #[inline]
    fn is(&mut self, level: Level) -> bool {
        self.read() == level
    }
}

impl<P: PinSignal + ?Sized> PinSignal for &mut P {
    #[inline]
    fn set_direction(&mut self, direction: Direction) {
        (**self).set_direction(direction);
    }

    #[inline]
    fn write(&mut self, level: Level) {
        (**self).write(level);
    }

    #[inline]
    fn read(&mut self) -> Level {
        (**self).read()
    }

    #[inline]
    fn delay_ms(&mut self, ms: u32) {
        (**self).delay_ms(ms);
    }
}
