// Simulated hardware shared by the unit tests.
//
// `SimLine` replays a waveform on the timeline of a `SimClock`: every
// sample advances the clock by `SAMPLE_STEP_NS`, so decoding is
// deterministic and independent of the host speed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::decoder::RawFrame;
use crate::pin::{Direction, Level, PinSignal};
use crate::timer::PulseTimer;

const SAMPLE_STEP_NS: u64 = 1_000;

#[derive(Debug, Clone, Default)]
pub(crate) struct SimClock(Arc<AtomicU64>);

impl SimClock {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn advance(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap();
        let _ = self.0.fetch_add(nanos, Ordering::SeqCst);
    }

    pub(crate) fn now_ns(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    fn advance_ns(&self, nanos: u64) -> u64 {
        self.0.fetch_add(nanos, Ordering::SeqCst) + nanos
    }
}

impl PulseTimer for SimClock {
    type Instant = u64;

    fn now(&self) -> u64 {
        self.now_ns()
    }

    fn elapsed_ns(&self, since: u64) -> u64 {
        self.now().saturating_sub(since)
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineEvent {
    Direction(Direction),
    Write(Level),
    Delay(u32),
}

#[derive(Debug)]
struct MonitorState {
    events: Vec<LineEvent>,
    reads: usize,
    direction: Direction,
    level: Level,
}

// Observes a `SimLine` after it has been moved into a reader.
#[derive(Debug, Clone)]
pub(crate) struct LineMonitor(Arc<Mutex<MonitorState>>);

impl LineMonitor {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(MonitorState {
            events: Vec::new(),
            reads: 0,
            direction: Direction::Input,
            level: Level::High,
        })))
    }

    fn state(&self) -> MutexGuard<'_, MonitorState> {
        self.0.lock().unwrap()
    }

    pub(crate) fn events(&self) -> Vec<LineEvent> {
        self.state().events.clone()
    }

    pub(crate) fn reads(&self) -> usize {
        self.state().reads
    }

    pub(crate) fn direction(&self) -> Direction {
        self.state().direction
    }

    pub(crate) fn level(&self) -> Level {
        self.state().level
    }
}

pub(crate) struct SimLine {
    clock: SimClock,
    // Consecutive `(level, duration in ns)` segments driven by the sensor.
    waveform: Vec<(Level, u64)>,
    // Level once the waveform is over: the pull-up keeps the line high.
    idle: Level,
    released_at: Option<u64>,
    monitor: LineMonitor,
}

impl SimLine {
    pub(crate) fn new(clock: &SimClock, waveform: Vec<(Level, u64)>) -> (Self, LineMonitor) {
        Self::with_idle(clock, waveform, Level::High)
    }

    pub(crate) fn for_frame(clock: &SimClock, bytes: [u8; 5]) -> (Self, LineMonitor) {
        Self::new(clock, frame_waveform(bytes))
    }

    pub(crate) fn stuck(clock: &SimClock, level: Level) -> (Self, LineMonitor) {
        Self::with_idle(clock, Vec::new(), level)
    }

    fn with_idle(
        clock: &SimClock,
        waveform: Vec<(Level, u64)>,
        idle: Level,
    ) -> (Self, LineMonitor) {
        let monitor = LineMonitor::new();
        let line = Self {
            clock: clock.clone(),
            waveform,
            idle,
            released_at: None,
            monitor: monitor.clone(),
        };
        (line, monitor)
    }

    fn level_at(&self, mut offset: u64) -> Level {
        for &(level, duration) in &self.waveform {
            if offset < duration {
                return level;
            }
            offset -= duration;
        }
        self.idle
    }
}

impl PinSignal for SimLine {
    fn set_direction(&mut self, direction: Direction) {
        let mut state = self.monitor.state();
        state.events.push(LineEvent::Direction(direction));
        state.direction = direction;
        // The sensor starts answering as soon as the host releases the line.
        self.released_at = match direction {
            Direction::Input => Some(self.clock.now()),
            Direction::Output => None,
        };
    }

    fn write(&mut self, level: Level) {
        let mut state = self.monitor.state();
        state.events.push(LineEvent::Write(level));
        state.level = level;
    }

    fn read(&mut self) -> Level {
        let now = self.clock.advance_ns(SAMPLE_STEP_NS);
        let mut state = self.monitor.state();
        state.reads += 1;
        match self.released_at {
            Some(released_at) => self.level_at(now - released_at),
            None => state.level,
        }
    }

    fn delay_ms(&mut self, ms: u32) {
        self.monitor.state().events.push(LineEvent::Delay(ms));
        self.clock.advance(Duration::from_millis(u64::from(ms)));
    }
}

// The sensor answer for a frame: response signal, 40 bits, trailing low.
pub(crate) fn frame_waveform(bytes: [u8; 5]) -> Vec<(Level, u64)> {
    let mut waveform = vec![(Level::High, 20_000), (Level::Low, 80_000), (Level::High, 80_000)];
    for byte in bytes {
        for bit in (0..8).rev() {
            let high = if (byte >> bit) & 1 == 1 { 70_000 } else { 26_000 };
            waveform.push((Level::Low, 50_000));
            waveform.push((Level::High, high));
        }
    }
    waveform.push((Level::Low, 50_000));
    waveform
}

pub(crate) fn checksummed(data: [u8; 4]) -> RawFrame {
    let checksum = data.iter().fold(0u8, |sum, byte| sum.wrapping_add(*byte));
    RawFrame::new([data[0], data[1], data[2], data[3], checksum])
}
