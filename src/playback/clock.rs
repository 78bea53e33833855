//! Time sources the transport reads but does not own
//!
//! [`AudioClock`] is the monotonically increasing audio-device clock that
//! note triggers are scheduled against. [`Timer`] is the fixed-interval
//! time-update source. Both are injected so tests can drive simulated time.

use std::cell::Cell;
use std::time::{Duration, Instant};

use crate::error::PlayerError;

/// Monotonic audio-device time in seconds.
pub trait AudioClock {
    fn now(&self) -> f64;

    /// Start or resume the device clock before scheduling.
    fn resume(&self) -> Result<(), PlayerError> {
        Ok(())
    }
}

/// Wall clock measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioClock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Hand-driven clock for deterministic tests and offline rendering.
///
/// # Example
/// ```
/// use kplay::playback::{AudioClock, ManualClock};
///
/// let clock = ManualClock::new();
/// clock.advance(1.5);
/// assert_eq!(clock.now(), 1.5);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<f64>,
    unavailable: Cell<bool>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, seconds: f64) {
        self.now.set(self.now.get() + seconds);
    }

    /// Jump to `seconds`. Going backwards is ignored so the clock stays monotonic.
    pub fn set(&self, seconds: f64) {
        if seconds > self.now.get() {
            self.now.set(seconds);
        }
    }

    /// Make the next `resume` calls fail, as a missing audio device would.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.set(unavailable);
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }

    fn resume(&self) -> Result<(), PlayerError> {
        if self.unavailable.get() {
            return Err(PlayerError::AudioDeviceError("audio clock cannot be resumed".to_string()));
        }
        Ok(())
    }
}

/// Periodic time-update source.
///
/// The transport only arms and disarms it. Whoever owns the event loop reads
/// [`Timer::interval`] and calls `Transport::tick` when it elapses.
pub trait Timer {
    fn start(&self, interval: Duration);
    fn cancel(&self);
    fn interval(&self) -> Option<Duration>;

    fn is_running(&self) -> bool {
        self.interval().is_some()
    }
}

/// Armed/disarmed flag with its period.
#[derive(Debug, Default)]
pub struct IntervalTimer {
    interval: Cell<Option<Duration>>,
    starts: Cell<usize>,
}

impl IntervalTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times the timer has been armed.
    pub fn start_count(&self) -> usize {
        self.starts.get()
    }
}

impl Timer for IntervalTimer {
    fn start(&self, interval: Duration) {
        self.interval.set(Some(interval));
        self.starts.set(self.starts.get() + 1);
    }

    fn cancel(&self) {
        self.interval.set(None);
    }

    fn interval(&self) -> Option<Duration> {
        self.interval.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_is_monotonic() {
        let clock = ManualClock::new();
        clock.set(4.0);
        clock.set(2.0);
        assert_eq!(clock.now(), 4.0);
        clock.advance(0.5);
        assert_eq!(clock.now(), 4.5);
    }

    #[test]
    fn test_unavailable_clock_fails_resume() {
        let clock = ManualClock::new();
        assert!(clock.resume().is_ok());
        clock.set_unavailable(true);
        assert!(matches!(clock.resume(), Err(PlayerError::AudioDeviceError(_))));
    }

    #[test]
    fn test_interval_timer() {
        let timer = IntervalTimer::new();
        assert!(!timer.is_running());
        timer.start(Duration::from_millis(100));
        assert_eq!(timer.interval(), Some(Duration::from_millis(100)));
        timer.cancel();
        assert!(!timer.is_running());
        assert_eq!(timer.start_count(), 1);
    }

    #[test]
    fn test_system_clock_advances() {
        let clock = SystemClock::new();
        let first = clock.now();
        assert!(clock.now() >= first);
    }
}
