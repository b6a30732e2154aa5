//! Frame timing utilities.

use std::time::Instant;

/// Monotonic per-frame delta clock.
///
/// Call [`FrameTimer::tick`] once per loop iteration to get the seconds
/// elapsed since the previous tick. The first tick reports the time since
/// construction.
pub struct FrameTimer {
    last: Instant,
}

impl FrameTimer {
    /// Start the timer now.
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    /// Seconds since the previous tick (or since construction).
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let delta = now.duration_since(self.last).as_secs_f32();
        self.last = now;
        delta
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_is_monotonic_and_non_negative() {
        let mut timer = FrameTimer::new();
        let a = timer.tick();
        let b = timer.tick();
        assert!(a >= 0.0);
        assert!(b >= 0.0);
    }
}
