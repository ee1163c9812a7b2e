//! Frame timing.

use std::time::{Duration, Instant};

/// Upper bound on a single reported frame delta.
///
/// Long stalls (window drag, minimized surface) would otherwise feed a huge
/// step into the simulation.
pub const MAX_FRAME_DELTA: Duration = Duration::from_millis(250);

/// Measures the time between consecutive frames.
#[derive(Debug)]
pub struct FrameTimer {
    start: Instant,
    last_tick: Instant,
    frame_count: u64,
}

impl FrameTimer {
    /// Creates a timer whose first tick is measured from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
            frame_count: 0,
        }
    }

    /// Time since the timer was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Number of ticks so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Advances to a new frame and returns the clamped delta in seconds.
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> f32 {
        let delta = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        self.frame_count += 1;
        delta.min(MAX_FRAME_DELTA).as_secs_f32()
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
    fn test_tick_counts_frames() {
        let mut timer = FrameTimer::new();
        timer.tick();
        timer.tick();
        assert_eq!(timer.frame_count(), 2);
    }

    #[test]
    fn test_tick_reports_elapsed_delta() {
        let mut timer = FrameTimer::new();
        let base = timer.last_tick;
        let delta = timer.tick_at(base + Duration::from_millis(16));
        assert!((delta - 0.016).abs() < 1e-6);
    }

    #[test]
    fn test_tick_clamps_long_stalls() {
        let mut timer = FrameTimer::new();
        let base = timer.last_tick;
        let delta = timer.tick_at(base + Duration::from_secs(5));
        assert_eq!(delta, MAX_FRAME_DELTA.as_secs_f32());
    }
}
