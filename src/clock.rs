use std::collections::VecDeque;

use crate::traits::{SystemTimeProvider, TimeProvider};

/// Bounded rolling window of measured dt samples, for diagnostics.
pub const DT_HISTORY_SIZE: usize = 600;

/// Fixed-timestep pacer with drift correction.
///
/// Each tick compares the target playhead (`frame * target_dt`) against the
/// actual playhead (wall time since start) and sleeps only the positive
/// difference, so a late tick is followed by catch-up rather than
/// accumulating drift. The long-run average rate converges to the target
/// FPS.
pub struct GameClock<T: TimeProvider = SystemTimeProvider> {
    time: T,
    target_dt_us: i64,
    t0_us: i64,
    prev_us: i64,
    frame: u64,
    dt_history: VecDeque<f64>,
}

impl GameClock<SystemTimeProvider> {
    pub fn new(fps: u32) -> Self {
        Self::with_time(fps, SystemTimeProvider::new())
    }
}

impl<T: TimeProvider> GameClock<T> {
    pub fn with_time(fps: u32, time: T) -> Self {
        assert!(fps > 0, "fps must be positive");
        let t0_us = time.now_us();
        Self {
            time,
            target_dt_us: 1_000_000 / fps as i64,
            t0_us,
            prev_us: t0_us,
            frame: 1,
            dt_history: VecDeque::with_capacity(DT_HISTORY_SIZE),
        }
    }

    /// Pace out the remainder of the current frame and return the measured
    /// delta time in seconds.
    pub fn tick(&mut self) -> f64 {
        let now = self.time.now_us();
        let target_playhead = self.frame as i64 * self.target_dt_us;
        let actual_playhead = now - self.t0_us;
        let wait = target_playhead - actual_playhead;
        if wait > 0 {
            self.time.sleep_us(wait);
        }

        let now = self.time.now_us();
        let dt = (now - self.prev_us) as f64 / 1_000_000.0;
        if self.dt_history.len() == DT_HISTORY_SIZE {
            self.dt_history.pop_front();
        }
        self.dt_history.push_back(dt);
        self.prev_us = now;
        self.frame += 1;
        dt
    }

    /// Completed frame count; doubles as the loop's tick counter.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn now_us(&self) -> i64 {
        self.time.now_us()
    }

    pub fn target_dt(&self) -> f64 {
        self.target_dt_us as f64 / 1_000_000.0
    }

    pub fn dt_history(&self) -> impl Iterator<Item = f64> + '_ {
        self.dt_history.iter().copied()
    }

    /// Mean of the recent dt window, in seconds.
    pub fn mean_dt(&self) -> f64 {
        if self.dt_history.is_empty() {
            return self.target_dt();
        }
        self.dt_history.iter().sum::<f64>() / self.dt_history.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MockTimeProvider;

    #[test]
    fn paces_to_target_dt_when_on_time() {
        let mut clock = GameClock::with_time(100, MockTimeProvider::new());
        for _ in 0..50 {
            let dt = clock.tick();
            assert!((dt - 0.01).abs() < 1e-9, "dt was {dt}");
        }
        assert_eq!(clock.now_us(), 500_000);
    }

    #[test]
    fn no_negative_sleep_when_behind_schedule() {
        let mut clock = GameClock::with_time(100, MockTimeProvider::new());
        clock.tick();
        // A 100ms stall puts the loop far behind its playhead.
        clock.time.advance(100_000);
        let before = clock.now_us();
        clock.tick();
        // Proceeds immediately: no sleep, time does not move backwards.
        assert_eq!(clock.now_us(), before);
    }

    #[test]
    fn catches_up_after_a_slow_frame() {
        let mut clock = GameClock::with_time(100, MockTimeProvider::new());
        clock.tick();
        // One frame runs 35ms long.
        clock.time.advance(35_000);
        clock.tick();
        // Subsequent frames proceed without sleeping until the playhead is
        // caught up; long-run elapsed time converges to frame * target_dt.
        for _ in 0..10 {
            clock.tick();
        }
        let elapsed = clock.now_us();
        let ideal = (clock.frame() - 1) as i64 * 10_000;
        assert!((elapsed - ideal).abs() <= 35_000, "elapsed {elapsed} ideal {ideal}");
    }

    #[test]
    fn dt_history_is_bounded() {
        let mut clock = GameClock::with_time(100, MockTimeProvider::new());
        for _ in 0..(DT_HISTORY_SIZE + 20) {
            clock.tick();
        }
        assert_eq!(clock.dt_history().count(), DT_HISTORY_SIZE);
        assert!((clock.mean_dt() - 0.01).abs() < 1e-9);
    }
}
