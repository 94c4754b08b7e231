/// Abstraction over time sources.
/// Implementations: SystemTimeProvider (production), MockTimeProvider (testing).
pub trait TimeProvider {
    /// Current time in microseconds from an arbitrary epoch.
    fn now_us(&self) -> i64;

    /// Cooperatively yield for the given duration. The clock never asks for
    /// a negative sleep; implementations may ignore such calls.
    fn sleep_us(&self, us: i64);
}

/// System time provider using std::time::Instant.
pub struct SystemTimeProvider {
    start: std::time::Instant,
}

impl SystemTimeProvider {
    pub fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }
}

impl Default for SystemTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeProvider for SystemTimeProvider {
    fn now_us(&self) -> i64 {
        self.start.elapsed().as_micros() as i64
    }

    fn sleep_us(&self, us: i64) {
        if us > 0 {
            std::thread::sleep(std::time::Duration::from_micros(us as u64));
        }
    }
}

/// Mock time provider for deterministic testing. Sleeping advances the
/// simulated time, so a paced loop runs at full speed under test.
pub struct MockTimeProvider {
    current_us: std::cell::Cell<i64>,
}

impl MockTimeProvider {
    pub fn new() -> Self {
        Self {
            current_us: std::cell::Cell::new(0),
        }
    }

    pub fn set_time(&self, us: i64) {
        self.current_us.set(us);
    }

    pub fn advance(&self, delta_us: i64) {
        self.current_us.set(self.current_us.get() + delta_us);
    }
}

impl Default for MockTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeProvider for MockTimeProvider {
    fn now_us(&self) -> i64 {
        self.current_us.get()
    }

    fn sleep_us(&self, us: i64) {
        if us > 0 {
            self.advance(us);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_time_provider_advance() {
        let tp = MockTimeProvider::new();
        assert_eq!(tp.now_us(), 0);
        tp.advance(1_000_000);
        assert_eq!(tp.now_us(), 1_000_000);
        tp.sleep_us(500_000);
        assert_eq!(tp.now_us(), 1_500_000);
    }

    #[test]
    fn mock_time_provider_ignores_negative_sleep() {
        let tp = MockTimeProvider::new();
        tp.set_time(5_000_000);
        tp.sleep_us(-100);
        assert_eq!(tp.now_us(), 5_000_000);
    }

    #[test]
    fn system_time_provider_monotonic() {
        let tp = SystemTimeProvider::new();
        let t1 = tp.now_us();
        let t2 = tp.now_us();
        assert!(t2 >= t1);
    }
}
