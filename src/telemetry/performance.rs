//! Performance timing, ported from the teacher's `core::utils::PerformanceTimer`.

use log::debug;
use std::time::Instant;

/// Times a named operation and logs its duration at `debug` level when dropped
/// explicitly via [`PerformanceTimer::finish`].
pub struct PerformanceTimer {
    start: Instant,
    operation: String,
}

impl PerformanceTimer {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            operation: operation.into(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Log the elapsed time and return it.
    pub fn finish(self) -> u64 {
        let elapsed = self.elapsed_ms();
        debug!("{} took {}ms", self.operation, elapsed);
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn timer_reports_nonzero_elapsed() {
        let timer = PerformanceTimer::new("test-op");
        sleep(Duration::from_millis(5));
        assert!(timer.finish() >= 5);
    }
}
