/// Elapsed-time capability owned by a session.
///
/// A clock counts whole seconds while running. `start` on a running clock is
/// a no-op, so at most one timer is ever active for a session.
pub trait Clock {
    fn start(&mut self);

    fn stop(&mut self);

    /// Stops the clock and zeroes the count.
    fn reset(&mut self);

    fn elapsed_seconds(&self) -> u64;

    fn is_running(&self) -> bool;
}

/// Clock advanced by its owner, for tests and frame-driven front ends.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    elapsed: u64,
    running: bool,
    starts: u32,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances by `seconds` if running.
    pub fn advance(&mut self, seconds: u64) {
        if self.running {
            self.elapsed = self.elapsed.saturating_add(seconds);
        }
    }

    /// How many times the clock actually transitioned to running.
    pub fn starts(&self) -> u32 {
        self.starts
    }
}

impl Clock for ManualClock {
    fn start(&mut self) {
        if !self.running {
            self.running = true;
            self.starts += 1;
        }
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn reset(&mut self) {
        self.running = false;
        self.elapsed = 0;
    }

    fn elapsed_seconds(&self) -> u64 {
        self.elapsed
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_only_counts_while_running() {
        let mut clock = ManualClock::new();
        clock.advance(3);
        assert_eq!(clock.elapsed_seconds(), 0);

        clock.start();
        clock.start();
        clock.advance(2);
        clock.stop();
        clock.advance(5);

        assert_eq!(clock.elapsed_seconds(), 2);
        assert_eq!(clock.starts(), 1);

        clock.reset();
        assert_eq!(clock.elapsed_seconds(), 0);
        assert!(!clock.is_running());
    }
}
