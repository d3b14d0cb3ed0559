use std::time::Duration;

use tracing::debug;

/// Delay before the very first tick.
pub const DEFAULT_INITIAL_INTERVAL: Duration = Duration::from_millis(50);

/// Holds the schedule of the tick loop. The loop itself does the waiting through
/// [Clock](crate::utils::clock::Clock), the timer only decides how long.
#[cfg_attr(test, mockall::automock)]
pub trait Timer {
    fn interval(&self) -> Duration;

    fn set_interval(&mut self, interval: Duration);

    fn is_enabled(&self) -> bool;

    fn stop(&mut self);
}

pub struct IntervalTimer {
    interval: Duration,
    enabled: bool,
}

impl IntervalTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            enabled: true,
        }
    }
}

impl Default for IntervalTimer {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_INTERVAL)
    }
}

impl Timer for IntervalTimer {
    fn interval(&self) -> Duration {
        self.interval
    }

    fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn stop(&mut self) {
        if self.enabled {
            debug!("Stopped tick timer");
        }
        self.enabled = false;
    }
}
