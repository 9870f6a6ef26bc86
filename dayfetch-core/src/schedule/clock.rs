//! Wall-clock access for the scheduler loop.

use chrono::NaiveDateTime;
use std::time::Duration;

pub trait Clock {
    /// Current local date and time.
    fn now(&self) -> NaiveDateTime;

    fn sleep(&self, duration: Duration);
}

/// Local time, real sleeps.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
