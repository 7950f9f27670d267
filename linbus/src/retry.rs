//! Bounded retry and polling with a wall-clock deadline.
//!
//! Devices that are busy (an EEPROM in its internal write cycle, a monitor
//! mid-conversion) stop acknowledging for a few milliseconds. A
//! [`RetryPolicy`] re-runs an operation while it fails with a transient
//! [`Error::Bus`] and gives up once the deadline has passed.

use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::tracing::prelude::*;

pub const DEFAULT_DEADLINE: Duration = Duration::from_millis(500);

const POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    deadline: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_DEADLINE)
    }
}

impl RetryPolicy {
    pub fn new(deadline: Duration) -> Self {
        Self { deadline }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or
    /// keeps failing transiently past the deadline.
    ///
    /// On expiry the error of the last attempt is returned.
    pub fn run<T>(&self, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let start = Instant::now();
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            match op() {
                Ok(value) => {
                    if attempts > 1 {
                        trace!(attempts, "Succeeded after retrying");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_transient() => {
                    if start.elapsed() >= self.deadline {
                        warn!(
                            attempts,
                            deadline_ms = self.deadline.as_millis() as u64,
                            error = %e,
                            "Retry deadline exceeded"
                        );
                        return Err(e);
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Poll `done` until it reports true, failing with [`Error::Timeout`] once
/// `deadline` has passed. Errors from `done` end the wait immediately.
pub fn poll_until(
    deadline: Duration,
    what: &str,
    mut done: impl FnMut() -> Result<bool>,
) -> Result<()> {
    let start = Instant::now();
    loop {
        if done()? {
            return Ok(());
        }
        if start.elapsed() >= deadline {
            return Err(Error::Timeout(what.to_string()));
        }
        thread::sleep(POLL_INTERVAL);
    }
}
