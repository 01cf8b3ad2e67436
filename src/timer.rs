//! Start/stop clock primitive owned by every segment
//!
//! Durations come from the monotonic clock so `end - start` is
//! non-negative by construction. The wall-clock start is captured
//! separately for reports, which need an absolute timestamp.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A segment's clock: started at most once, ended at most once
///
/// Both transitions are idempotent. Re-starting does not corrupt the
/// recorded duration and ending an unstarted or already-ended timer is
/// a no-op.
#[derive(Debug, Clone)]
pub struct Timer {
    start: Option<Instant>,
    end: Option<Instant>,
    wall_start: Option<SystemTime>,
}

impl Timer {
    /// Create a timer that has not started
    pub fn new() -> Self {
        Timer {
            start: None,
            end: None,
            wall_start: None,
        }
    }

    /// Create a timer that is already running
    pub fn started() -> Self {
        let mut timer = Timer::new();
        timer.start();
        timer
    }

    /// Record the start time. Idempotent: later calls are no-ops.
    pub fn start(&mut self) {
        if self.start.is_none() {
            self.start = Some(Instant::now());
            self.wall_start = Some(SystemTime::now());
        }
    }

    /// Record the end time. No-op unless the timer has started and has
    /// not yet ended.
    pub fn end(&mut self) {
        if self.start.is_some() && self.end.is_none() {
            self.end = Some(Instant::now());
        }
    }

    /// Whether a start time has been recorded
    pub fn has_start(&self) -> bool {
        self.start.is_some()
    }

    /// Whether an end time has been recorded
    pub fn has_ended(&self) -> bool {
        self.end.is_some()
    }

    /// Elapsed time between start and end, once both are recorded
    pub fn duration(&self) -> Option<Duration> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some(end.saturating_duration_since(start)),
            _ => None,
        }
    }

    /// Duration in whole microseconds, once both endpoints are recorded
    pub fn duration_micros(&self) -> Option<u64> {
        self.duration()
            .map(|d| u64::try_from(d.as_micros()).unwrap_or(u64::MAX))
    }

    /// Wall-clock start as microseconds since the Unix epoch
    pub fn start_epoch_micros(&self) -> Option<u64> {
        let wall = self.wall_start?;
        let since_epoch = wall.duration_since(UNIX_EPOCH).ok()?;
        u64::try_from(since_epoch.as_micros()).ok()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Timer::new()
    }
}
