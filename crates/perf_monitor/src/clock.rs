//! Time sources.
//!
//! Durations are measured on a monotonic millisecond clock; retention is
//! accounted on wall-clock time. Both come from the same [`Clock`] so a test
//! clock can drive them together.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Provider of monotonic and wall-clock time.
pub trait Clock: Send + Sync + 'static {
    /// Monotonic time in milliseconds since an arbitrary origin.
    fn now_ms(&self) -> f64;

    /// Current wall-clock time.
    fn wall_clock(&self) -> DateTime<Utc>;
}

/// Clock backed by [`Instant`] and the system wall clock.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock whose monotonic origin is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    #[inline]
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    #[inline]
    fn wall_clock(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug)]
struct ManualTime {
    monotonic_ms: f64,
    wall: DateTime<Utc>,
}

/// Manually advanced clock for tests and simulations.
///
/// Clones share the same time, so a test can keep one handle and give
/// another to the monitor.
#[derive(Debug, Clone)]
pub struct ManualClock {
    time: Arc<Mutex<ManualTime>>,
}

impl ManualClock {
    /// Create a clock at monotonic zero and the current wall-clock time.
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Create a clock at monotonic zero and the given wall-clock time.
    pub fn starting_at(wall: DateTime<Utc>) -> Self {
        Self {
            time: Arc::new(Mutex::new(ManualTime {
                monotonic_ms: 0.0,
                wall,
            })),
        }
    }

    /// Move both readings forward.
    pub fn advance(&self, by: Duration) {
        let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
        time.monotonic_ms += by.as_nanos() as f64 / 1_000_000.0;
        if let Ok(delta) = chrono::Duration::from_std(by) {
            time.wall += delta;
        }
    }

    /// Move both readings forward by a number of milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.time
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .monotonic_ms
    }

    fn wall_clock(&self) -> DateTime<Utc> {
        self.time.lock().unwrap_or_else(PoisonError::into_inner).wall
    }
}
