use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Millisecond time source used by the drivers.
///
/// Both drivers take `&dyn Clock` so tests and simulations can run without
/// real sleeps.
pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin. Monotonic.
    fn now_ms(&self) -> f64;

    /// Block (or simulate blocking) for `ms` milliseconds.
    fn sleep_ms(&self, ms: f64);
}

/// Wall clock backed by `std::time::Instant`.
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    fn sleep_ms(&self, ms: f64) {
        if ms > 0.0 {
            std::thread::sleep(Duration::from_secs_f64(ms / 1000.0));
        }
    }
}

/// Hand-advanced clock for scripted runs.
///
/// Clones share the same underlying time cell, so a fake renderer or session
/// can advance the clock the driver reads.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: f64) {
        self.now.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }

    fn sleep_ms(&self, ms: f64) {
        if ms > 0.0 {
            self.advance(ms);
        }
    }
}
