//! Metrics module - tick and frame timing statistics

use hdrhistogram::Histogram;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// SCOPE METRICS - Thread-safe timing capture
// ============================================================================

#[derive(Clone)]
pub struct ScopeMetrics {
    tick_hist: Arc<Mutex<Histogram<u64>>>,
    frame_hist: Arc<Mutex<Histogram<u64>>>,
    ticks: Arc<AtomicU64>,
    frames: Arc<AtomicU64>,
    compile_failures: Arc<AtomicU64>,
}

impl ScopeMetrics {
    pub fn new() -> Self {
        Self {
            tick_hist: Arc::new(Mutex::new(Histogram::new(3).unwrap())),
            frame_hist: Arc::new(Mutex::new(Histogram::new(3).unwrap())),
            ticks: Arc::new(AtomicU64::new(0)),
            frames: Arc::new(AtomicU64::new(0)),
            compile_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record_tick(&self, duration: Duration) {
        self.tick_hist.lock().record(duration.as_nanos() as u64).ok();
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame(&self, duration: Duration) {
        self.frame_hist.lock().record(duration.as_nanos() as u64).ok();
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_compile_failure(&self) {
        self.compile_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn report(&self) -> ScopeReport {
        let tick = self.tick_hist.lock();
        let frame = self.frame_hist.lock();

        ScopeReport {
            tick_p50: Duration::from_nanos(tick.value_at_quantile(0.5)),
            tick_p99: Duration::from_nanos(tick.value_at_quantile(0.99)),
            frame_p50: Duration::from_nanos(frame.value_at_quantile(0.5)),
            frame_p99: Duration::from_nanos(frame.value_at_quantile(0.99)),
            ticks: self.ticks.load(Ordering::Relaxed),
            frames: self.frames.load(Ordering::Relaxed),
            compile_failures: self.compile_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for ScopeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SCOPE REPORT - Summary statistics
// ============================================================================

#[derive(Debug)]
pub struct ScopeReport {
    pub tick_p50: Duration,
    pub tick_p99: Duration,
    pub frame_p50: Duration,
    pub frame_p99: Duration,
    pub ticks: u64,
    pub frames: u64,
    pub compile_failures: u64,
}
