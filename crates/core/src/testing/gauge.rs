//! Concurrency instrumentation shared by the mocks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts concurrent callers and remembers the peak.
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyGauge {
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ConcurrencyGauge {
    /// Marks one caller as running until the guard is dropped.
    pub fn enter(&self) -> GaugeGuard {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        GaugeGuard {
            active: Arc::clone(&self.active),
        }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct GaugeGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}
