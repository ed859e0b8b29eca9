//! Memory pressure sampling

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// One reading of memory in use against the device limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySample {
    pub used_bytes: u64,
    pub limit_bytes: u64,
}

impl MemorySample {
    pub fn new(used_bytes: u64, limit_bytes: u64) -> Self {
        Self {
            used_bytes,
            limit_bytes,
        }
    }

    /// True when usage is strictly above `threshold` of the limit
    pub fn is_under_pressure(&self, threshold: f64) -> bool {
        self.limit_bytes > 0 && self.used_bytes as f64 > self.limit_bytes as f64 * threshold
    }
}

/// Source of memory readings
pub trait MemoryProbe: Send + Sync + Debug {
    /// `None` when the platform exposes no usage figures
    fn sample(&self) -> Option<MemorySample>;
}

/// Probe for platforms without usage figures
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMemoryProbe;

impl MemoryProbe for NoMemoryProbe {
    fn sample(&self) -> Option<MemorySample> {
        None
    }
}

/// Probe whose readings are set by hand
#[derive(Debug, Default)]
pub struct ManualMemoryProbe {
    used: AtomicU64,
    limit: AtomicU64,
    available: AtomicBool,
}

impl ManualMemoryProbe {
    pub fn new(used_bytes: u64, limit_bytes: u64) -> Self {
        Self {
            used: AtomicU64::new(used_bytes),
            limit: AtomicU64::new(limit_bytes),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_used(&self, used_bytes: u64) {
        self.used.store(used_bytes, Ordering::SeqCst);
        self.available.store(true, Ordering::SeqCst);
    }
}

impl MemoryProbe for ManualMemoryProbe {
    fn sample(&self) -> Option<MemorySample> {
        if !self.available.load(Ordering::SeqCst) {
            return None;
        }
        Some(MemorySample::new(
            self.used.load(Ordering::SeqCst),
            self.limit.load(Ordering::SeqCst),
        ))
    }
}
