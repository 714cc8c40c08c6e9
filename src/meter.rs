use std::sync::atomic::{AtomicU64, Ordering};

/// Bytes read and written across every connection of a run.
///
/// Shared by all workers; counters only ever grow.
#[derive(Debug, Default)]
pub struct ThroughputMeter {
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
}

impl ThroughputMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_read(&self, bytes: u64) {
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn add_written(&self, bytes: u64) {
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }
}
