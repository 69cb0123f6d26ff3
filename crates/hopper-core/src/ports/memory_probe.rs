//! MemoryProbe port - how much memory is this process using?
//!
//! `ProcessMemoryProbe` (impls) reads the real resident set size.
//! `FixedMemoryProbe` reports whatever it was told, for tests and dry runs.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

pub trait MemoryProbe: Send + Sync {
    /// Current resident memory of the process, in bytes.
    fn resident_bytes(&self) -> io::Result<u64>;
}

#[derive(Debug, Default)]
pub struct FixedMemoryProbe {
    bytes: AtomicU64,
}

impl FixedMemoryProbe {
    pub fn new(bytes: u64) -> Self {
        Self {
            bytes: AtomicU64::new(bytes),
        }
    }

    pub fn set(&self, bytes: u64) {
        self.bytes.store(bytes, Ordering::Relaxed);
    }
}

impl MemoryProbe for FixedMemoryProbe {
    fn resident_bytes(&self) -> io::Result<u64> {
        Ok(self.bytes.load(Ordering::Relaxed))
    }
}
