//! ResourceGuard - 長時間動く consumer のメモリ上限

use std::sync::Arc;

use tracing::warn;

use crate::ports::MemoryProbe;

pub const BYTES_PER_MEGABYTE: u64 = 1024 * 1024;

/// Megabytes as configured -> bytes as compared. `None` on overflow.
pub fn megabytes_to_bytes(megabytes: u64) -> Option<u64> {
    megabytes.checked_mul(BYTES_PER_MEGABYTE)
}

#[derive(Clone)]
pub struct ResourceGuard {
    probe: Arc<dyn MemoryProbe>,
}

impl ResourceGuard {
    pub fn new(probe: Arc<dyn MemoryProbe>) -> Self {
        Self { probe }
    }

    /// Is resident memory at or above `limit_bytes`?
    ///
    /// No limit means never overloaded. A failed probe read is logged and
    /// treated as not overloaded.
    pub fn is_overloaded(&self, limit_bytes: Option<u64>) -> bool {
        let Some(limit_bytes) = limit_bytes else {
            return false;
        };
        match self.probe.resident_bytes() {
            Ok(used) => used >= limit_bytes,
            Err(err) => {
                warn!(error = %err, "could not read resident memory, skipping memory check");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedMemoryProbe;
    use std::io;

    struct BrokenProbe;

    impl MemoryProbe for BrokenProbe {
        fn resident_bytes(&self) -> io::Result<u64> {
            Err(io::Error::other("no /proc"))
        }
    }

    #[test]
    fn no_limit_is_never_overloaded() {
        let guard = ResourceGuard::new(Arc::new(FixedMemoryProbe::new(u64::MAX)));
        assert!(!guard.is_overloaded(None));
    }

    #[test]
    fn limit_is_inclusive() {
        let limit = megabytes_to_bytes(128).unwrap();
        let probe = Arc::new(FixedMemoryProbe::new(limit - 1));
        let guard = ResourceGuard::new(probe.clone());

        assert!(!guard.is_overloaded(Some(limit)));
        probe.set(limit);
        assert!(guard.is_overloaded(Some(limit)));
        probe.set(limit + 1);
        assert!(guard.is_overloaded(Some(limit)));
    }

    #[test]
    fn probe_failure_is_not_overload() {
        let guard = ResourceGuard::new(Arc::new(BrokenProbe));
        assert!(!guard.is_overloaded(Some(1)));
    }

    #[test]
    fn megabytes_convert_with_overflow_check() {
        assert_eq!(megabytes_to_bytes(1), Some(1_048_576));
        assert_eq!(megabytes_to_bytes(u64::MAX), None);
    }
}
