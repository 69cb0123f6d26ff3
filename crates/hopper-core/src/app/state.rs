//! LoopState - 実行中の `Consumer` が持つループ状態

use serde::{Deserialize, Serialize};

/// Why a `consume` call returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// `StopHandle::request_stop` was called.
    StopRequested,

    /// The message-count target was reached.
    TargetReached,

    /// Resident memory reached the configured ceiling.
    MemoryLimit,

    /// The channel no longer has a consumer for us (broker-side cancel).
    ConsumersCancelled,
}

/// Mutable state of one `consume` call.
///
/// Design:
/// - Owned and mutated by the consumer only.
/// - `consumed` moves exactly once per settled message.
/// - A stop requested from inside the loop (target, memory) is only acted on at
///   the next iteration boundary. The first reason recorded wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopState {
    pub target: Option<u64>,
    pub consumed: u64,
    pub stop_requested: bool,
    pub memory_limit_bytes: Option<u64>,
    stop_reason: Option<StopReason>,
}

impl LoopState {
    pub fn new(target: Option<u64>, memory_limit_bytes: Option<u64>) -> Self {
        Self {
            target,
            memory_limit_bytes,
            ..Self::default()
        }
    }

    pub fn target_reached(&self) -> bool {
        self.target.is_some_and(|target| self.consumed >= target)
    }

    pub fn request_stop(&mut self, reason: StopReason) {
        self.stop_requested = true;
        self.stop_reason.get_or_insert(reason);
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_target_is_never_reached() {
        let state = LoopState {
            consumed: u64::MAX,
            ..LoopState::new(None, None)
        };
        assert!(!state.target_reached());
    }

    #[test]
    fn target_reached_at_count() {
        let mut state = LoopState::new(Some(2), None);
        state.consumed = 1;
        assert!(!state.target_reached());
        state.consumed = 2;
        assert!(state.target_reached());
        assert!(LoopState::new(Some(0), None).target_reached());
    }

    #[test]
    fn first_stop_reason_wins() {
        let mut state = LoopState::new(None, None);
        state.request_stop(StopReason::TargetReached);
        state.request_stop(StopReason::MemoryLimit);
        assert!(state.stop_requested);
        assert_eq!(state.stop_reason(), Some(StopReason::TargetReached));
    }
}
