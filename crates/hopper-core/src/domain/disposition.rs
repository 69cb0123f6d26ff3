//! Disposition: what the broker is told about a message once we are done with it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Terminal outcome applied to a delivered message.
///
/// A closed set: these are the only four calls a consumer ever makes to settle
/// a delivery.
///
/// | variant         | broker call                               |
/// |-----------------|-------------------------------------------|
/// | `Ack`           | `ack(tag)`                                |
/// | `RejectRequeue` | `reject(tag, requeue = true)`             |
/// | `NackRequeue`   | `nack(tag, multiple = false, requeue = true)` |
/// | `RejectDrop`    | `reject(tag, requeue = false)`            |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Ack,
    RejectRequeue,
    NackRequeue,
    RejectDrop,
}

impl Disposition {
    /// Does the broker put the message back on the queue?
    pub fn requeues(self) -> bool {
        matches!(self, Disposition::RejectRequeue | Disposition::NackRequeue)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Disposition::Ack => "ack",
            Disposition::RejectRequeue => "reject_requeue",
            Disposition::NackRequeue => "nack_requeue",
            Disposition::RejectDrop => "reject_drop",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_requeue_variants_requeue() {
        assert!(!Disposition::Ack.requeues());
        assert!(Disposition::RejectRequeue.requeues());
        assert!(Disposition::NackRequeue.requeues());
        assert!(!Disposition::RejectDrop.requeues());
    }

    #[test]
    fn serializes_as_snake_case() {
        let s = serde_json::to_string(&Disposition::NackRequeue).unwrap();
        assert_eq!(s, "\"nack_requeue\"");
        assert_eq!(Disposition::RejectDrop.to_string(), "reject_drop");
    }
}
