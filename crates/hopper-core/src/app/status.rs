//! ConsumeReport - summary of one `consume` call.

use serde::{Deserialize, Serialize};

use super::state::StopReason;
use crate::domain::Disposition;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeReport {
    pub consumed: u64,
    pub acked: u64,
    pub requeued: u64,
    pub nacked: u64,
    pub dropped: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
}

impl ConsumeReport {
    pub(crate) fn record(&mut self, disposition: Disposition) {
        self.consumed += 1;
        match disposition {
            Disposition::Ack => self.acked += 1,
            Disposition::RejectRequeue => self.requeued += 1,
            Disposition::NackRequeue => self.nacked += 1,
            Disposition::RejectDrop => self.dropped += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_counts_each_disposition() {
        let mut report = ConsumeReport::default();
        for d in [
            Disposition::Ack,
            Disposition::Ack,
            Disposition::RejectRequeue,
            Disposition::NackRequeue,
            Disposition::RejectDrop,
        ] {
            report.record(d);
        }
        assert_eq!(report.consumed, 5);
        assert_eq!(report.acked, 2);
        assert_eq!((report.requeued, report.nacked, report.dropped), (1, 1, 1));
    }

    #[test]
    fn serializes_stop_reason_snake_case() {
        let report = ConsumeReport {
            stop_reason: Some(StopReason::TargetReached),
            ..ConsumeReport::default()
        };
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["stop_reason"], "target_reached");
    }
}
