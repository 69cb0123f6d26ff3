//! Lifecycle events emitted around each message.

use std::fmt;

use super::errors::HandlerError;
use super::message::Message;

/// Kinds of lifecycle notifications, in the order a message can see them.
///
/// - Received -> Success -> Processed
/// - Received -> Error -> Requeued | Dropped -> Processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Received,
    Success,
    Error,
    Requeued,
    Dropped,
    Processed,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::Received,
        EventKind::Success,
        EventKind::Error,
        EventKind::Requeued,
        EventKind::Dropped,
        EventKind::Processed,
    ];

    /// Stable dotted name, handy for logs and metrics labels.
    pub fn name(self) -> &'static str {
        match self {
            EventKind::Received => "message",
            EventKind::Success => "message.success",
            EventKind::Error => "message.error",
            EventKind::Requeued => "message.requeue",
            EventKind::Dropped => "message.drop",
            EventKind::Processed => "message.processed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A lifecycle notification. Borrowed: listeners observe, they never own the message.
#[derive(Debug, Clone, Copy)]
pub struct ConsumerEvent<'a> {
    pub kind: EventKind,
    pub message: &'a Message,
    pub error: Option<&'a HandlerError>,
}

impl<'a> ConsumerEvent<'a> {
    pub fn new(kind: EventKind, message: &'a Message) -> Self {
        Self {
            kind,
            message,
            error: None,
        }
    }

    pub fn with_error(mut self, error: Option<&'a HandlerError>) -> Self {
        self.error = error;
        self
    }
}

/// What a listener wants done with a failed message.
///
/// Only read back for `EventKind::Error`; ignored everywhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verdict {
    /// No opinion.
    #[default]
    Pass,
    Requeue,
    Drop,
}

impl Verdict {
    /// Fold in a later listener's verdict: the last listener with an opinion wins.
    pub fn merge(self, later: Verdict) -> Verdict {
        match later {
            Verdict::Pass => self,
            decided => decided,
        }
    }

    pub fn requeue(self) -> bool {
        self == Verdict::Requeue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_opinion_wins() {
        let v = Verdict::Pass
            .merge(Verdict::Requeue)
            .merge(Verdict::Pass)
            .merge(Verdict::Drop)
            .merge(Verdict::Pass);
        assert_eq!(v, Verdict::Drop);
        assert!(Verdict::Pass.merge(Verdict::Requeue).requeue());
    }

    #[test]
    fn no_opinion_means_drop() {
        assert!(!Verdict::default().requeue());
    }

    #[test]
    fn event_names_are_dotted() {
        let names: Vec<_> = EventKind::ALL.iter().map(|k| k.name()).collect();
        assert_eq!(
            names,
            [
                "message",
                "message.success",
                "message.error",
                "message.requeue",
                "message.drop",
                "message.processed"
            ]
        );
    }
}
