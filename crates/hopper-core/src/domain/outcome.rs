//! ProcessingOutcome と outcome resolver
//!
//! # 学習ポイント
//! - `resolve` は「handler が何をしたか」から「broker に何を伝えるか」への決定表そのもの
//! - 純粋関数: channel にもイベントにも触れない

use super::disposition::Disposition;
use super::errors::HandlerError;

/// Result of running the handler over one message.
#[derive(Debug)]
pub enum ProcessingOutcome {
    /// The handler returned normally, optionally asking for a specific disposition.
    Success(Option<Disposition>),

    /// The handler returned an error.
    ///
    /// `requeue` starts out false and is filled in from the `Error` listeners'
    /// verdict before the outcome is resolved.
    Failure { error: HandlerError, requeue: bool },
}

impl ProcessingOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessingOutcome::Success(_))
    }

    pub fn error(&self) -> Option<&HandlerError> {
        match self {
            ProcessingOutcome::Success(_) => None,
            ProcessingOutcome::Failure { error, .. } => Some(error),
        }
    }
}

impl From<Result<Option<Disposition>, HandlerError>> for ProcessingOutcome {
    fn from(result: Result<Option<Disposition>, HandlerError>) -> Self {
        match result {
            Ok(requested) => ProcessingOutcome::Success(requested),
            Err(error) => ProcessingOutcome::Failure {
                error,
                requeue: false,
            },
        }
    }
}

/// Map an outcome to its terminal disposition.
///
/// - `Success(None)` -> `Ack`
/// - `Success(Some(d))` -> `d`
/// - `Failure { requeue: true }` -> `RejectRequeue`
/// - `Failure { requeue: false }` -> `RejectDrop`
pub fn resolve(outcome: &ProcessingOutcome) -> Disposition {
    match outcome {
        ProcessingOutcome::Success(requested) => requested.unwrap_or(Disposition::Ack),
        ProcessingOutcome::Failure { requeue: true, .. } => Disposition::RejectRequeue,
        ProcessingOutcome::Failure { requeue: false, .. } => Disposition::RejectDrop,
    }
}
