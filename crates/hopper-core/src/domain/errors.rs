//! Errors raised by message handlers.
//!
//! A `HandlerError` never escapes the consume loop. It is turned into a
//! disposition (requeue or drop) and reported through the `Error` event.

use std::error::Error as StdError;

/// Recoverable processing error returned by a `MessageHandler`.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(format!("json decode: {err}"), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_source_chain() {
        let io = std::io::Error::other("disk gone");
        let err = HandlerError::with_source("could not persist order", io);
        assert_eq!(err.to_string(), "could not persist order");
        assert_eq!(err.source().unwrap().to_string(), "disk gone");
    }

    #[test]
    fn json_errors_convert() {
        let err: HandlerError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(err.message().starts_with("json decode"));
        assert!(err.source().is_some());
    }
}
