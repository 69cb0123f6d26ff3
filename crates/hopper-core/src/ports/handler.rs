//! MessageHandler port - ユーザーの処理コード

use async_trait::async_trait;

use crate::domain::{Disposition, HandlerError, Message};

/// Processes one message.
///
/// - `Ok(None)`: processed, acknowledge it.
/// - `Ok(Some(d))`: processed, settle it with `d` instead.
/// - `Err(e)`: processing failed. The consumer asks the `Error` listeners
///   whether to requeue; by default the message is dropped.
///
/// # Example
/// ```ignore
/// struct PrintHandler;
///
/// #[async_trait]
/// impl MessageHandler for PrintHandler {
///     async fn handle(&self, message: &Message) -> Result<Option<Disposition>, HandlerError> {
///         println!("{:?}", message.payload_str());
///         Ok(None)
///     }
/// }
/// ```
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &Message) -> Result<Option<Disposition>, HandlerError>;
}
