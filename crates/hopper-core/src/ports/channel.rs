//! Channel port - the broker capability the consume loop needs.
//!
//! Connection management, TLS and reconnects live behind this trait. The loop
//! assumes a channel is usable until a call says otherwise.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{ConsumerTag, DeliveryTag, Message};

/// Transport-level failure. Fatal to the consume loop.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel is closed")]
    Closed,

    #[error("unknown delivery tag {0}")]
    UnknownDeliveryTag(DeliveryTag),

    #[error("consumer {0} is registered on another queue")]
    ConsumerConflict(ConsumerTag),

    #[error("channel operation failed: {0}")]
    OperationFailed(String),
}

/// A broker channel.
///
/// # Contract
/// - `register_consumer` is idempotent for the same queue and tag.
/// - `wait_for_delivery` returns `Ok(None)` when the timeout elapses with
///   nothing to deliver. It must be cancel-safe: dropping the future before it
///   completes must not consume a delivery.
/// - Dispositions address a delivery by tag and must be issued on the channel
///   that delivered it (`Message::channel`).
#[async_trait]
pub trait Channel: Send + Sync {
    async fn register_consumer(
        &self,
        queue: &str,
        consumer_tag: &ConsumerTag,
    ) -> Result<(), ChannelError>;

    async fn cancel_consumer(&self, consumer_tag: &ConsumerTag) -> Result<(), ChannelError>;

    async fn has_active_consumers(&self) -> bool;

    async fn wait_for_delivery(&self, timeout: Duration) -> Result<Option<Message>, ChannelError>;

    async fn ack(&self, delivery_tag: DeliveryTag) -> Result<(), ChannelError>;

    async fn reject(&self, delivery_tag: DeliveryTag, requeue: bool) -> Result<(), ChannelError>;

    async fn nack(
        &self,
        delivery_tag: DeliveryTag,
        multiple: bool,
        requeue: bool,
    ) -> Result<(), ChannelError>;

    /// Drop every ready message in `queue`. Returns how many were removed.
    async fn purge_queue(&self, queue: &str) -> Result<u32, ChannelError>;
}
