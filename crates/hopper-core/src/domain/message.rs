//! Message model: one delivery pulled off a queue.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use ulid::Ulid;

use crate::ports::Channel;

/// Handle to the channel a message was delivered on.
pub type ChannelRef = Arc<dyn Channel>;

/// Per-channel identifier used to address ack / nack / reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeliveryTag(u64);

impl DeliveryTag {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DeliveryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one registered consumer on a channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConsumerTag(String);

impl ConsumerTag {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// `<prefix>-<ULID>`, unique per process run.
    pub fn generate(prefix: &str) -> Self {
        Self(format!("{prefix}-{}", Ulid::new()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConsumerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A delivered message.
///
/// Design:
/// - The payload is immutable once delivered.
/// - `channel` is the channel that delivered the message. Dispositions must be
///   issued on it, never on "whatever channel the consumer currently holds".
/// - Not `Clone`: a message gets exactly one terminal disposition.
pub struct Message {
    delivery_tag: DeliveryTag,
    routing_key: String,
    payload: Vec<u8>,
    redelivered: bool,
    received_at: DateTime<Utc>,
    channel: ChannelRef,
}

impl Message {
    pub fn new(delivery_tag: DeliveryTag, payload: impl Into<Vec<u8>>, channel: ChannelRef) -> Self {
        Self {
            delivery_tag,
            routing_key: String::new(),
            payload: payload.into(),
            redelivered: false,
            received_at: Utc::now(),
            channel,
        }
    }

    pub fn with_routing_key(mut self, routing_key: impl Into<String>) -> Self {
        self.routing_key = routing_key.into();
        self
    }

    pub fn with_redelivered(mut self, redelivered: bool) -> Self {
        self.redelivered = redelivered;
        self
    }

    pub fn delivery_tag(&self) -> DeliveryTag {
        self.delivery_tag
    }

    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload as UTF-8, if it is valid UTF-8.
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Decode the payload as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }

    /// True when the broker has delivered this message before (it was requeued).
    pub fn redelivered(&self) -> bool {
        self.redelivered
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn channel(&self) -> &ChannelRef {
        &self.channel
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("delivery_tag", &self.delivery_tag)
            .field("routing_key", &self.routing_key)
            .field("payload_len", &self.payload.len())
            .field("redelivered", &self.redelivered)
            .field("received_at", &self.received_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryChannel;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Order {
        id: u32,
    }

    #[test]
    fn consumer_tag_uses_prefix() {
        let a = ConsumerTag::generate("billing");
        let b = ConsumerTag::generate("billing");
        assert!(a.as_str().starts_with("billing-"));
        assert_ne!(a, b);
    }

    #[test]
    fn json_payload_decodes() {
        let channel: ChannelRef = InMemoryChannel::new();
        let message = Message::new(DeliveryTag::new(7), br#"{"id": 42}"#.to_vec(), channel)
            .with_routing_key("orders.created");

        assert_eq!(message.json::<Order>().unwrap(), Order { id: 42 });
        assert_eq!(message.routing_key(), "orders.created");
        assert_eq!(message.delivery_tag().get(), 7);
        assert!(!message.redelivered());
    }

    #[test]
    fn debug_omits_payload_bytes() {
        let channel: ChannelRef = InMemoryChannel::new();
        let message = Message::new(DeliveryTag::new(1), "secret", channel);
        let rendered = format!("{message:?}");
        assert!(rendered.contains("payload_len: 6"));
        assert!(!rendered.contains("secret"));
    }
}
