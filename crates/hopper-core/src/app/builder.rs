//! ConsumerBuilder - 配線と fail-fast な検証
//!
//! handler 未設定、空の queue、無意味なメモリ上限など、設定の誤りは全て
//! `build()` が返す。キューからメッセージを1件も取る前に分かる。

use std::sync::Arc;

use super::consumer::Consumer;
use super::notifier::{Listener, Notifier};
use super::resource_guard::ResourceGuard;
use crate::config::{ConfigError, ConsumerConfig};
use crate::domain::{ConsumerEvent, ConsumerTag, EventKind, Verdict};
use crate::impls::ProcessMemoryProbe;
use crate::ports::{Channel, MemoryProbe, MessageHandler};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no message handler configured; call ConsumerBuilder::handler before build")]
    MissingHandler,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Builds a `Consumer`.
///
/// # Example
/// ```ignore
/// let mut consumer = ConsumerBuilder::new(channel, ConsumerConfig::new("orders"))
///     .handler(OrderHandler::new(db))
///     .listener(EventKind::Received, Arc::new(clear_caches), ClearCachesListener::PRIORITY)
///     .build()?;
/// let report = consumer.consume(Some(100)).await?;
/// ```
pub struct ConsumerBuilder {
    channel: Arc<dyn Channel>,
    config: ConsumerConfig,
    handler: Option<Arc<dyn MessageHandler>>,
    notifier: Notifier,
    memory_probe: Arc<dyn MemoryProbe>,
    consumer_tag: Option<ConsumerTag>,
}

impl ConsumerBuilder {
    pub fn new(channel: Arc<dyn Channel>, config: ConsumerConfig) -> Self {
        Self {
            channel,
            config,
            handler: None,
            notifier: Notifier::new(),
            memory_probe: Arc::new(ProcessMemoryProbe),
            consumer_tag: None,
        }
    }

    pub fn handler<H: MessageHandler + 'static>(self, handler: H) -> Self {
        self.shared_handler(Arc::new(handler))
    }

    pub fn shared_handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn listener(mut self, kind: EventKind, listener: Arc<dyn Listener>, priority: i32) -> Self {
        self.notifier.subscribe(kind, listener, priority);
        self
    }

    /// Subscribe a closure. See `Notifier::subscribe_fn`.
    pub fn listen<F>(mut self, kind: EventKind, priority: i32, listener: F) -> Self
    where
        F: Fn(&ConsumerEvent<'_>) -> Verdict + Send + Sync + 'static,
    {
        self.notifier.subscribe_fn(kind, priority, listener);
        self
    }

    /// Replace the process memory probe (tests, containers with their own accounting).
    pub fn memory_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.memory_probe = probe;
        self
    }

    /// Use a fixed consumer tag instead of `<prefix>-<ULID>`.
    pub fn consumer_tag(mut self, consumer_tag: ConsumerTag) -> Self {
        self.consumer_tag = Some(consumer_tag);
        self
    }

    pub fn build(self) -> Result<Consumer, BuildError> {
        let handler = self.handler.ok_or(BuildError::MissingHandler)?;
        self.config.validate()?;
        let memory_limit_bytes = self.config.memory_limit_bytes()?;
        let consumer_tag = self
            .consumer_tag
            .unwrap_or_else(|| ConsumerTag::generate(&self.config.consumer_tag_prefix));

        Ok(Consumer::new(
            self.channel,
            handler,
            self.notifier,
            ResourceGuard::new(self.memory_probe),
            self.config,
            consumer_tag,
            memory_limit_bytes,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Disposition, HandlerError, Message};
    use crate::impls::InMemoryChannel;
    use async_trait::async_trait;

    struct AckAll;

    #[async_trait]
    impl MessageHandler for AckAll {
        async fn handle(&self, _message: &Message) -> Result<Option<Disposition>, HandlerError> {
            Ok(None)
        }
    }

    #[test]
    fn build_success() {
        let consumer = ConsumerBuilder::new(InMemoryChannel::new(), ConsumerConfig::new("orders"))
            .handler(AckAll)
            .build()
            .unwrap();
        assert_eq!(consumer.queue(), "orders");
        assert!(consumer.consumer_tag().as_str().starts_with("hopper-"));
        assert_eq!(consumer.memory_limit_bytes(), None);
    }

    #[test]
    fn build_without_handler_fails() {
        let result = ConsumerBuilder::new(InMemoryChannel::new(), ConsumerConfig::new("orders")).build();
        assert!(matches!(result, Err(BuildError::MissingHandler)));
    }

    #[test]
    fn build_rejects_zero_memory_limit() {
        let config = ConsumerConfig {
            memory_limit_mb: Some(0),
            ..ConsumerConfig::new("orders")
        };
        let result = ConsumerBuilder::new(InMemoryChannel::new(), config)
            .handler(AckAll)
            .build();
        assert!(matches!(
            result,
            Err(BuildError::Config(ConfigError::InvalidValue { ref key, .. })) if key == "memory_limit_mb"
        ));
    }

    #[test]
    fn build_rejects_empty_queue() {
        let result = ConsumerBuilder::new(InMemoryChannel::new(), ConsumerConfig::default())
            .handler(AckAll)
            .build();
        assert!(matches!(result, Err(BuildError::Config(_))));
    }

    #[test]
    fn memory_limit_is_converted_to_bytes() {
        let config = ConsumerConfig {
            memory_limit_mb: Some(3),
            ..ConsumerConfig::new("orders")
        };
        let consumer = ConsumerBuilder::new(InMemoryChannel::new(), config)
            .handler(AckAll)
            .consumer_tag(ConsumerTag::new("fixed"))
            .build()
            .unwrap();
        assert_eq!(consumer.memory_limit_bytes(), Some(3 * 1024 * 1024));
        assert_eq!(consumer.consumer_tag().as_str(), "fixed");
    }
}
