//! InMemoryChannel - プロセス内メモリだけで動く broker channel
//!
//! # 挙動
//! - queue 名ごとに ready キュー（`VecDeque`）
//! - consumer が1つ以上登録されている間だけ配送する
//! - delivery tag は channel ごとに 1 から増える（AMQP と同じ）
//! - 配送済みメッセージは確定されるまで unacked に残る
//! - requeue されたメッセージは `redelivered` 付きでキューの先頭に戻る
//! - 成功した呼び出しは全て操作ログ（`operations()`）に残る
//!
//! # 学習ポイント
//! - tokio の Mutex + Notify による待機付き pop
//! - `notified().enable()` を先に呼び、ロック前の publish を取りこぼさない
//! - pop から return まで await を挟まないので、cancel されても安全

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::domain::{ChannelRef, ConsumerTag, DeliveryTag, Message};
use crate::ports::{Channel, ChannelError};

/// A call made on the channel, recorded after it succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOp {
    RegisterConsumer {
        queue: String,
        consumer_tag: ConsumerTag,
    },
    CancelConsumer(ConsumerTag),
    Ack(DeliveryTag),
    Reject {
        delivery_tag: DeliveryTag,
        requeue: bool,
    },
    Nack {
        delivery_tag: DeliveryTag,
        multiple: bool,
        requeue: bool,
    },
    Purge {
        queue: String,
        purged: u32,
    },
}

#[derive(Debug, Clone)]
struct StoredMessage {
    queue: String,
    routing_key: String,
    payload: Vec<u8>,
    redelivered: bool,
}

#[derive(Default)]
struct ChannelState {
    queues: HashMap<String, VecDeque<StoredMessage>>,
    unacked: BTreeMap<DeliveryTag, StoredMessage>,
    /// (consumer tag, queue), in registration order.
    consumers: Vec<(ConsumerTag, String)>,
    next_delivery_tag: u64,
    operations: Vec<ChannelOp>,
    closed: bool,
    /// Number of upcoming dispositions that fail on purpose.
    failing_dispositions: u32,
}

impl ChannelState {
    fn ensure_open(&self) -> Result<(), ChannelError> {
        if self.closed {
            return Err(ChannelError::Closed);
        }
        Ok(())
    }

    fn next_ready(&mut self) -> Option<StoredMessage> {
        for (_, queue) in &self.consumers {
            if let Some(ready) = self.queues.get_mut(queue)
                && let Some(stored) = ready.pop_front()
            {
                return Some(stored);
            }
        }
        None
    }

    fn allocate_delivery_tag(&mut self) -> DeliveryTag {
        self.next_delivery_tag += 1;
        DeliveryTag::new(self.next_delivery_tag)
    }

    fn begin_disposition(&mut self, delivery_tag: DeliveryTag) -> Result<(), ChannelError> {
        self.ensure_open()?;
        if self.failing_dispositions > 0 {
            self.failing_dispositions -= 1;
            return Err(ChannelError::OperationFailed(format!(
                "injected failure settling delivery {delivery_tag}"
            )));
        }
        if !self.unacked.contains_key(&delivery_tag) {
            return Err(ChannelError::UnknownDeliveryTag(delivery_tag));
        }
        Ok(())
    }

    fn requeue(&mut self, mut stored: StoredMessage) {
        stored.redelivered = true;
        self.queues
            .entry(stored.queue.clone())
            .or_default()
            .push_front(stored);
    }
}

/// In-memory broker channel.
///
/// # Example
/// ```ignore
/// let channel = InMemoryChannel::new();
/// channel.publish("orders", r#"{"id": 1}"#).await;
/// ```
pub struct InMemoryChannel {
    state: Mutex<ChannelState>,
    notify: Notify,
    this: Weak<InMemoryChannel>,
}

impl InMemoryChannel {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            state: Mutex::new(ChannelState::default()),
            notify: Notify::new(),
            this: this.clone(),
        })
    }

    /// Publish to `queue`, using the queue name as routing key.
    pub async fn publish(&self, queue: &str, payload: impl Into<Vec<u8>>) {
        self.publish_with_routing_key(queue, queue, payload).await;
    }

    pub async fn publish_with_routing_key(
        &self,
        queue: &str,
        routing_key: &str,
        payload: impl Into<Vec<u8>>,
    ) {
        let stored = StoredMessage {
            queue: queue.to_string(),
            routing_key: routing_key.to_string(),
            payload: payload.into(),
            redelivered: false,
        };
        {
            let mut state = self.state.lock().await;
            state
                .queues
                .entry(queue.to_string())
                .or_default()
                .push_back(stored);
        }
        self.notify.notify_waiters();
    }

    pub async fn ready_count(&self, queue: &str) -> usize {
        let state = self.state.lock().await;
        state.queues.get(queue).map_or(0, VecDeque::len)
    }

    pub async fn unacked_count(&self) -> usize {
        self.state.lock().await.unacked.len()
    }

    pub async fn operations(&self) -> Vec<ChannelOp> {
        self.state.lock().await.operations.clone()
    }

    /// Make the next `count` ack / nack / reject calls fail with `OperationFailed`.
    pub async fn fail_next_dispositions(&self, count: u32) {
        self.state.lock().await.failing_dispositions = count;
    }

    /// Broker-side cancellation of every consumer (queue deleted, node shutdown, ...).
    pub async fn cancel_all_consumers(&self) {
        {
            let mut state = self.state.lock().await;
            let cancelled: Vec<_> = state.consumers.drain(..).map(|(tag, _)| tag).collect();
            state
                .operations
                .extend(cancelled.into_iter().map(ChannelOp::CancelConsumer));
        }
        self.notify.notify_waiters();
    }

    pub async fn close(&self) {
        self.state.lock().await.closed = true;
        self.notify.notify_waiters();
    }

    fn handle(&self) -> Result<ChannelRef, ChannelError> {
        let this: Arc<InMemoryChannel> = self.this.upgrade().ok_or(ChannelError::Closed)?;
        Ok(this)
    }
}

#[async_trait]
impl Channel for InMemoryChannel {
    async fn register_consumer(
        &self,
        queue: &str,
        consumer_tag: &ConsumerTag,
    ) -> Result<(), ChannelError> {
        {
            let mut state = self.state.lock().await;
            state.ensure_open()?;
            if let Some((_, registered)) = state.consumers.iter().find(|(tag, _)| tag == consumer_tag) {
                if registered == queue {
                    return Ok(());
                }
                return Err(ChannelError::ConsumerConflict(consumer_tag.clone()));
            }
            state.consumers.push((consumer_tag.clone(), queue.to_string()));
            state.operations.push(ChannelOp::RegisterConsumer {
                queue: queue.to_string(),
                consumer_tag: consumer_tag.clone(),
            });
        }
        self.notify.notify_waiters();
        Ok(())
    }

    async fn cancel_consumer(&self, consumer_tag: &ConsumerTag) -> Result<(), ChannelError> {
        {
            let mut state = self.state.lock().await;
            state.ensure_open()?;
            let before = state.consumers.len();
            state.consumers.retain(|(tag, _)| tag != consumer_tag);
            if state.consumers.len() != before {
                state
                    .operations
                    .push(ChannelOp::CancelConsumer(consumer_tag.clone()));
            }
        }
        self.notify.notify_waiters();
        Ok(())
    }

    async fn has_active_consumers(&self) -> bool {
        let state = self.state.lock().await;
        !state.closed && !state.consumers.is_empty()
    }

    async fn wait_for_delivery(&self, timeout: Duration) -> Result<Option<Message>, ChannelError> {
        let channel = self.handle()?;
        let deadline = Instant::now() + timeout;
        loop {
            // Register interest before looking at the queues so a publish that
            // lands in between is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock().await;
                state.ensure_open()?;
                if state.consumers.is_empty() {
                    return Ok(None);
                }
                // No await between here and the return: a cancelled wait never
                // takes a message off the queue.
                if let Some(stored) = state.next_ready() {
                    let delivery_tag = state.allocate_delivery_tag();
                    state.unacked.insert(delivery_tag, stored.clone());
                    let message = Message::new(delivery_tag, stored.payload, Arc::clone(&channel))
                        .with_routing_key(stored.routing_key)
                        .with_redelivered(stored.redelivered);
                    return Ok(Some(message));
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn ack(&self, delivery_tag: DeliveryTag) -> Result<(), ChannelError> {
        let mut state = self.state.lock().await;
        state.begin_disposition(delivery_tag)?;
        state.unacked.remove(&delivery_tag);
        state.operations.push(ChannelOp::Ack(delivery_tag));
        Ok(())
    }

    async fn reject(&self, delivery_tag: DeliveryTag, requeue: bool) -> Result<(), ChannelError> {
        {
            let mut state = self.state.lock().await;
            state.begin_disposition(delivery_tag)?;
            if let Some(stored) = state.unacked.remove(&delivery_tag)
                && requeue
            {
                state.requeue(stored);
            }
            state.operations.push(ChannelOp::Reject {
                delivery_tag,
                requeue,
            });
        }
        if requeue {
            self.notify.notify_waiters();
        }
        Ok(())
    }

    async fn nack(
        &self,
        delivery_tag: DeliveryTag,
        multiple: bool,
        requeue: bool,
    ) -> Result<(), ChannelError> {
        {
            let mut state = self.state.lock().await;
            state.begin_disposition(delivery_tag)?;
            let settled: Vec<DeliveryTag> = if multiple {
                state.unacked.range(..=delivery_tag).map(|(tag, _)| *tag).collect()
            } else {
                vec![delivery_tag]
            };
            // Newest first so push_front leaves the oldest at the head.
            for tag in settled.into_iter().rev() {
                if let Some(stored) = state.unacked.remove(&tag)
                    && requeue
                {
                    state.requeue(stored);
                }
            }
            state.operations.push(ChannelOp::Nack {
                delivery_tag,
                multiple,
                requeue,
            });
        }
        if requeue {
            self.notify.notify_waiters();
        }
        Ok(())
    }

    async fn purge_queue(&self, queue: &str) -> Result<u32, ChannelError> {
        let mut state = self.state.lock().await;
        state.ensure_open()?;
        let purged = state
            .queues
            .get_mut(queue)
            .map_or(0, |ready| ready.drain(..).count());
        let purged = u32::try_from(purged).unwrap_or(u32::MAX);
        state.operations.push(ChannelOp::Purge {
            queue: queue.to_string(),
            purged,
        });
        Ok(purged)
    }
}
