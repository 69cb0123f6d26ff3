//! Notifier - 同期のライフサイクル listener
//!
//! # 順序
//! - priority が高いものから実行
//! - 同じ priority は登録順
//! - 全て consumer のタスク上で、pipeline の次の段より前に走る
//!
//! # 学習ポイント
//! - listener は共有イベントを書き換えず、`Verdict` を返す
//! - notifier が畳み込んで（最後の意見が勝つ）consumer に返す
//! - consumer が verdict を見るのは `EventKind::Error` のときだけ

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{ConsumerEvent, EventKind, Verdict};

pub trait Listener: Send + Sync {
    fn on_event(&self, event: &ConsumerEvent<'_>) -> Verdict;
}

/// Adapter so plain closures can be subscribed.
struct FnListener<F>(F);

impl<F> Listener for FnListener<F>
where
    F: Fn(&ConsumerEvent<'_>) -> Verdict + Send + Sync,
{
    fn on_event(&self, event: &ConsumerEvent<'_>) -> Verdict {
        (self.0)(event)
    }
}

#[derive(Clone)]
struct Subscription {
    priority: i32,
    listener: Arc<dyn Listener>,
}

#[derive(Clone, Default)]
pub struct Notifier {
    subscriptions: HashMap<EventKind, Vec<Subscription>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, kind: EventKind, listener: Arc<dyn Listener>, priority: i32) {
        let subscriptions = self.subscriptions.entry(kind).or_default();
        // Insert after every subscription with priority >= ours: stable for ties.
        let position = subscriptions
            .iter()
            .position(|s| s.priority < priority)
            .unwrap_or(subscriptions.len());
        subscriptions.insert(position, Subscription { priority, listener });
    }

    pub fn subscribe_fn<F>(&mut self, kind: EventKind, priority: i32, listener: F)
    where
        F: Fn(&ConsumerEvent<'_>) -> Verdict + Send + Sync + 'static,
    {
        self.subscribe(kind, Arc::new(FnListener(listener)), priority);
    }

    /// Deliver `event` to its listeners and return their combined verdict.
    pub fn publish(&self, event: &ConsumerEvent<'_>) -> Verdict {
        self.subscriptions
            .get(&event.kind)
            .map_or(Verdict::Pass, |subscriptions| {
                subscriptions
                    .iter()
                    .fold(Verdict::Pass, |verdict, s| verdict.merge(s.listener.on_event(event)))
            })
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.subscriptions.get(&kind).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChannelRef, DeliveryTag, Message};
    use crate::impls::InMemoryChannel;
    use std::sync::Mutex;

    fn message() -> Message {
        let channel: ChannelRef = InMemoryChannel::new();
        Message::new(DeliveryTag::new(1), "payload", channel)
    }

    #[test]
    fn runs_by_priority_then_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut notifier = Notifier::new();
        for (name, priority) in [("low", -10), ("first", 0), ("high", 50), ("second", 0)] {
            let seen = Arc::clone(&seen);
            notifier.subscribe_fn(EventKind::Received, priority, move |_| {
                seen.lock().unwrap().push(name);
                Verdict::Pass
            });
        }

        let message = message();
        notifier.publish(&ConsumerEvent::new(EventKind::Received, &message));

        assert_eq!(*seen.lock().unwrap(), vec!["high", "first", "second", "low"]);
    }

    #[test]
    fn only_listeners_of_the_kind_run() {
        let seen = Arc::new(Mutex::new(0));
        let mut notifier = Notifier::new();
        {
            let seen = Arc::clone(&seen);
            notifier.subscribe_fn(EventKind::Processed, 0, move |_| {
                *seen.lock().unwrap() += 1;
                Verdict::Pass
            });
        }

        let message = message();
        notifier.publish(&ConsumerEvent::new(EventKind::Received, &message));
        assert_eq!(*seen.lock().unwrap(), 0);
        notifier.publish(&ConsumerEvent::new(EventKind::Processed, &message));
        assert_eq!(*seen.lock().unwrap(), 1);
        assert_eq!(notifier.listener_count(EventKind::Processed), 1);
        assert_eq!(notifier.listener_count(EventKind::Error), 0);
    }

    #[test]
    fn last_listener_with_an_opinion_decides() {
        let mut notifier = Notifier::new();
        notifier.subscribe_fn(EventKind::Error, 10, |_| Verdict::Drop);
        notifier.subscribe_fn(EventKind::Error, 0, |_| Verdict::Requeue);
        notifier.subscribe_fn(EventKind::Error, -5, |_| Verdict::Pass);

        let message = message();
        let verdict = notifier.publish(&ConsumerEvent::new(EventKind::Error, &message));
        assert_eq!(verdict, Verdict::Requeue);
    }

    #[test]
    fn no_listeners_means_pass() {
        let message = message();
        let verdict = Notifier::new().publish(&ConsumerEvent::new(EventKind::Error, &message));
        assert_eq!(verdict, Verdict::Pass);
    }
}
