//! Consumer - consume ループ本体
//!
//! # フロー（`consume` 1回分）
//! 1. channel に consumer を登録
//! 2. channel 側に自分の consumer が残っている間ループ:
//!    - 停止条件を満たしたら consumer を cancel して return
//!    - delivery を待つ（idle timeout 付き、StopHandle と select! で競合）
//!    - メッセージを pipeline に流す
//!
//! # Pipeline（メッセージ1件ごと）
//! 1. `Received`
//! 2. handler -> `ProcessingOutcome`
//! 3. 成功: `Success` / 失敗: `Error`（requeue するかは listener が決める）
//! 4. `resolve` -> `Disposition` を、メッセージを配送した channel 上で確定
//! 5. 失敗時のみ: `Requeued` か `Dropped`
//! 6. `Processed`
//! 7. カウントして target とメモリ上限を確認
//!
//! # 学習ポイント
//! - pipeline に入ったメッセージは、停止条件を見る前に必ず確定される
//! - handler のエラーは disposition に変換、channel のエラーはループを終わらせる
//! - `consume(&mut self)` 中は Consumer に触れないので、停止と purge は事前に取り出したハンドル経由

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

use super::notifier::Notifier;
use super::purge::PurgeHandle;
use super::resource_guard::ResourceGuard;
use super::state::{LoopState, StopReason};
use super::status::ConsumeReport;
use super::stop::StopHandle;
use crate::config::ConsumerConfig;
use crate::domain::{
    ConsumerEvent, ConsumerTag, Disposition, EventKind, Message, ProcessingOutcome, resolve,
};
use crate::error::ConsumeError;
use crate::ports::{Channel, MessageHandler};

/// 1つのキューを消費する consumer（`ConsumerBuilder` で作る）
///
/// 1度に処理するのは1件だけ。並列化したいときは channel ごとに consumer を複数立てる。
pub struct Consumer {
    channel: Arc<dyn Channel>,
    handler: Arc<dyn MessageHandler>,
    notifier: Notifier,
    guard: ResourceGuard,
    queue: String,
    consumer_tag: ConsumerTag,
    idle_timeout: Duration,
    memory_limit_bytes: Option<u64>,
    state: LoopState,
    stop: StopHandle,
    stop_rx: watch::Receiver<bool>,
}

impl Consumer {
    pub(super) fn new(
        channel: Arc<dyn Channel>,
        handler: Arc<dyn MessageHandler>,
        notifier: Notifier,
        guard: ResourceGuard,
        config: ConsumerConfig,
        consumer_tag: ConsumerTag,
        memory_limit_bytes: Option<u64>,
    ) -> Self {
        let (stop, stop_rx) = StopHandle::new();
        Self {
            channel,
            handler,
            notifier,
            guard,
            idle_timeout: config.idle_timeout(),
            queue: config.queue,
            consumer_tag,
            memory_limit_bytes,
            state: LoopState::new(None, memory_limit_bytes),
            stop,
            stop_rx,
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn consumer_tag(&self) -> &ConsumerTag {
        &self.consumer_tag
    }

    pub fn memory_limit_bytes(&self) -> Option<u64> {
        self.memory_limit_bytes
    }

    /// State of the current (or last) `consume` call.
    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn consumed(&self) -> u64 {
        self.state.consumed
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Take this before `consume` to purge while the loop runs.
    pub fn purge_handle(&self) -> PurgeHandle {
        PurgeHandle::new(Arc::clone(&self.channel), self.queue.clone())
    }

    /// Consume until a stop condition is met.
    ///
    /// `target`: stop after this many settled messages (`None` = no limit).
    pub async fn consume(&mut self, target: Option<u64>) -> Result<ConsumeReport, ConsumeError> {
        self.state = LoopState::new(target, self.memory_limit_bytes);
        let mut report = ConsumeReport::default();

        info!(
            queue = %self.queue,
            consumer_tag = %self.consumer_tag,
            target = ?target,
            memory_limit_bytes = ?self.memory_limit_bytes,
            "starting consumer"
        );
        self.channel
            .register_consumer(&self.queue, &self.consumer_tag)
            .await?;

        let mut stop_rx = self.stop_rx.clone();
        let stop_reason = loop {
            if !self.channel.has_active_consumers().await {
                warn!(queue = %self.queue, consumer_tag = %self.consumer_tag, "consumer cancelled by channel");
                break StopReason::ConsumersCancelled;
            }

            if let Some(reason) = self.stop_condition(&stop_rx) {
                self.state.request_stop(reason);
                self.channel.cancel_consumer(&self.consumer_tag).await?;
                break reason;
            }

            // A stop request wakes an idle wait; the next iteration acts on it.
            let delivery = tokio::select! {
                biased;
                Ok(()) = stop_rx.changed() => continue,
                delivery = self.channel.wait_for_delivery(self.idle_timeout) => delivery?,
            };

            let Some(message) = delivery else {
                trace!(queue = %self.queue, "idle timeout elapsed without a delivery");
                continue;
            };

            self.process(message, &mut report).await?;
        };

        report.stop_reason = Some(stop_reason);
        info!(
            queue = %self.queue,
            consumed = report.consumed,
            acked = report.acked,
            requeued = report.requeued,
            nacked = report.nacked,
            dropped = report.dropped,
            stop_reason = ?stop_reason,
            "consumer stopped"
        );
        Ok(report)
    }

    /// Force-purge the configured queue. See `purge_handle` for purging mid-loop.
    pub async fn purge(&self) -> Result<u32, ConsumeError> {
        self.purge_handle().purge().await
    }

    fn stop_condition(&self, stop_rx: &watch::Receiver<bool>) -> Option<StopReason> {
        if *stop_rx.borrow() {
            return Some(StopReason::StopRequested);
        }
        if let Some(reason) = self.state.stop_reason() {
            return Some(reason);
        }
        if self.state.target_reached() {
            return Some(StopReason::TargetReached);
        }
        None
    }

    async fn process(
        &mut self,
        message: Message,
        report: &mut ConsumeReport,
    ) -> Result<(), ConsumeError> {
        let delivery_tag = message.delivery_tag();
        debug!(
            queue = %self.queue,
            %delivery_tag,
            redelivered = message.redelivered(),
            "message received"
        );
        self.notifier
            .publish(&ConsumerEvent::new(EventKind::Received, &message));

        let mut outcome = ProcessingOutcome::from(self.handler.handle(&message).await);

        let follow_up = match &mut outcome {
            ProcessingOutcome::Success(_) => {
                self.notifier
                    .publish(&ConsumerEvent::new(EventKind::Success, &message));
                None
            }
            ProcessingOutcome::Failure { error, requeue } => {
                let verdict = self.notifier.publish(
                    &ConsumerEvent::new(EventKind::Error, &message).with_error(Some(&*error)),
                );
                *requeue = verdict.requeue();
                warn!(
                    queue = %self.queue,
                    %delivery_tag,
                    error = %error,
                    requeue = *requeue,
                    "handler failed"
                );
                Some(if *requeue {
                    EventKind::Requeued
                } else {
                    EventKind::Dropped
                })
            }
        };

        let disposition = resolve(&outcome);
        settle(&message, disposition).await?;

        if let Some(kind) = follow_up {
            self.notifier
                .publish(&ConsumerEvent::new(kind, &message).with_error(outcome.error()));
        }
        self.notifier
            .publish(&ConsumerEvent::new(EventKind::Processed, &message));

        self.state.consumed += 1;
        report.record(disposition);
        debug!(
            queue = %self.queue,
            %delivery_tag,
            %disposition,
            success = outcome.is_success(),
            requeued = disposition.requeues(),
            consumed = self.state.consumed,
            "message settled"
        );

        if self.state.target_reached() {
            self.state.request_stop(StopReason::TargetReached);
        } else if self.guard.is_overloaded(self.state.memory_limit_bytes) {
            warn!(
                queue = %self.queue,
                memory_limit_bytes = ?self.state.memory_limit_bytes,
                "memory limit reached, stopping consumer"
            );
            self.state.request_stop(StopReason::MemoryLimit);
        }
        Ok(())
    }
}

/// Issue `disposition` on the channel that delivered `message`.
async fn settle(message: &Message, disposition: Disposition) -> Result<(), ConsumeError> {
    let channel = message.channel();
    let delivery_tag = message.delivery_tag();
    let result = match disposition {
        Disposition::Ack => channel.ack(delivery_tag).await,
        Disposition::RejectRequeue => channel.reject(delivery_tag, true).await,
        Disposition::NackRequeue => channel.nack(delivery_tag, false, true).await,
        Disposition::RejectDrop => channel.reject(delivery_tag, false).await,
    };
    result.map_err(|source| {
        error!(%delivery_tag, %disposition, error = %source, "failed to settle message");
        ConsumeError::Disposition {
            delivery_tag,
            disposition,
            source,
        }
    })
}
