//! ClearCachesListener - メッセージごとにプロセス内キャッシュを捨てる
//!
//! 長時間動く consumer は ORM の identity map やメモ化した lookup を抱え続ける。
//! `EventKind::Received` に priority 50 で登録し、毎メッセージ空の状態から始める。

use std::sync::Arc;

use tracing::debug;

use crate::app::Listener;
use crate::domain::{ConsumerEvent, Verdict};

/// Something that can be emptied.
pub trait Clearable: Send + Sync {
    fn clear(&self);
}

#[derive(Default)]
pub struct ClearCachesListener {
    caches: Vec<Arc<dyn Clearable>>,
}

impl ClearCachesListener {
    /// Priority used when subscribing to `Received`: runs ahead of default (0) listeners.
    pub const PRIORITY: i32 = 50;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(mut self, cache: Arc<dyn Clearable>) -> Self {
        self.caches.push(cache);
        self
    }

    pub fn len(&self) -> usize {
        self.caches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }
}

impl Listener for ClearCachesListener {
    fn on_event(&self, event: &ConsumerEvent<'_>) -> Verdict {
        for cache in &self.caches {
            cache.clear();
        }
        debug!(
            delivery_tag = %event.message.delivery_tag(),
            caches = self.caches.len(),
            "cleared caches"
        );
        Verdict::Pass
    }
}
