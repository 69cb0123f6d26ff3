//! PurgeHandle - consume ループの実行中でもキューを purge する
//!
//! # 学習ポイント
//! - `consume(&mut self)` は Consumer を排他借用したまま await する
//! - purge に必要なのは channel と queue 名だけなので、それを clone して外に渡す
//! - StopHandle と同じ「ハンドルを先に取り出す」パターン

use std::sync::Arc;

use tracing::info;

use crate::error::ConsumeError;
use crate::ports::Channel;

/// 設定済みキューを強制 purge するハンドル（Clone 可）
#[derive(Clone)]
pub struct PurgeHandle {
    channel: Arc<dyn Channel>,
    queue: String,
}

impl PurgeHandle {
    pub(crate) fn new(channel: Arc<dyn Channel>, queue: String) -> Self {
        Self { channel, queue }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// ready なメッセージを全て捨て、捨てた件数を返す
    pub async fn purge(&self) -> Result<u32, ConsumeError> {
        let purged = self.channel.purge_queue(&self.queue).await?;
        info!(queue = %self.queue, purged, "queue purged");
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{ChannelOp, InMemoryChannel};
    use crate::ports::ChannelError;

    #[tokio::test]
    async fn purges_only_its_queue() {
        let channel = InMemoryChannel::new();
        channel.publish("orders", "a").await;
        channel.publish("orders", "b").await;
        channel.publish("audit", "c").await;

        let handle = PurgeHandle::new(channel.clone(), "orders".to_string());
        assert_eq!(handle.purge().await.unwrap(), 2);
        assert_eq!(handle.clone().purge().await.unwrap(), 0);

        assert_eq!(channel.ready_count("audit").await, 1);
        assert_eq!(
            channel.operations().await.first(),
            Some(&ChannelOp::Purge {
                queue: "orders".to_string(),
                purged: 2
            })
        );
    }

    #[tokio::test]
    async fn closed_channel_is_an_error() {
        let channel = InMemoryChannel::new();
        channel.close().await;

        let handle = PurgeHandle::new(channel, "orders".to_string());
        assert!(matches!(
            handle.purge().await,
            Err(ConsumeError::Channel(ChannelError::Closed))
        ));
    }
}
