//! StopHandle - 処理中のメッセージを終えてから止める

use std::sync::Arc;

use tokio::sync::watch;

/// graceful stop を要求する Clone 可能なハンドル
///
/// # 挙動
/// - 処理中のメッセージは中断しない（次のループ境界で止まる）
/// - `wait_for_delivery` で待機中の consumer は起こす
/// - 一度要求したら戻らない: 同じ consumer の以後の `consume` は即 return
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub(crate) fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx: Arc::new(tx) }, rx)
    }

    pub fn request_stop(&self) {
        // send_replace never fails, even with no receiver left
        self.tx.send_replace(true);
    }

    pub fn is_stop_requested(&self) -> bool {
        *self.tx.borrow()
    }
}
