//! App - consumer 本体
//!
//! # 構成
//! - **ConsumerBuilder**: 配線と fail-fast な検証
//! - **Consumer**: consume ループ（wait -> handle -> resolve -> settle -> notify）
//! - **Notifier**: 同期・priority 順のライフサイクル listener
//! - **ResourceGuard**: メッセージごとのメモリ上限チェック
//! - **StopHandle**: 他タスクからの graceful stop
//! - **PurgeHandle**: 他タスクからの purge（ループ実行中も可）
//! - **ConsumeReport**: `consume` 1回分の集計と停止理由

pub mod builder;
pub mod consumer;
pub mod notifier;
pub mod purge;
pub mod resource_guard;
pub mod state;
pub mod status;
pub mod stop;

pub use self::builder::{BuildError, ConsumerBuilder};
pub use self::consumer::Consumer;
pub use self::notifier::{Listener, Notifier};
pub use self::purge::PurgeHandle;
pub use self::resource_guard::ResourceGuard;
pub use self::state::{LoopState, StopReason};
pub use self::status::ConsumeReport;
pub use self::stop::StopHandle;
