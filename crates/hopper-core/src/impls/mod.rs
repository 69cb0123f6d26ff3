//! Impls - ports のプロセス内実装
//!
//! # 含まれるもの
//! - **InMemoryChannel**: 開発・デモ・テスト用の broker channel
//! - **ProcessMemoryProbe**: 自プロセスの常駐メモリ
//! - **ClearCachesListener**: メッセージごとに注入されたキャッシュを消す
//!
//! 実際の broker（AMQP クライアント）は別 crate で `ports::Channel` を実装する。

pub mod clear_caches;
pub mod inmem_channel;
pub mod proc_memory;

pub use self::clear_caches::{ClearCachesListener, Clearable};
pub use self::inmem_channel::{ChannelOp, InMemoryChannel};
pub use self::proc_memory::ProcessMemoryProbe;
