//! hopper-core
//!
//! broker キュー consumer の中核部品。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（message, disposition, outcome, events, errors）
//! - **ports**: 外部との境界（Channel, MessageHandler, MemoryProbe）
//! - **app**: consumer 本体（builder, consume ループ, notifier, resource guard, stop / purge handle）
//! - **impls**: プロセス内実装（InMemoryChannel, ProcessMemoryProbe, ClearCachesListener）
//! - **config**: 設定（TOML ファイル + `HOPPER_*` 環境変数）
//! - **error**: `consume` を終わらせるエラー

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;

pub use app::{
    BuildError, ConsumeReport, Consumer, ConsumerBuilder, PurgeHandle, StopHandle, StopReason,
};
pub use config::{ConfigError, ConsumerConfig};
pub use error::ConsumeError;
