//! Ports - consume ループと外部の境界
//!
//! broker とは `Channel`、ユーザーコードとは `MessageHandler`、OS とは
//! `MemoryProbe` だけを通して話す。それぞれ開発・テスト用の実装が `impls` にある。

pub mod channel;
pub mod handler;
pub mod memory_probe;

pub use self::channel::{Channel, ChannelError};
pub use self::handler::MessageHandler;
pub use self::memory_probe::{FixedMemoryProbe, MemoryProbe};
