//! Domain - ドメインモデル（message, disposition, outcome, lifecycle events）
//!
//! broker とは直接話さない。何が届いたか、handler が何と言ったか、
//! broker に何を伝えるかだけを表す。

pub mod disposition;
pub mod errors;
pub mod events;
pub mod message;
pub mod outcome;

pub use disposition::Disposition;
pub use errors::HandlerError;
pub use events::{ConsumerEvent, EventKind, Verdict};
pub use message::{ChannelRef, ConsumerTag, DeliveryTag, Message};
pub use outcome::{ProcessingOutcome, resolve};
