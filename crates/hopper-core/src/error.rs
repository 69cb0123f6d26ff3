use thiserror::Error;

use crate::domain::{DeliveryTag, Disposition};
use crate::ports::ChannelError;

/// Errors that end a `consume` call.
///
/// Handler failures never show up here: they are settled as requeue or drop.
/// Only the channel can make the loop give up.
#[derive(Debug, Error)]
pub enum ConsumeError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("failed to {disposition} delivery {delivery_tag}: {source}")]
    Disposition {
        delivery_tag: DeliveryTag,
        disposition: Disposition,
        #[source]
        source: ChannelError,
    },
}
