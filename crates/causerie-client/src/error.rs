use thiserror::Error;

use causerie_net::TransportError;
use causerie_shared::KeyError;
use causerie_store::StoreError;

/// Errors surfaced by the chat core.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The durable local store is unavailable. Fatal to identity
    /// bootstrap; never retried silently.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The stored private key hex is unusable.
    #[error("Corrupt identity in local store: {0}")]
    CorruptIdentity(#[source] KeyError),

    /// A channel id contained a key that does not parse.
    #[error("Invalid channel member key: {0}")]
    BadChannel(#[from] KeyError),

    /// The transport boundary failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}
