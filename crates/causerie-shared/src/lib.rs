//! # causerie-shared
//!
//! Protocol-level core shared by every causerie crate: the chat wire
//! format, channel addressing, local identity, and the sealed-payload
//! crypto used for key-scoped messages.

pub mod constants;
pub mod crypto;
pub mod identity;
pub mod types;
pub mod wire;

mod error;

pub use error::{CryptoError, KeyError, WireError};
pub use identity::Identity;
pub use types::{Chan, ChannelId, Pubkey};
pub use wire::{ChatFields, InviteFields};
