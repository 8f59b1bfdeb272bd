//! # causerie-client
//!
//! The chat core: identity bootstrap from the local store, the message
//! history assembler, channel/member directory, send fan-out, and
//! invites. Rendering is someone else's job; this crate ends at typed
//! data.

pub mod directory;
pub mod history;
pub mod identity;
pub mod invites;
pub mod session;

mod error;

pub use directory::Directory;
pub use error::ClientError;
pub use history::{Envelope, History};
pub use identity::{ensure_identity, ensure_nick};
pub use invites::{create_chat, InviteBook};
pub use session::{ChatSession, SendOutcome, SendReport};
