//! Identity and nick bootstrap from the durable local store.

use rand::seq::SliceRandom;
use rand::thread_rng;
use tracing::info;

use causerie_shared::constants::{STORE_KEY_NICK, STORE_KEY_PRIVATE};
use causerie_shared::Identity;
use causerie_store::KeyValueStore;

use crate::error::ClientError;

/// Load the local identity, generating and persisting one on first use.
///
/// The public key is derived from the stored secret on every call. A
/// store failure or corrupt hex is a fatal bootstrap error; the secret
/// itself never leaves the store/process boundary.
pub fn ensure_identity(store: &dyn KeyValueStore) -> Result<Identity, ClientError> {
    if let Some(secret_hex) = store.get(STORE_KEY_PRIVATE)? {
        return Identity::from_hex(&secret_hex).map_err(ClientError::CorruptIdentity);
    }

    let identity = Identity::generate();
    store.set(STORE_KEY_PRIVATE, &identity.secret_hex())?;
    info!(pubkey = %identity.public(), "generated new identity");
    Ok(identity)
}

/// Load the display nick, generating and persisting a default on first
/// use.
pub fn ensure_nick(store: &dyn KeyValueStore) -> Result<String, ClientError> {
    if let Some(nick) = store.get(STORE_KEY_NICK)? {
        return Ok(nick);
    }

    let nick = default_nick();
    store.set(STORE_KEY_NICK, &nick)?;
    info!(nick = %nick, "generated default nick");
    Ok(nick)
}

const ADJECTIVES: &[&str] = &[
    "amber", "bold", "brisk", "calm", "deft", "eager", "fluky", "glad", "hazy", "keen",
    "lucid", "merry", "nimble", "plucky", "quiet", "rapid", "sly", "tidy", "vivid", "witty",
];

const ANIMALS: &[&str] = &[
    "auk", "bison", "crane", "dingo", "egret", "ferret", "gecko", "heron", "ibex", "jay",
    "koala", "lemur", "mink", "newt", "otter", "puffin", "quail", "raven", "stoat", "tapir",
];

/// A readable throwaway nick, adjective-animal style.
pub fn default_nick() -> String {
    let mut rng = thread_rng();
    let adjective = ADJECTIVES.choose(&mut rng).expect("non-empty list");
    let animal = ANIMALS.choose(&mut rng).expect("non-empty list");
    format!("{adjective}-{animal}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use causerie_store::MemoryStore;

    #[test]
    fn identity_is_generated_once_and_reloaded() {
        let store = MemoryStore::new();

        let first = ensure_identity(&store).unwrap();
        let second = ensure_identity(&store).unwrap();
        assert_eq!(first.public(), second.public());

        let stored = store.get(STORE_KEY_PRIVATE).unwrap().unwrap();
        assert_eq!(stored, first.secret_hex());
    }

    #[test]
    fn corrupt_stored_hex_is_fatal() {
        let store = MemoryStore::new();
        store.set(STORE_KEY_PRIVATE, "not-hex-at-all").unwrap();

        assert!(matches!(
            ensure_identity(&store),
            Err(ClientError::CorruptIdentity(_))
        ));
    }

    #[test]
    fn nick_is_generated_once_and_reloaded() {
        let store = MemoryStore::new();

        let first = ensure_nick(&store).unwrap();
        let second = ensure_nick(&store).unwrap();
        assert_eq!(first, second);
        assert!(first.contains('-'));
    }

    #[test]
    fn existing_nick_wins() {
        let store = MemoryStore::new();
        store.set(STORE_KEY_NICK, "steve").unwrap();
        assert_eq!(ensure_nick(&store).unwrap(), "steve");
    }
}
