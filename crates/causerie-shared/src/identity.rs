use rand::rngs::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::constants::{KDF_CONTEXT_TRANSPORT_SEED, SECRET_KEY_SIZE};
use crate::error::KeyError;
use crate::types::Pubkey;

/// The local participant's cryptographic identity: an X25519 static
/// secret. The public key derived from it is the participant's address
/// on the wire; the secret itself is persisted as hex in the local store
/// and must never appear in a message or a log line.
#[derive(Clone)]
pub struct Identity {
    secret: StaticSecret,
}

impl Identity {
    /// Generate a fresh random identity.
    pub fn generate() -> Self {
        Self {
            secret: StaticSecret::random_from_rng(OsRng),
        }
    }

    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        Self {
            secret: StaticSecret::from(*secret),
        }
    }

    /// Restore an identity from the hex text stored in the local store.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s.trim())?;
        if bytes.len() != SECRET_KEY_SIZE {
            return Err(KeyError::Length(bytes.len()));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self::from_secret_bytes(&arr))
    }

    /// Hex encoding of the secret, for persistence only.
    pub fn secret_hex(&self) -> String {
        hex::encode(self.secret.to_bytes())
    }

    /// The public key derived deterministically from the secret.
    pub fn public(&self) -> Pubkey {
        Pubkey(PublicKey::from(&self.secret).to_bytes())
    }

    /// Deterministic 32-byte seed for the transport-layer keypair,
    /// domain-separated so it is not the chat secret itself.
    pub fn transport_seed(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new_derive_key(KDF_CONTEXT_TRANSPORT_SEED);
        hasher.update(&self.secret.to_bytes());
        *hasher.finalize().as_bytes()
    }

    pub(crate) fn secret(&self) -> &StaticSecret {
        &self.secret
    }
}

// The secret never renders through Debug.
impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("public", &self.public().to_hex())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_key_is_deterministic() {
        let id = Identity::generate();
        let restored = Identity::from_hex(&id.secret_hex()).unwrap();
        assert_eq!(id.public(), restored.public());
    }

    #[test]
    fn distinct_identities_have_distinct_keys() {
        assert_ne!(Identity::generate().public(), Identity::generate().public());
    }

    #[test]
    fn from_hex_rejects_corrupt_input() {
        assert!(Identity::from_hex("abcd").is_err());
        assert!(Identity::from_hex("not hex").is_err());
    }

    #[test]
    fn transport_seed_is_stable_and_not_the_secret() {
        let id = Identity::generate();
        assert_eq!(id.transport_seed(), id.transport_seed());
        assert_ne!(hex::encode(id.transport_seed()), id.secret_hex());
    }

    #[test]
    fn debug_never_shows_the_secret() {
        let id = Identity::generate();
        let rendered = format!("{id:?}");
        assert!(rendered.contains(&id.public().to_hex()));
        assert!(!rendered.contains(&id.secret_hex()));
    }
}
