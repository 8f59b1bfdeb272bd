//! Sealed payloads for key-scoped messages.
//!
//! A payload sealed to a recipient key can only be opened by the holder
//! of the matching secret: ephemeral X25519 agreement, a BLAKE3 KDF with
//! a domain-separation context, then XChaCha20-Poly1305. The output
//! layout is `ephemeral_pub(32) || nonce(24) || ciphertext`.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use x25519_dalek::{EphemeralSecret, PublicKey};

use crate::constants::{KDF_CONTEXT_SEAL, NONCE_SIZE, PUBKEY_SIZE, SYMMETRIC_KEY_SIZE};
use crate::error::CryptoError;
use crate::identity::Identity;
use crate::types::Pubkey;

pub type SymmetricKey = [u8; SYMMETRIC_KEY_SIZE];

pub fn generate_symmetric_key() -> SymmetricKey {
    let mut key = [0u8; SYMMETRIC_KEY_SIZE];
    OsRng.fill_bytes(&mut key);
    key
}

fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

// BLAKE3 KDF binding the shared secret to both public halves.
fn derive_seal_key(shared: &[u8; 32], eph_pub: &[u8; 32], recipient: &[u8; 32]) -> SymmetricKey {
    let mut hasher = blake3::Hasher::new_derive_key(KDF_CONTEXT_SEAL);
    hasher.update(shared);
    hasher.update(eph_pub);
    hasher.update(recipient);
    *hasher.finalize().as_bytes()
}

/// Seal `plaintext` so only the holder of `recipient`'s secret can read it.
pub fn seal(recipient: &Pubkey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let eph_pub = PublicKey::from(&ephemeral).to_bytes();
    let shared = ephemeral.diffie_hellman(&PublicKey::from(recipient.0));

    let key = derive_seal_key(shared.as_bytes(), &eph_pub, &recipient.0);
    let cipher = XChaCha20Poly1305::new(&key.into());
    let nonce_bytes = generate_nonce();
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut output = Vec::with_capacity(PUBKEY_SIZE + NONCE_SIZE + ciphertext.len());
    output.extend_from_slice(&eph_pub);
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

/// Open a sealed payload with the local identity. Fails when the payload
/// was sealed to someone else, was tampered with, or is truncated.
pub fn open(identity: &Identity, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if data.len() < PUBKEY_SIZE + NONCE_SIZE {
        return Err(CryptoError::DecryptionFailed);
    }

    let (eph_pub_bytes, rest) = data.split_at(PUBKEY_SIZE);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_SIZE);

    let mut eph_pub = [0u8; 32];
    eph_pub.copy_from_slice(eph_pub_bytes);

    let shared = identity.secret().diffie_hellman(&PublicKey::from(eph_pub));
    let key = derive_seal_key(shared.as_bytes(), &eph_pub, &identity.public().0);

    let cipher = XChaCha20Poly1305::new(&key.into());
    let nonce = XNonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}
