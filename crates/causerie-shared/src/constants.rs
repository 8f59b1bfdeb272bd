/// Protocol version string for libp2p identify
pub const PROTOCOL_VERSION: &str = "/causerie/1.0.0";

/// Application name
pub const APP_NAME: &str = "causerie";

/// Pub/sub topic for the chat room. All conversations share this one
/// topic and are split into channels client-side.
pub const CHAT_TOPIC: &str = "/causerie/1/chat/json";

/// Pub/sub topic on which chat invites are announced.
pub const INVITES_TOPIC: &str = "/causerie/1/invites/json";

/// XChaCha20-Poly1305 nonce size in bytes
pub const NONCE_SIZE: usize = 24;

/// X25519 public key size in bytes
pub const PUBKEY_SIZE: usize = 32;

/// X25519 secret key size in bytes
pub const SECRET_KEY_SIZE: usize = 32;

/// Symmetric key size in bytes (for XChaCha20-Poly1305)
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// Maximum message size in bytes (256 KiB)
pub const MAX_MESSAGE_SIZE: usize = 262_144;

/// GossipSub heartbeat interval in seconds
pub const GOSSIPSUB_HEARTBEAT_SECS: u64 = 1;

/// Default QUIC listen port
pub const DEFAULT_QUIC_PORT: u16 = 4001;

/// Local store key under which the private key is persisted (hex).
pub const STORE_KEY_PRIVATE: &str = "privatekey_hex";

/// Local store key under which the display nick is persisted.
pub const STORE_KEY_NICK: &str = "nick";

/// Number of hex characters shown for a pubkey when no nick is known.
pub const KEY_PREFIX_LEN: usize = 12;

/// Key derivation contexts (BLAKE3)
pub const KDF_CONTEXT_SEAL: &str = "causerie-seal-v1";
pub const KDF_CONTEXT_TRANSPORT_SEED: &str = "causerie-transport-seed-v1";
