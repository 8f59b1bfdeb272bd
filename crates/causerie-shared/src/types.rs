use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::PUBKEY_SIZE;
use crate::error::KeyError;

/// Participant identity on the wire = X25519 public key (32 bytes).
/// Serialized as lowercase hex text, because that is what other clients
/// on the topic expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pubkey(pub [u8; 32]);

impl Pubkey {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != PUBKEY_SIZE {
            return Err(KeyError::Length(bytes.len()));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    pub fn short(&self) -> String {
        self.to_hex()[..8].to_string()
    }
}

impl std::fmt::Display for Pubkey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Pubkey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Pubkey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Pubkey::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Logical conversation identifier: the sorted, comma-joined hex public
/// keys of every participant, the local one included.
///
/// Sorting before joining is the central invariant of the addressing
/// scheme: any permutation of the same participant set must produce the
/// identical id. Hex strings are fixed-length lowercase, so lexicographic
/// order equals byte order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    /// Build a channel id from an arbitrary set of participant keys.
    /// Duplicates collapse, order does not matter.
    pub fn from_keys(keys: impl IntoIterator<Item = Pubkey>) -> Self {
        let mut hexes: Vec<String> = keys.into_iter().map(|k| k.to_hex()).collect();
        hexes.sort();
        hexes.dedup();
        Self(hexes.join(","))
    }

    /// Derive the channel id for a conversation between the local
    /// participant and `others`. The local key is always a member.
    pub fn derive(local: &Pubkey, others: impl IntoIterator<Item = Pubkey>) -> Self {
        Self::from_keys(std::iter::once(*local).chain(others))
    }

    /// Reconstruct a channel id from its already-joined text form,
    /// e.g. as received on the wire or typed into the demo.
    pub fn from_joined(s: &str) -> Self {
        Self(s.to_string())
    }

    /// The raw comma-separated member key strings, for display.
    pub fn member_keys(&self) -> impl Iterator<Item = &str> {
        self.0.split(',')
    }

    /// Strictly parse every member key, for send fan-out.
    pub fn members(&self) -> Result<Vec<Pubkey>, KeyError> {
        self.member_keys().map(Pubkey::from_hex).collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a chat message is addressed.
///
/// On the wire the default room is represented by the `chan` field being
/// absent, so "no channel" and "empty-string channel" collapse into one
/// explicit variant here instead of a nullable string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Chan {
    /// The shared public room (absent `chan` field on the wire).
    #[default]
    DefaultRoom,
    /// A key-scoped conversation.
    Channel(ChannelId),
}

impl Chan {
    pub fn is_default_room(&self) -> bool {
        matches!(self, Chan::DefaultRoom)
    }

    pub fn channel_id(&self) -> Option<&ChannelId> {
        match self {
            Chan::DefaultRoom => None,
            Chan::Channel(id) => Some(id),
        }
    }
}

impl From<ChannelId> for Chan {
    fn from(id: ChannelId) -> Self {
        Chan::Channel(id)
    }
}

impl Serialize for Chan {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Chan::DefaultRoom => serializer.serialize_none(),
            Chan::Channel(id) => serializer.serialize_str(id.as_str()),
        }
    }
}

impl<'de> Deserialize<'de> for Chan {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // `null` and `""` both mean the default room; peers have been
        // observed emitting either.
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(Chan::DefaultRoom),
            Some(s) if s.is_empty() => Ok(Chan::DefaultRoom),
            Some(s) => Ok(Chan::Channel(ChannelId(s))),
        }
    }
}
