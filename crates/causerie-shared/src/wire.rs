//! The chat wire format.
//!
//! A chat message is a UTF-8 JSON record with exactly the fields
//! `timestamp`, `nick`, `fromPubkey`, optional `chan`, and `payload`.
//! This is the only bit-exact contract in the system: any change to
//! field names or types silently breaks interoperability with other
//! clients on the same topic (the schema carries no version tag).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WireError;
use crate::types::{Chan, Pubkey};

/// One chat message as it travels on the chat topic.
///
/// `timestamp` is sender-asserted integer seconds since epoch; it is not
/// authenticated and is only trusted for display ordering. Unknown extra
/// fields are ignored on decode; a missing mandatory field or a wrong
/// basic type fails the whole record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatFields {
    pub timestamp: i64,
    pub nick: String,
    #[serde(rename = "fromPubkey")]
    pub from_pubkey: Pubkey,
    #[serde(default, skip_serializing_if = "Chan::is_default_room")]
    pub chan: Chan,
    pub payload: String,
}

impl ChatFields {
    /// Build an outgoing message, stamping `now` truncated to whole
    /// seconds the way every other client on the topic does.
    pub fn outgoing(
        from_pubkey: Pubkey,
        nick: &str,
        chan: Chan,
        text: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp: now.timestamp(),
            nick: nick.to_string(),
            from_pubkey,
            chan,
            payload: text.to_string(),
        }
    }

    /// Serialize to the canonical UTF-8 JSON text. Field order is fixed
    /// by the struct definition and round-trips exactly through
    /// [`ChatFields::decode`].
    pub fn encode(&self) -> String {
        serde_json::to_string(self).expect("ChatFields serialization cannot fail")
    }

    /// Parse a raw payload back into a record. Callers discard the
    /// message on failure; decode errors never propagate further.
    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let text = std::str::from_utf8(payload)?;
        Ok(serde_json::from_str(text)?)
    }
}

/// An invite announcing a key-scoped chat, published sealed to each
/// member on the invites topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteFields {
    /// The channel id of the chat being announced.
    pub chat_id: crate::types::ChannelId,
    /// Hex-encoded 32-byte symmetric key shared by the chat members.
    pub symmetric_key: String,
    /// Every member's public key, sorted.
    pub pubkeys: Vec<Pubkey>,
}

impl InviteFields {
    pub fn encode(&self) -> String {
        serde_json::to_string(self).expect("InviteFields serialization cannot fail")
    }

    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let text = std::str::from_utf8(payload)?;
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChannelId;
    use chrono::TimeZone;

    fn key(b: u8) -> Pubkey {
        Pubkey([b; 32])
    }

    fn sample(chan: Chan) -> ChatFields {
        ChatFields {
            timestamp: 1_650_000_000,
            nick: "steve".to_string(),
            from_pubkey: key(0xAB),
            chan,
            payload: "hello there".to_string(),
        }
    }

    #[test]
    fn roundtrip_default_room() {
        let msg = sample(Chan::DefaultRoom);
        let decoded = ChatFields::decode(msg.encode().as_bytes()).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn roundtrip_channel() {
        let chan = Chan::Channel(ChannelId::from_keys([key(1), key(0xAB)]));
        let msg = sample(chan);
        let decoded = ChatFields::decode(msg.encode().as_bytes()).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn default_room_omits_chan_field() {
        let encoded = sample(Chan::DefaultRoom).encode();
        assert!(!encoded.contains("chan"));
    }

    #[test]
    fn encoded_shape_matches_other_clients() {
        let msg = sample(Chan::DefaultRoom);
        let expected = format!(
            r#"{{"timestamp":1650000000,"nick":"steve","fromPubkey":"{}","payload":"hello there"}}"#,
            key(0xAB).to_hex()
        );
        assert_eq!(msg.encode(), expected);
    }

    #[test]
    fn decodes_captured_client_json() {
        // As emitted by the reference web client.
        let raw = format!(
            r#"{{"timestamp":1651000000,"nick":"fluky-mink","fromPubkey":"{}","chan":"{},{}","payload":"yo"}}"#,
            key(2).to_hex(),
            key(1).to_hex(),
            key(2).to_hex()
        );
        let msg = ChatFields::decode(raw.as_bytes()).unwrap();
        assert_eq!(msg.nick, "fluky-mink");
        assert_eq!(msg.from_pubkey, key(2));
        assert_eq!(
            msg.chan,
            Chan::Channel(ChannelId::from_keys([key(1), key(2)]))
        );
    }

    #[test]
    fn null_and_empty_chan_mean_default_room() {
        for chan_json in [r#""chan":null,"#, r#""chan":"","#] {
            let raw = format!(
                r#"{{"timestamp":1,"nick":"n","fromPubkey":"{}",{}"payload":"p"}}"#,
                key(3).to_hex(),
                chan_json
            );
            let msg = ChatFields::decode(raw.as_bytes()).unwrap();
            assert!(msg.chan.is_default_room());
        }
    }

    #[test]
    fn unknown_extra_fields_are_ignored() {
        let raw = format!(
            r#"{{"timestamp":1,"nick":"n","fromPubkey":"{}","payload":"p","v":2}}"#,
            key(3).to_hex()
        );
        assert!(ChatFields::decode(raw.as_bytes()).is_ok());
    }

    #[test]
    fn missing_mandatory_field_fails() {
        let raw = format!(
            r#"{{"timestamp":1,"fromPubkey":"{}","payload":"p"}}"#,
            key(3).to_hex()
        );
        assert!(ChatFields::decode(raw.as_bytes()).is_err());
    }

    #[test]
    fn wrong_basic_type_fails() {
        let raw = format!(
            r#"{{"timestamp":"soon","nick":"n","fromPubkey":"{}","payload":"p"}}"#,
            key(3).to_hex()
        );
        assert!(ChatFields::decode(raw.as_bytes()).is_err());
    }

    #[test]
    fn bad_pubkey_fails() {
        let raw = r#"{"timestamp":1,"nick":"n","fromPubkey":"abc","payload":"p"}"#;
        assert!(ChatFields::decode(raw.as_bytes()).is_err());
    }

    #[test]
    fn truncated_and_garbage_input_fail_without_panicking() {
        let full = sample(Chan::DefaultRoom).encode();
        assert!(ChatFields::decode(&full.as_bytes()[..full.len() - 5]).is_err());
        assert!(ChatFields::decode(b"not json at all").is_err());
        assert!(ChatFields::decode(&[0xFF, 0xFE, 0x00]).is_err());
        assert!(ChatFields::decode(b"").is_err());
    }

    #[test]
    fn outgoing_truncates_to_whole_seconds() {
        let now = Utc.timestamp_opt(1_650_000_123, 456_789_000).unwrap();
        let msg = ChatFields::outgoing(key(1), "n", Chan::DefaultRoom, "t", now);
        assert_eq!(msg.timestamp, 1_650_000_123);
    }

    #[test]
    fn invite_roundtrip_uses_camel_case() {
        let invite = InviteFields {
            chat_id: ChannelId::from_keys([key(1), key(2)]),
            symmetric_key: hex::encode([7u8; 32]),
            pubkeys: vec![key(1), key(2)],
        };
        let encoded = invite.encode();
        assert!(encoded.contains("chatId"));
        assert!(encoded.contains("symmetricKey"));
        assert_eq!(InviteFields::decode(encoded.as_bytes()).unwrap(), invite);
    }
}
