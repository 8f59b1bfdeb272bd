//! Chat invites: announcing a key-scoped conversation to its members.
//!
//! An invite carries the chat id, a fresh symmetric key, and the member
//! list, and is published once per member, sealed to that member's key,
//! on the invites topic. Receivers accumulate invites in an
//! [`InviteBook`]; the first invite seen for a chat id wins.

use std::collections::BTreeMap;

use chrono::Utc;
use tracing::{debug, info};

use causerie_net::{StoredPayload, TransportHandle};
use causerie_shared::constants::INVITES_TOPIC;
use causerie_shared::{crypto, ChannelId, InviteFields, Pubkey};

use crate::error::ClientError;
use crate::session::{SendOutcome, SendReport};

/// Create a chat among `members` and announce it: one sealed invite per
/// member key, each carrying the same fresh symmetric key. The caller
/// should include their own key so their other devices (and their own
/// invite book) learn the chat too.
pub async fn create_chat(
    transport: &TransportHandle,
    members: &[Pubkey],
) -> Result<(ChannelId, SendReport), ClientError> {
    let chat_id = ChannelId::from_keys(members.iter().copied());
    let symmetric_key = hex::encode(crypto::generate_symmetric_key());
    let sorted_members = chat_id.members()?;

    let invite = InviteFields {
        chat_id: chat_id.clone(),
        symmetric_key,
        pubkeys: sorted_members.clone(),
    };
    let payload = invite.encode().into_bytes();

    info!(chat = %chat_id, members = sorted_members.len(), "creating chat");

    let mut report = SendReport::default();
    let now = Utc::now();
    for member in sorted_members {
        let result = transport
            .publish(INVITES_TOPIC, payload.clone(), now, Some(member))
            .await;
        report.outcomes.push(SendOutcome {
            recipient: Some(member),
            result,
        });
    }

    Ok((chat_id, report))
}

/// Invites observed on the invites topic, keyed by chat id. Populated
/// from the history query and extended by live deliveries through the
/// same code path.
#[derive(Debug, Default)]
pub struct InviteBook {
    invites: BTreeMap<ChannelId, InviteFields>,
}

impl InviteBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-load all stored invites addressed to us. Returns the number
    /// of invites this load added to the book.
    pub async fn load(&mut self, transport: &TransportHandle) -> Result<usize, ClientError> {
        let before = self.invites.len();
        let stored = transport.query(INVITES_TOPIC).await?;
        for s in &stored {
            self.observe_payload(&s.payload);
        }
        let added = self.invites.len() - before;
        info!(added, total = self.invites.len(), "invite history loaded");
        Ok(added)
    }

    /// Process one raw invites-topic delivery. Undecodable payloads are
    /// discarded; a chat id already in the book keeps its first invite.
    pub fn observe_payload(&mut self, payload: &[u8]) -> Option<&InviteFields> {
        match InviteFields::decode(payload) {
            Ok(invite) => {
                let id = invite.chat_id.clone();
                let entry = self.invites.entry(id).or_insert_with(|| {
                    debug!(chat = %invite.chat_id, "adding invite");
                    invite
                });
                Some(entry)
            }
            Err(e) => {
                debug!(error = %e, "discarding undecodable invite payload");
                None
            }
        }
    }

    /// Convenience wrapper for live deliveries.
    pub fn observe_delivery(&mut self, delivery: &StoredPayload) -> Option<&InviteFields> {
        self.observe_payload(&delivery.payload)
    }

    pub fn get(&self, chat_id: &ChannelId) -> Option<&InviteFields> {
        self.invites.get(chat_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InviteFields> {
        self.invites.values()
    }

    pub fn len(&self) -> usize {
        self.invites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invites.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(b: u8) -> Pubkey {
        Pubkey([b; 32])
    }

    fn invite(chat_id: ChannelId, sym: &str) -> InviteFields {
        let pubkeys = chat_id.members().unwrap();
        InviteFields {
            chat_id,
            symmetric_key: sym.to_string(),
            pubkeys,
        }
    }

    #[test]
    fn first_invite_per_chat_wins() {
        let mut book = InviteBook::new();
        let id = ChannelId::from_keys([key(1), key(2)]);

        book.observe_payload(invite(id.clone(), "aaaa").encode().as_bytes());
        book.observe_payload(invite(id.clone(), "bbbb").encode().as_bytes());

        assert_eq!(book.len(), 1);
        assert_eq!(book.get(&id).unwrap().symmetric_key, "aaaa");
    }

    #[test]
    fn garbage_payloads_are_discarded() {
        let mut book = InviteBook::new();
        assert!(book.observe_payload(b"{ nope").is_none());
        assert!(book.observe_payload(b"").is_none());
        assert!(book.is_empty());
    }

    #[test]
    fn distinct_chats_accumulate() {
        let mut book = InviteBook::new();
        let a = ChannelId::from_keys([key(1), key(2)]);
        let b = ChannelId::from_keys([key(1), key(3)]);

        book.observe_payload(invite(a, "aa").encode().as_bytes());
        book.observe_payload(invite(b, "bb").encode().as_bytes());

        assert_eq!(book.len(), 2);
    }
}
