//! Member and channel directory gleaned from observed messages.
//!
//! There is no registration anywhere: the only way to learn who a key
//! belongs to is to see them speak. The directory scans all known
//! envelopes, maps each sender key to its latest observed nick, and
//! labels every channel seen with the nicks of its members.

use std::collections::{BTreeMap, HashMap};

use causerie_shared::constants::KEY_PREFIX_LEN;
use causerie_shared::{Chan, ChannelId};

use crate::history::{Envelope, History};

#[derive(Debug, Default)]
pub struct Directory {
    /// Latest observed nick per hex pubkey, in scan order.
    nicks: HashMap<String, String>,
    /// Every channel id seen, labelled with its members' nicks.
    channels: BTreeMap<ChannelId, String>,
}

impl Directory {
    /// Build the directory by scanning the whole history.
    pub fn scan(history: &History) -> Self {
        let mut nicks = HashMap::new();
        for envelope in history.iter() {
            nicks.insert(envelope.sender().to_hex(), envelope.nick().to_string());
        }

        // Second pass so channel labels use the complete nick map.
        let mut channels = BTreeMap::new();
        for envelope in history.iter() {
            if let Chan::Channel(id) = envelope.chan() {
                let label = label_members(id, &nicks);
                channels.insert(id.clone(), label);
            }
        }

        Self { nicks, channels }
    }

    /// Display name for a hex pubkey: the observed nick, or a truncated
    /// key prefix when that key has never spoken.
    pub fn display_name(&self, pubkey_hex: &str) -> String {
        match self.nicks.get(pubkey_hex) {
            Some(nick) => nick.clone(),
            None => pubkey_hex.chars().take(KEY_PREFIX_LEN).collect(),
        }
    }

    /// Known members as (hex pubkey, nick) pairs.
    pub fn members(&self) -> impl Iterator<Item = (&str, &str)> {
        self.nicks.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Every channel seen, with its member-nick label.
    pub fn channels(&self) -> impl Iterator<Item = (&ChannelId, &str)> {
        self.channels.iter().map(|(id, label)| (id, label.as_str()))
    }

    pub fn channel_label(&self, id: &ChannelId) -> Option<&str> {
        self.channels.get(id).map(String::as_str)
    }
}

fn label_members(id: &ChannelId, nicks: &HashMap<String, String>) -> String {
    id.member_keys()
        .map(|key| match nicks.get(key) {
            Some(nick) => nick.clone(),
            None => key.chars().take(KEY_PREFIX_LEN).collect(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use causerie_shared::{ChatFields, Pubkey};
    use chrono::Utc;

    fn key(b: u8) -> Pubkey {
        Pubkey([b; 32])
    }

    fn envelope(from: Pubkey, nick: &str, chan: Chan) -> Envelope {
        Envelope::new(
            ChatFields {
                timestamp: 1,
                nick: nick.to_string(),
                from_pubkey: from,
                chan,
                payload: "x".to_string(),
            },
            Utc::now(),
        )
    }

    #[test]
    fn latest_nick_wins() {
        let mut history = History::default();
        history.append_live(envelope(key(1), "old-name", Chan::DefaultRoom));
        history.append_live(envelope(key(1), "new-name", Chan::DefaultRoom));

        let dir = Directory::scan(&history);
        assert_eq!(dir.display_name(&key(1).to_hex()), "new-name");
    }

    #[test]
    fn unknown_keys_fall_back_to_a_prefix() {
        let dir = Directory::scan(&History::default());
        let hex = key(7).to_hex();
        assert_eq!(dir.display_name(&hex), hex[..KEY_PREFIX_LEN].to_string());
    }

    #[test]
    fn channels_are_labelled_with_member_nicks() {
        let chan_id = ChannelId::from_keys([key(1), key(2)]);
        let mut history = History::default();
        history.append_live(envelope(key(1), "ana", Chan::DefaultRoom));
        // key(2) never spoke; its label falls back to the key prefix.
        history.append_live(envelope(key(1), "ana", Chan::Channel(chan_id.clone())));

        let dir = Directory::scan(&history);
        let label = dir.channel_label(&chan_id).unwrap();
        assert!(label.contains("ana"));
        assert!(label.contains(&key(2).to_hex()[..KEY_PREFIX_LEN]));
    }

    #[test]
    fn labels_use_nicks_observed_after_the_channel_message() {
        let chan_id = ChannelId::from_keys([key(1), key(2)]);
        let mut history = History::default();
        // The channel message arrives before key(2) ever speaks.
        history.append_live(envelope(key(1), "ana", Chan::Channel(chan_id.clone())));
        history.append_live(envelope(key(2), "bo", Chan::DefaultRoom));

        let dir = Directory::scan(&history);
        assert_eq!(dir.channel_label(&chan_id).unwrap(), "ana, bo");
    }

    #[test]
    fn default_room_traffic_creates_no_channel() {
        let mut history = History::default();
        history.append_live(envelope(key(1), "ana", Chan::DefaultRoom));

        let dir = Directory::scan(&history);
        assert_eq!(dir.channels().count(), 0);
    }
}
