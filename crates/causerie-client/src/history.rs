//! The receive-path history assembler.
//!
//! Bulk-loaded history is sorted by the sender-asserted timestamp, since
//! stored payloads can arrive in any order relative to original sending.
//! Live messages are appended in arrival order without re-sorting; they
//! are assumed to arrive close to chronological order, which is all this
//! client promises.

use chrono::{DateTime, Utc};

use causerie_shared::{Chan, ChatFields, Pubkey};

/// One decoded chat message paired with the transport-assigned receipt
/// timestamp. Built once at decode time and immutable thereafter.
#[derive(Debug, Clone)]
pub struct Envelope {
    fields: ChatFields,
    received_at: DateTime<Utc>,
}

impl Envelope {
    pub fn new(fields: ChatFields, received_at: DateTime<Utc>) -> Self {
        Self {
            fields,
            received_at,
        }
    }

    pub fn fields(&self) -> &ChatFields {
        &self.fields
    }

    /// Sender-asserted send time, integer seconds since epoch.
    pub fn sent_timestamp(&self) -> i64 {
        self.fields.timestamp
    }

    /// When the transport delivered this message locally.
    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn nick(&self) -> &str {
        &self.fields.nick
    }

    pub fn sender(&self) -> Pubkey {
        self.fields.from_pubkey
    }

    pub fn chan(&self) -> &Chan {
        &self.fields.chan
    }

    pub fn text(&self) -> &str {
        &self.fields.payload
    }
}

/// Append-only ordered sequence of envelopes for one session. Not
/// persisted; it is rebuilt from the transport's history on the next
/// session.
#[derive(Debug, Default)]
pub struct History {
    entries: Vec<Envelope>,
}

impl History {
    /// Install the bulk historical load, sorting ascending by the
    /// sender-asserted timestamp.
    pub fn install(&mut self, mut envelopes: Vec<Envelope>) {
        envelopes.sort_by_key(Envelope::sent_timestamp);
        self.entries = envelopes;
    }

    /// Append one live delivery without re-sorting.
    pub fn append_live(&mut self, envelope: Envelope) {
        self.entries.push(envelope);
    }

    /// The envelopes addressed to `chan`, relative order preserved.
    /// `Chan::DefaultRoom` matches exactly the messages whose wire
    /// `chan` field was absent.
    pub fn visible_in(&self, chan: &Chan) -> Vec<&Envelope> {
        self.entries.iter().filter(|e| e.chan() == chan).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Envelope> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&Envelope> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causerie_shared::ChannelId;

    fn key(b: u8) -> Pubkey {
        Pubkey([b; 32])
    }

    fn envelope(timestamp: i64, chan: Chan, text: &str) -> Envelope {
        Envelope::new(
            ChatFields {
                timestamp,
                nick: "n".to_string(),
                from_pubkey: key(1),
                chan,
                payload: text.to_string(),
            },
            Utc::now(),
        )
    }

    #[test]
    fn install_sorts_by_sender_asserted_timestamp() {
        let mut history = History::default();
        history.install(vec![
            envelope(30, Chan::DefaultRoom, "c"),
            envelope(10, Chan::DefaultRoom, "a"),
            envelope(20, Chan::DefaultRoom, "b"),
        ]);

        let timestamps: Vec<_> = history.iter().map(Envelope::sent_timestamp).collect();
        assert_eq!(timestamps, vec![10, 20, 30]);
    }

    #[test]
    fn live_appends_preserve_arrival_order() {
        let mut history = History::default();
        history.install(vec![envelope(10, Chan::DefaultRoom, "a")]);
        history.append_live(envelope(5, Chan::DefaultRoom, "late"));

        let timestamps: Vec<_> = history.iter().map(Envelope::sent_timestamp).collect();
        assert_eq!(timestamps, vec![10, 5]);
    }

    #[test]
    fn visible_in_filters_by_channel_and_keeps_order() {
        let chan = Chan::Channel(ChannelId::from_keys([key(1), key(2)]));
        let other = Chan::Channel(ChannelId::from_keys([key(1), key(3)]));

        let mut history = History::default();
        history.install(vec![
            envelope(1, Chan::DefaultRoom, "lobby-1"),
            envelope(2, chan.clone(), "dm-1"),
            envelope(3, other, "elsewhere"),
            envelope(4, chan.clone(), "dm-2"),
            envelope(5, Chan::DefaultRoom, "lobby-2"),
        ]);

        let in_chan: Vec<_> = history
            .visible_in(&chan)
            .iter()
            .map(|e| e.text().to_string())
            .collect();
        assert_eq!(in_chan, vec!["dm-1", "dm-2"]);

        let in_lobby: Vec<_> = history
            .visible_in(&Chan::DefaultRoom)
            .iter()
            .map(|e| e.text().to_string())
            .collect();
        assert_eq!(in_lobby, vec!["lobby-1", "lobby-2"]);
    }

    #[test]
    fn self_chat_does_not_leak_into_the_default_room() {
        let self_chan = Chan::Channel(ChannelId::from_keys([key(1)]));

        let mut history = History::default();
        history.append_live(envelope(1, self_chan.clone(), "note to self"));

        assert!(history.visible_in(&Chan::DefaultRoom).is_empty());
        assert_eq!(history.visible_in(&self_chan).len(), 1);
    }
}
