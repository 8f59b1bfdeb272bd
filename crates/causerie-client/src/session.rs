//! One participant's chat session: the send path with per-recipient
//! fan-out, and the receive path feeding the in-memory history.

use chrono::Utc;
use tracing::{debug, info};

use causerie_net::{StoredPayload, Subscription, TransportHandle};
use causerie_shared::constants::CHAT_TOPIC;
use causerie_shared::{Chan, ChatFields, Identity, Pubkey};

use crate::error::ClientError;
use crate::history::{Envelope, History};

/// The outcome of one per-recipient send within a group send.
#[derive(Debug)]
pub struct SendOutcome {
    /// `None` for the single plain send to the default room.
    pub recipient: Option<Pubkey>,
    pub result: Result<(), causerie_net::TransportError>,
}

/// Per-recipient results of one logical send. The caller chooses the
/// aggregation policy; [`SendReport::all_ok`] recovers the strict
/// all-or-nothing view. A failed aggregate means "status unknown per
/// recipient", not "guaranteed undelivered" -- some copies may already
/// be out.
#[derive(Debug, Default)]
pub struct SendReport {
    pub outcomes: Vec<SendOutcome>,
}

impl SendReport {
    pub fn all_ok(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn failed_recipients(&self) -> impl Iterator<Item = &SendOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// A connected chat session. Owns the live subscription and the
/// in-memory history; both are discarded when the session is torn down.
///
/// The live subscription starts only after the bulk history load (or on
/// the first live poll, if the load is skipped). A delivery therefore
/// arrives either in the query result or on the subscription, never
/// both, and the history stays duplicate-free across the load.
pub struct ChatSession {
    transport: TransportHandle,
    identity: Identity,
    nick: String,
    history: History,
    live: Option<Subscription>,
    live_started: bool,
}

impl ChatSession {
    /// Register the decryption key. Sends work immediately; the bulk
    /// history load is a separate, independently-awaited step.
    pub async fn connect(
        transport: TransportHandle,
        identity: Identity,
        nick: String,
    ) -> Result<Self, ClientError> {
        transport.add_decryption_key(identity.clone()).await?;

        info!(pubkey = %identity.public(), nick = %nick, "chat session connected");

        Ok(Self {
            transport,
            identity,
            nick,
            history: History::default(),
            live: None,
            live_started: false,
        })
    }

    async fn start_live(&mut self) -> Result<(), ClientError> {
        if !self.live_started {
            self.live = Some(self.transport.observe(CHAT_TOPIC).await?);
            self.live_started = true;
        }
        Ok(())
    }

    pub fn pubkey(&self) -> Pubkey {
        self.identity.public()
    }

    pub fn nick(&self) -> &str {
        &self.nick
    }

    pub fn set_nick(&mut self, nick: String) {
        self.nick = nick;
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Bulk-load all stored chat payloads, decode them (discarding
    /// failures), install them sorted by sender-asserted timestamp, and
    /// start the live feed. Waits for a remote peer first, since an
    /// isolated node has no history to offer. Returns the number of
    /// messages loaded.
    pub async fn load_history(&mut self) -> Result<usize, ClientError> {
        self.transport.wait_for_peer().await?;
        let stored = self.transport.query(CHAT_TOPIC).await?;

        let envelopes: Vec<Envelope> = stored
            .into_iter()
            .filter_map(|s| match ChatFields::decode(&s.payload) {
                Ok(fields) => Some(Envelope::new(fields, s.received_at)),
                Err(e) => {
                    debug!(error = %e, "discarding undecodable stored payload");
                    None
                }
            })
            .collect();

        let count = envelopes.len();
        self.history.install(envelopes);
        self.start_live().await?;
        info!(count, "chat history loaded");
        Ok(count)
    }

    /// Await the next live delivery, append it to the history, and
    /// return it. Starts the live feed if the bulk load has not done so
    /// already. `None` once the subscription is closed or detached.
    /// Undecodable payloads are discarded and the wait continues.
    pub async fn next_live(&mut self) -> Option<&Envelope> {
        if self.start_live().await.is_err() {
            return None;
        }
        let live = self.live.as_mut()?;
        loop {
            let delivery = live.recv().await?;
            match ChatFields::decode(&delivery.payload) {
                Ok(fields) => {
                    self.history
                        .append_live(Envelope::new(fields, delivery.received_at));
                    return self.history.last();
                }
                Err(e) => {
                    debug!(error = %e, "discarding undecodable live payload");
                }
            }
        }
    }

    /// Send `text` to `chan`.
    ///
    /// The default room gets exactly one plain publish. A key-scoped
    /// channel fans out one sealed publish per non-local member, because
    /// each recipient's sealing key differs; our own copy arrives via
    /// the transport's local echo. Self-chat (the channel whose only
    /// member is the local key) seals one copy to ourselves.
    pub async fn send(&self, chan: &Chan, text: &str) -> Result<SendReport, ClientError> {
        let now = Utc::now();
        let fields = ChatFields::outgoing(self.pubkey(), &self.nick, chan.clone(), text, now);
        let payload = fields.encode().into_bytes();

        let mut report = SendReport::default();

        match chan {
            Chan::DefaultRoom => {
                let result = self
                    .transport
                    .publish(CHAT_TOPIC, payload, now, None)
                    .await;
                report.outcomes.push(SendOutcome {
                    recipient: None,
                    result,
                });
            }
            Chan::Channel(id) => {
                let local = self.pubkey();
                let members = id.members()?;
                let mut recipients: Vec<Pubkey> =
                    members.into_iter().filter(|k| *k != local).collect();
                if recipients.is_empty() {
                    recipients.push(local);
                }

                for recipient in recipients {
                    debug!(chan = %id, recipient = %recipient, "sending sealed copy");
                    let result = self
                        .transport
                        .publish(CHAT_TOPIC, payload.clone(), now, Some(recipient))
                        .await;
                    report.outcomes.push(SendOutcome {
                        recipient: Some(recipient),
                        result,
                    });
                }
            }
        }

        Ok(report)
    }

    /// Decode a raw delivery and append it to the history. The
    /// companion to [`ChatSession::take_live`]: a caller polling the
    /// detached subscription feeds deliveries back through here so the
    /// history stays complete. Undecodable payloads are discarded.
    pub fn observe_delivery(&mut self, delivery: &StoredPayload) -> Option<&Envelope> {
        match ChatFields::decode(&delivery.payload) {
            Ok(fields) => {
                self.history
                    .append_live(Envelope::new(fields, delivery.received_at));
                self.history.last()
            }
            Err(e) => {
                debug!(error = %e, "discarding undecodable live payload");
                None
            }
        }
    }

    /// Detach the live subscription from the session, for callers that
    /// need to poll deliveries concurrently with sending (e.g. a
    /// select loop). Starts the feed first if the bulk load has not
    /// done so. The session's own [`ChatSession::next_live`] returns
    /// `None` afterwards.
    pub async fn take_live(&mut self) -> Result<Option<Subscription>, ClientError> {
        self.start_live().await?;
        Ok(self.live.take())
    }

    /// Tear down the live subscription. Idempotent, and final: the feed
    /// is not restarted afterwards. Also runs best-effort on drop.
    pub async fn close(&mut self) {
        self.live_started = true;
        if let Some(mut live) = self.live.take() {
            live.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causerie_net::TransportError;

    fn report(results: Vec<Result<(), TransportError>>) -> SendReport {
        SendReport {
            outcomes: results
                .into_iter()
                .map(|result| SendOutcome {
                    recipient: Some(Pubkey([0u8; 32])),
                    result,
                })
                .collect(),
        }
    }

    #[test]
    fn all_ok_requires_every_recipient() {
        assert!(report(vec![Ok(()), Ok(())]).all_ok());
        assert!(!report(vec![Ok(()), Err(TransportError::Closed)]).all_ok());
        assert!(report(Vec::new()).all_ok());
    }

    #[test]
    fn failed_recipients_are_enumerable() {
        let r = report(vec![
            Ok(()),
            Err(TransportError::Publish("boom".into())),
            Ok(()),
        ]);
        assert_eq!(r.failed_recipients().count(), 1);
        assert_eq!(r.len(), 3);
    }
}
