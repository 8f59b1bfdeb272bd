//! In-process transport backend.
//!
//! A [`MemoryBus`] stands in for the real pub/sub network: every node
//! attached to the same bus sees every publish, and the bus keeps the
//! full framed history per topic so late joiners can `Query` it. Frames
//! are opened per node with that node's registered secrets, so sealed
//! payloads behave exactly as they do on the gossip backend. A
//! publisher always observes its own payload in plaintext (self-emit),
//! even when it was sealed to someone else. Used by the test suite and
//! for single-machine demos.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::info;

use causerie_shared::Identity;

use crate::frames::{encode_frame, open_frame};
use crate::handle::{
    StoredPayload, SubscriptionId, TransportCommand, TransportError, TransportHandle,
};

#[derive(Debug, Clone)]
struct BusEntry {
    framed: Vec<u8>,
    /// Unframed payload, used instead of `framed` on the publishing node.
    plaintext: Vec<u8>,
    publisher: u64,
    received_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct BusFrame {
    topic: String,
    entry: BusEntry,
}

#[derive(Default)]
struct BusInner {
    /// Raw framed payloads per topic, in publish order.
    history: HashMap<String, Vec<BusEntry>>,
    /// One tap per attached node, the publisher included.
    taps: Vec<mpsc::UnboundedSender<BusFrame>>,
    next_node_id: u64,
}

/// A shared in-process message bus. Cheap to clone; all clones attach
/// nodes to the same bus.
#[derive(Clone, Default)]
pub struct MemoryBus {
    inner: Arc<Mutex<BusInner>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new node and return its transport handle. The node task
    /// runs until the handle is dropped or `Shutdown` is sent.
    pub fn attach(&self) -> TransportHandle {
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<TransportCommand>(256);
        let (tap_tx, mut tap_rx) = mpsc::unbounded_channel::<BusFrame>();

        let inner = self.inner.clone();
        let node_id = {
            let mut bus = inner.lock().expect("bus lock");
            bus.taps.push(tap_tx);
            bus.next_node_id += 1;
            bus.next_node_id
        };

        tokio::spawn(async move {
            let mut secrets: Vec<Identity> = Vec::new();
            let mut subs: HashMap<SubscriptionId, (String, mpsc::Sender<StoredPayload>)> =
                HashMap::new();

            loop {
                tokio::select! {
                    cmd = cmd_rx.recv() => {
                        match cmd {
                            Some(TransportCommand::Publish { topic, payload, timestamp, seal_to, done }) => {
                                let framed = match encode_frame(&payload, seal_to.as_ref()) {
                                    Ok(f) => f,
                                    Err(e) => {
                                        let _ = done.send(Err(TransportError::Publish(e.to_string())));
                                        continue;
                                    }
                                };

                                let entry = BusEntry {
                                    framed,
                                    plaintext: payload,
                                    publisher: node_id,
                                    received_at: timestamp,
                                };

                                {
                                    let mut bus = inner.lock().expect("bus lock");
                                    bus.history
                                        .entry(topic.clone())
                                        .or_default()
                                        .push(entry.clone());
                                    bus.taps.retain(|tap| {
                                        tap.send(BusFrame {
                                            topic: topic.clone(),
                                            entry: entry.clone(),
                                        })
                                        .is_ok()
                                    });
                                }

                                let _ = done.send(Ok(()));
                            }
                            Some(TransportCommand::Query { topic, reply }) => {
                                let raw = {
                                    let bus = inner.lock().expect("bus lock");
                                    bus.history.get(&topic).cloned().unwrap_or_default()
                                };
                                let stored = raw
                                    .iter()
                                    .filter_map(|entry| {
                                        unwrap_entry(entry, node_id, &secrets).map(|payload| {
                                            StoredPayload {
                                                payload,
                                                received_at: entry.received_at,
                                            }
                                        })
                                    })
                                    .collect();
                                let _ = reply.send(stored);
                            }
                            Some(TransportCommand::Observe { topic, id, tx, done }) => {
                                // Queued frames predate this subscription
                                // (a `Query` answered before now already
                                // covers them); flush them to the existing
                                // subscribers only.
                                while let Ok(frame) = tap_rx.try_recv() {
                                    forward_frame(frame, node_id, &secrets, &subs).await;
                                }
                                subs.insert(id, (topic, tx));
                                let _ = done.send(());
                            }
                            Some(TransportCommand::Unobserve { id }) => {
                                subs.remove(&id);
                            }
                            Some(TransportCommand::AddDecryptionKey { secret, done }) => {
                                secrets.push(secret);
                                let _ = done.send(());
                            }
                            Some(TransportCommand::WaitForPeer { done }) => {
                                // The bus is always reachable.
                                let _ = done.send(());
                            }
                            Some(TransportCommand::PeerCount { reply }) => {
                                let count = inner.lock().expect("bus lock").taps.len();
                                let _ = reply.send(count.saturating_sub(1));
                            }
                            Some(TransportCommand::Shutdown) | None => {
                                info!("Memory transport node shutting down");
                                break;
                            }
                        }
                    }

                    frame = tap_rx.recv() => {
                        let Some(frame) = frame else { break };
                        forward_frame(frame, node_id, &secrets, &subs).await;
                    }
                }
            }
        });

        TransportHandle::new(cmd_tx)
    }
}

/// Unwrap one bus frame for this node and fan it out to the matching
/// live subscriptions. Unopenable frames are dropped.
async fn forward_frame(
    frame: BusFrame,
    node_id: u64,
    secrets: &[Identity],
    subs: &HashMap<SubscriptionId, (String, mpsc::Sender<StoredPayload>)>,
) {
    let Some(payload) = unwrap_entry(&frame.entry, node_id, secrets) else {
        return;
    };
    let stored = StoredPayload {
        payload,
        received_at: frame.entry.received_at,
    };
    for (sub_topic, tx) in subs.values() {
        if *sub_topic == frame.topic {
            let _ = tx.send(stored.clone()).await;
        }
    }
}

/// The payload this node is allowed to see for `entry`: its own
/// publishes in plaintext, everything else through frame opening.
fn unwrap_entry(entry: &BusEntry, node_id: u64, secrets: &[Identity]) -> Option<Vec<u8>> {
    if entry.publisher == node_id {
        Some(entry.plaintext.clone())
    } else {
        open_frame(&entry.framed, secrets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causerie_shared::Pubkey;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[tokio::test]
    async fn publish_reaches_other_nodes_and_echoes_locally() {
        let bus = MemoryBus::new();
        let alice = bus.attach();
        let bob = bus.attach();

        let mut alice_sub = alice.observe("t").await.unwrap();
        let mut bob_sub = bob.observe("t").await.unwrap();

        alice.publish("t", b"hi".to_vec(), now(), None).await.unwrap();

        assert_eq!(bob_sub.recv().await.unwrap().payload, b"hi");
        assert_eq!(alice_sub.recv().await.unwrap().payload, b"hi");
    }

    #[tokio::test]
    async fn query_returns_full_topic_history() {
        let bus = MemoryBus::new();
        let writer = bus.attach();

        writer.publish("t", b"one".to_vec(), now(), None).await.unwrap();
        writer.publish("t", b"two".to_vec(), now(), None).await.unwrap();
        writer.publish("other", b"x".to_vec(), now(), None).await.unwrap();

        let late = bus.attach();
        let stored = late.query("t").await.unwrap();
        let payloads: Vec<_> = stored.iter().map(|s| s.payload.clone()).collect();
        assert_eq!(payloads, vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[tokio::test]
    async fn sealed_payloads_only_reach_the_key_holder() {
        let bus = MemoryBus::new();
        let sender = bus.attach();
        let holder = bus.attach();
        let bystander = bus.attach();

        let recipient = Identity::generate();
        holder.add_decryption_key(recipient.clone()).await.unwrap();

        let mut holder_sub = holder.observe("t").await.unwrap();
        let mut bystander_sub = bystander.observe("t").await.unwrap();

        sender
            .publish("t", b"psst".to_vec(), now(), Some(recipient.public()))
            .await
            .unwrap();
        sender.publish("t", b"public".to_vec(), now(), None).await.unwrap();

        assert_eq!(holder_sub.recv().await.unwrap().payload, b"psst");
        // The bystander only ever sees the plain payload.
        assert_eq!(bystander_sub.recv().await.unwrap().payload, b"public");

        // History behaves the same per node.
        assert_eq!(holder.query("t").await.unwrap().len(), 2);
        assert_eq!(bystander.query("t").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn key_registration_is_effective_once_the_call_returns() {
        let bus = MemoryBus::new();
        let sender = bus.attach();

        // A sealed frame published right after add_decryption_key and
        // observe return must never be dropped as undecryptable.
        for round in 0..20u8 {
            let holder = bus.attach();
            let recipient = Identity::generate();
            holder.add_decryption_key(recipient.clone()).await.unwrap();
            let mut sub = holder.observe("k").await.unwrap();

            sender
                .publish("k", vec![round], now(), Some(recipient.public()))
                .await
                .unwrap();

            assert_eq!(sub.recv().await.unwrap().payload, vec![round]);
            sub.close().await;
        }
    }

    #[tokio::test]
    async fn sealed_sends_still_echo_to_the_sender() {
        let bus = MemoryBus::new();
        let sender = bus.attach();
        let stranger = Pubkey([9u8; 32]);

        let mut sender_sub = sender.observe("t").await.unwrap();
        sender
            .publish("t", b"void".to_vec(), now(), Some(stranger))
            .await
            .unwrap();

        // The sender sees its own payload in plaintext, live and in
        // history, even though nobody else can open it.
        assert_eq!(sender_sub.recv().await.unwrap().payload, b"void");
        assert_eq!(sender.query("t").await.unwrap().len(), 1);

        let other = bus.attach();
        assert!(other.query("t").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent_and_stops_delivery() {
        let bus = MemoryBus::new();
        let node = bus.attach();

        let mut sub = node.observe("t").await.unwrap();
        sub.close().await;
        sub.close().await;

        node.publish("t", b"after".to_vec(), now(), None).await.unwrap();
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn wait_for_peer_resolves_immediately() {
        let bus = MemoryBus::new();
        let node = bus.attach();
        node.wait_for_peer().await.unwrap();
        assert_eq!(node.peer_count().await.unwrap(), 0);
    }
}
