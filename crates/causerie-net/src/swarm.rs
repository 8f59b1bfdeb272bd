//! GossipSub transport backend.
//!
//! The swarm event loop runs in a dedicated tokio task and speaks the
//! [`TransportCommand`] protocol. Inbound frames are unframed (sealed
//! ones opened with the registered secrets, or dropped), appended to a
//! session-scoped per-topic log that answers `Query`, and fanned out to
//! live observers. Local publishes are echoed back through the same
//! inbound path, so a sender observes its own messages exactly like a
//! remote peer would.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use libp2p::{gossipsub, identify, kad, multiaddr::Protocol, swarm::SwarmEvent, Multiaddr, PeerId};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use causerie_shared::constants::DEFAULT_QUIC_PORT;
use causerie_shared::Identity;

use crate::behaviour::CauserieEvent;
use crate::frames::{encode_frame, open_frame};
use crate::handle::{
    StoredPayload, SubscriptionId, TransportCommand, TransportError, TransportHandle,
};
use crate::transport::build_swarm;

/// Configuration for spawning the gossip transport.
pub struct GossipConfig {
    /// Port to listen on (defaults to `DEFAULT_QUIC_PORT`).
    pub listen_port: u16,
    /// Multiaddrs to dial on startup.
    pub dials: Vec<Multiaddr>,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            listen_port: DEFAULT_QUIC_PORT,
            dials: Vec::new(),
        }
    }
}

struct GossipState {
    /// Decoded payload log per topic; answers `Query` for this session.
    logs: HashMap<String, Vec<StoredPayload>>,
    /// Live observers, keyed so unsubscribe is idempotent.
    subs: HashMap<SubscriptionId, (String, mpsc::Sender<StoredPayload>)>,
    /// Secrets that can open sealed frames.
    secrets: Vec<Identity>,
    /// GossipSub topics we have joined.
    joined: HashSet<String>,
    peer_count: usize,
    peer_waiters: Vec<oneshot::Sender<()>>,
}

impl GossipState {
    fn new() -> Self {
        Self {
            logs: HashMap::new(),
            subs: HashMap::new(),
            secrets: Vec::new(),
            joined: HashSet::new(),
            peer_count: 0,
            peer_waiters: Vec::new(),
        }
    }

    /// Run one inbound framed payload through unframing, the log, and
    /// the observers. Undecryptable or malformed frames are dropped
    /// here.
    async fn deliver_framed(&mut self, topic: &str, framed: &[u8], received_at: DateTime<Utc>) {
        let Some(payload) = open_frame(framed, &self.secrets) else {
            return;
        };
        self.deliver(topic, payload, received_at).await;
    }

    /// Append one plaintext payload to the log and fan it out to the
    /// topic's observers. Local publishes come straight here, so a
    /// sender always observes its own payloads (self-emit), sealed or
    /// not.
    async fn deliver(&mut self, topic: &str, payload: Vec<u8>, received_at: DateTime<Utc>) {
        let stored = StoredPayload {
            payload,
            received_at,
        };

        self.logs
            .entry(topic.to_string())
            .or_default()
            .push(stored.clone());

        for (sub_topic, tx) in self.subs.values() {
            if sub_topic == topic {
                let _ = tx.send(stored.clone()).await;
            }
        }
    }

    fn on_peer_connected(&mut self) {
        self.peer_count += 1;
        for waiter in self.peer_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }
}

/// Spawn the libp2p gossip transport in a background tokio task.
///
/// The transport keypair is derived deterministically from the chat
/// identity, so a node keeps its `PeerId` across restarts.
///
/// Returns the command handle and the local `PeerId`.
pub async fn spawn_gossip_transport(
    identity: &Identity,
    config: GossipConfig,
) -> anyhow::Result<(TransportHandle, PeerId)> {
    let keypair = libp2p::identity::Keypair::ed25519_from_bytes(identity.transport_seed())?;
    let mut swarm = build_swarm(keypair)?;
    let local_peer_id = *swarm.local_peer_id();

    let listen_addr: Multiaddr = format!("/ip4/0.0.0.0/udp/{}/quic-v1", config.listen_port)
        .parse()
        .expect("valid multiaddr");
    swarm.listen_on(listen_addr)?;

    info!(peer_id = %local_peer_id, port = config.listen_port, "Gossip transport listening");

    for addr in &config.dials {
        if let Err(e) = swarm.dial(addr.clone()) {
            warn!(addr = %addr, error = %e, "Failed to dial peer");
        } else {
            if let Some(peer_id) = extract_peer_id(addr) {
                swarm
                    .behaviour_mut()
                    .kademlia
                    .add_address(&peer_id, addr.clone());
            }
            debug!(addr = %addr, "Dialing peer");
        }
    }

    if !config.dials.is_empty() {
        if let Err(e) = swarm.behaviour_mut().kademlia.bootstrap() {
            warn!(error = %e, "Kademlia bootstrap failed to start");
        }
    }

    let (cmd_tx, mut cmd_rx) = mpsc::channel::<TransportCommand>(256);

    tokio::spawn(async move {
        let mut state = GossipState::new();

        loop {
            tokio::select! {
                // --- Incoming commands ---
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

                            let gossipsub_topic = gossipsub::IdentTopic::new(&topic);
                            let result = match swarm
                                .behaviour_mut()
                                .gossipsub
                                .publish(gossipsub_topic, framed)
                            {
                                Ok(_) => Ok(()),
                                Err(gossipsub::PublishError::InsufficientPeers) => {
                                    // Nobody to gossip to yet; the local
                                    // echo below still happens, matching
                                    // a relay with self-emit enabled.
                                    debug!(topic = %topic, "Publish with no remote peers");
                                    Ok(())
                                }
                                Err(e) => {
                                    error!(topic = %topic, error = %e, "Publish failed");
                                    Err(TransportError::Publish(e.to_string()))
                                }
                            };

                            // Self-emit: the publisher observes its own
                            // payload in plaintext, sealed or not.
                            state.deliver(&topic, payload, timestamp).await;

                            let _ = done.send(result);
                        }
                        Some(TransportCommand::Query { topic, reply }) => {
                            let stored = state.logs.get(&topic).cloned().unwrap_or_default();
                            let _ = reply.send(stored);
                        }
                        Some(TransportCommand::Observe { topic, id, tx, done }) => {
                            if state.joined.insert(topic.clone()) {
                                let gossipsub_topic = gossipsub::IdentTopic::new(&topic);
                                if let Err(e) = swarm
                                    .behaviour_mut()
                                    .gossipsub
                                    .subscribe(&gossipsub_topic)
                                {
                                    error!(topic = %topic, error = %e, "Subscribe failed");
                                }
                            }
                            state.subs.insert(id, (topic, tx));
                            let _ = done.send(());
                        }
                        Some(TransportCommand::Unobserve { id }) => {
                            // Unknown ids fall through silently, so
                            // double-unsubscribe is a no-op.
                            state.subs.remove(&id);
                        }
                        Some(TransportCommand::AddDecryptionKey { secret, done }) => {
                            state.secrets.push(secret);
                            let _ = done.send(());
                        }
                        Some(TransportCommand::WaitForPeer { done }) => {
                            if state.peer_count > 0 {
                                let _ = done.send(());
                            } else {
                                state.peer_waiters.push(done);
                            }
                        }
                        Some(TransportCommand::PeerCount { reply }) => {
                            let _ = reply.send(state.peer_count);
                        }
                        Some(TransportCommand::Shutdown) => {
                            info!("Gossip transport shutdown requested");
                            break;
                        }
                        None => {
                            info!("Command channel closed, shutting down gossip transport");
                            break;
                        }
                    }
                }

                // --- Swarm events ---
                event = swarm.select_next_some() => {
                    match event {
                        SwarmEvent::Behaviour(CauserieEvent::Gossipsub(
                            gossipsub::Event::Message { message, .. },
                        )) => {
                            let topic = message.topic.to_string();
                            debug!(
                                topic = %topic,
                                source = ?message.source,
                                len = message.data.len(),
                                "GossipSub message received"
                            );
                            state.deliver_framed(&topic, &message.data, Utc::now()).await;
                        }

                        SwarmEvent::Behaviour(CauserieEvent::Kademlia(
                            kad::Event::OutboundQueryProgressed { result, .. },
                        )) => {
                            debug!(result = ?result, "Kademlia query progressed");
                        }

                        SwarmEvent::Behaviour(CauserieEvent::Identify(
                            identify::Event::Received { peer_id, info, .. },
                        )) => {
                            debug!(
                                peer = %peer_id,
                                protocol = ?info.protocol_version,
                                "Identify: received info from peer"
                            );
                            for addr in &info.listen_addrs {
                                swarm
                                    .behaviour_mut()
                                    .kademlia
                                    .add_address(&peer_id, addr.clone());
                            }
                        }

                        SwarmEvent::ConnectionEstablished { peer_id, endpoint, .. } => {
                            info!(
                                peer = %peer_id,
                                addr = %endpoint.get_remote_address(),
                                "Peer connected"
                            );
                            state.on_peer_connected();
                        }

                        SwarmEvent::ConnectionClosed { peer_id, num_established, .. } => {
                            if num_established == 0 {
                                state.peer_count = state.peer_count.saturating_sub(1);
                                info!(peer = %peer_id, "Peer disconnected");
                            }
                        }

                        SwarmEvent::NewListenAddr { address, .. } => {
                            info!(addr = %address, "Listening on new address");
                        }

                        SwarmEvent::OutgoingConnectionError { peer_id, error, .. } => {
                            warn!(peer = ?peer_id, error = %error, "Outgoing connection error");
                        }

                        SwarmEvent::IncomingConnectionError { error, .. } => {
                            warn!(error = %error, "Incoming connection error");
                        }

                        _ => {}
                    }
                }
            }
        }

        info!("Gossip transport event loop terminated");
    });

    Ok((TransportHandle::new(cmd_tx), local_peer_id))
}

/// Extract a `PeerId` from a multiaddr, if one is present.
fn extract_peer_id(addr: &Multiaddr) -> Option<PeerId> {
    addr.iter().find_map(|p| {
        if let Protocol::P2p(peer_id) = p {
            Some(peer_id)
        } else {
            None
        }
    })
}
