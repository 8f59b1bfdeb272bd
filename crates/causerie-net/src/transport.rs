//! Swarm construction for the gossip backend.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use libp2p::gossipsub::{self, MessageAuthenticity, MessageId, ValidationMode};
use libp2p::identity::Keypair;
use libp2p::kad::{self, store::MemoryStore};
use libp2p::{identify, PeerId, SwarmBuilder};
use tracing::info;

use causerie_shared::constants::{GOSSIPSUB_HEARTBEAT_SECS, MAX_MESSAGE_SIZE, PROTOCOL_VERSION};

use crate::behaviour::CauserieBehaviour;

type BehaviourError = Box<dyn std::error::Error + Send + Sync>;

/// Deduplicate by content and source rather than by sequence number, so
/// the same payload relayed along two paths is delivered once.
fn message_id(message: &gossipsub::Message) -> MessageId {
    let mut hasher = DefaultHasher::new();
    message.data.hash(&mut hasher);
    if let Some(ref source) = message.source {
        source.hash(&mut hasher);
    }
    MessageId::from(hasher.finish().to_string())
}

fn gossipsub_behaviour(key: &Keypair) -> Result<gossipsub::Behaviour, BehaviourError> {
    let config = gossipsub::ConfigBuilder::default()
        .heartbeat_interval(Duration::from_secs(GOSSIPSUB_HEARTBEAT_SECS))
        .validation_mode(ValidationMode::Strict)
        .max_transmit_size(MAX_MESSAGE_SIZE)
        .message_id_fn(message_id)
        .build()
        .map_err(|e| -> BehaviourError { format!("GossipSub config: {e}").into() })?;

    gossipsub::Behaviour::new(MessageAuthenticity::Signed(key.clone()), config)
        .map_err(|e| -> BehaviourError { format!("GossipSub init: {e}").into() })
}

fn kademlia_behaviour(local_peer_id: PeerId) -> kad::Behaviour<MemoryStore> {
    let mut kademlia = kad::Behaviour::new(local_peer_id, MemoryStore::new(local_peer_id));
    // Every node serves the DHT; there are no dedicated infrastructure
    // peers in this network.
    kademlia.set_mode(Some(kad::Mode::Server));
    kademlia
}

fn identify_behaviour(key: &Keypair) -> identify::Behaviour {
    let config = identify::Config::new(PROTOCOL_VERSION.to_string(), key.public())
        .with_push_listen_addr_updates(true)
        .with_interval(Duration::from_secs(60));
    identify::Behaviour::new(config)
}

/// Assemble a QUIC swarm with the composed [`CauserieBehaviour`].
pub fn build_swarm(keypair: Keypair) -> anyhow::Result<libp2p::Swarm<CauserieBehaviour>> {
    let swarm = SwarmBuilder::with_existing_identity(keypair)
        .with_tokio()
        .with_quic()
        .with_behaviour(|key| -> Result<CauserieBehaviour, BehaviourError> {
            let local_peer_id = key.public().to_peer_id();
            Ok(CauserieBehaviour {
                gossipsub: gossipsub_behaviour(key)?,
                kademlia: kademlia_behaviour(local_peer_id),
                identify: identify_behaviour(key),
            })
        })?
        .with_swarm_config(|cfg| cfg.with_idle_connection_timeout(Duration::from_secs(60)))
        .build();

    info!(peer_id = %swarm.local_peer_id(), "Built causerie swarm over QUIC");

    Ok(swarm)
}
