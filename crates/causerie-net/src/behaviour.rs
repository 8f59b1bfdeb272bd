//! Composed libp2p `NetworkBehaviour` for causerie nodes.
//!
//! Combines GossipSub (pub/sub messaging), Kademlia (DHT peer
//! discovery), and Identify (protocol negotiation).

use libp2p::{
    gossipsub, identify,
    kad::{self, store::MemoryStore},
    swarm::NetworkBehaviour,
};

/// Composed network behaviour, driven by the single swarm event loop.
/// Construction is handled by [`super::transport::build_swarm`] via
/// `SwarmBuilder`.
#[derive(NetworkBehaviour)]
#[behaviour(to_swarm = "CauserieEvent")]
pub struct CauserieBehaviour {
    /// Pub/sub messaging for the chat and invite topics
    pub gossipsub: gossipsub::Behaviour,
    /// Distributed hash table for peer discovery
    pub kademlia: kad::Behaviour<MemoryStore>,
    /// Protocol identification and address exchange
    pub identify: identify::Behaviour,
}

/// Events emitted by the composed behaviour, one variant per sub-behaviour.
#[derive(Debug)]
pub enum CauserieEvent {
    Gossipsub(gossipsub::Event),
    Kademlia(kad::Event),
    Identify(identify::Event),
}

impl From<gossipsub::Event> for CauserieEvent {
    fn from(event: gossipsub::Event) -> Self {
        CauserieEvent::Gossipsub(event)
    }
}

impl From<kad::Event> for CauserieEvent {
    fn from(event: kad::Event) -> Self {
        CauserieEvent::Kademlia(event)
    }
}

impl From<identify::Event> for CauserieEvent {
    fn from(event: identify::Event) -> Self {
        CauserieEvent::Identify(event)
    }
}
