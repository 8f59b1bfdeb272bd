//! # causerie-net
//!
//! Transport boundary for the chat core: pub/sub, history query, and
//! live subscriptions, spoken over a typed command channel. Two backends
//! implement the same protocol: a libp2p GossipSub swarm and an
//! in-process memory bus.

pub mod behaviour;
pub mod frames;
pub mod handle;
pub mod lazy;
pub mod memory;
pub mod swarm;
pub mod transport;

pub use behaviour::{CauserieBehaviour, CauserieEvent};
pub use handle::{
    StoredPayload, Subscription, SubscriptionId, TransportCommand, TransportError,
    TransportHandle,
};
pub use lazy::LazyTransport;
pub use memory::MemoryBus;
pub use swarm::{spawn_gossip_transport, GossipConfig};
pub use transport::build_swarm;
