//! Typed command protocol between the chat core and a transport backend.
//!
//! A backend task owns the actual pub/sub machinery and is driven
//! entirely through [`TransportCommand`]s sent over a tokio mpsc channel.
//! [`TransportHandle`] is the cheap, cloneable front the application
//! talks to.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use causerie_shared::{Identity, Pubkey};

/// Errors surfaced by the transport boundary.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The backend task is gone; the handle can no longer be used.
    #[error("Transport channel closed")]
    Closed,

    /// The transport failed to initialize; a fresh attempt may succeed.
    #[error("Transport not ready: {0}")]
    NotReady(String),

    /// The backend reported a publish failure for this payload.
    #[error("Publish failed: {0}")]
    Publish(String),
}

/// Identifies one live subscription, so that unsubscribing twice is a
/// harmless no-op rather than a double-free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One payload as delivered by the transport, either from the history
/// query or from a live subscription. `received_at` is the
/// transport-assigned receipt timestamp, distinct from whatever
/// timestamp the sender asserted inside the payload.
#[derive(Debug, Clone)]
pub struct StoredPayload {
    pub payload: Vec<u8>,
    pub received_at: DateTime<Utc>,
}

/// Commands sent *into* the transport task.
#[derive(Debug)]
pub enum TransportCommand {
    /// Publish a payload on a topic, optionally sealed to one recipient.
    Publish {
        topic: String,
        payload: Vec<u8>,
        timestamp: DateTime<Utc>,
        seal_to: Option<Pubkey>,
        done: oneshot::Sender<Result<(), TransportError>>,
    },
    /// Retrieve every stored payload for a topic.
    Query {
        topic: String,
        reply: oneshot::Sender<Vec<StoredPayload>>,
    },
    /// Start delivering live payloads for a topic to `tx`. `done` fires
    /// once the subscription is registered, so payloads arriving after
    /// the ack cannot slip past it.
    Observe {
        topic: String,
        id: SubscriptionId,
        tx: mpsc::Sender<StoredPayload>,
        done: oneshot::Sender<()>,
    },
    /// Stop a live subscription. Unknown ids are ignored.
    Unobserve { id: SubscriptionId },
    /// Register a secret so sealed payloads addressed to its public key
    /// can be opened. `done` fires once the secret is in place; frames
    /// handled before that may still be dropped as undecryptable.
    AddDecryptionKey {
        secret: Identity,
        done: oneshot::Sender<()>,
    },
    /// Resolve once at least one remote peer is reachable.
    WaitForPeer { done: oneshot::Sender<()> },
    /// Report the number of connected peers.
    PeerCount { reply: oneshot::Sender<usize> },
    /// Gracefully shut down the backend task.
    Shutdown,
}

/// Application-side handle to a running transport backend.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    tx: mpsc::Sender<TransportCommand>,
}

impl TransportHandle {
    pub fn new(tx: mpsc::Sender<TransportCommand>) -> Self {
        Self { tx }
    }

    async fn send(&self, cmd: TransportCommand) -> Result<(), TransportError> {
        self.tx.send(cmd).await.map_err(|_| TransportError::Closed)
    }

    /// Publish one payload. Resolves once the backend has accepted (or
    /// rejected) this specific send, so per-recipient fan-out failures
    /// stay attributable.
    pub async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        timestamp: DateTime<Utc>,
        seal_to: Option<Pubkey>,
    ) -> Result<(), TransportError> {
        let (done, ack) = oneshot::channel();
        self.send(TransportCommand::Publish {
            topic: topic.to_string(),
            payload,
            timestamp,
            seal_to,
            done,
        })
        .await?;
        ack.await.map_err(|_| TransportError::Closed)?
    }

    /// Fetch all historically stored payloads for `topic`.
    pub async fn query(&self, topic: &str) -> Result<Vec<StoredPayload>, TransportError> {
        let (reply, rx) = oneshot::channel();
        self.send(TransportCommand::Query {
            topic: topic.to_string(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| TransportError::Closed)
    }

    /// Subscribe to live deliveries on `topic`. Resolves only after the
    /// backend has registered the subscription, so a payload published
    /// once this returns is guaranteed to be delivered.
    pub async fn observe(&self, topic: &str) -> Result<Subscription, TransportError> {
        let id = SubscriptionId::new();
        let (tx, rx) = mpsc::channel(256);
        let (done, ack) = oneshot::channel();
        self.send(TransportCommand::Observe {
            topic: topic.to_string(),
            id,
            tx,
            done,
        })
        .await?;
        ack.await.map_err(|_| TransportError::Closed)?;
        Ok(Subscription {
            id,
            topic: topic.to_string(),
            rx,
            handle: self.clone(),
            closed: false,
        })
    }

    pub async fn unobserve(&self, id: SubscriptionId) -> Result<(), TransportError> {
        self.send(TransportCommand::Unobserve { id }).await
    }

    /// Register a decryption secret. Resolves only after the backend
    /// holds the secret, so any sealed frame arriving once this returns
    /// can be opened.
    pub async fn add_decryption_key(&self, secret: Identity) -> Result<(), TransportError> {
        let (done, ack) = oneshot::channel();
        self.send(TransportCommand::AddDecryptionKey { secret, done })
            .await?;
        ack.await.map_err(|_| TransportError::Closed)
    }

    /// Wait until the backend can reach at least one remote peer. The
    /// bulk history load gates on this; sends do not.
    pub async fn wait_for_peer(&self) -> Result<(), TransportError> {
        let (done, rx) = oneshot::channel();
        self.send(TransportCommand::WaitForPeer { done }).await?;
        rx.await.map_err(|_| TransportError::Closed)
    }

    pub async fn peer_count(&self) -> Result<usize, TransportError> {
        let (reply, rx) = oneshot::channel();
        self.send(TransportCommand::PeerCount { reply }).await?;
        rx.await.map_err(|_| TransportError::Closed)
    }

    pub async fn shutdown(&self) {
        let _ = self.send(TransportCommand::Shutdown).await;
    }
}

/// A live subscription. Dropping it (or calling [`Subscription::close`],
/// any number of times) detaches it from the backend.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    topic: String,
    rx: mpsc::Receiver<StoredPayload>,
    handle: TransportHandle,
    closed: bool,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next live payload, or `None` once the subscription is closed.
    pub async fn recv(&mut self) -> Option<StoredPayload> {
        self.rx.recv().await
    }

    /// Detach from the backend. Idempotent.
    pub async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            let _ = self.handle.unobserve(self.id).await;
            self.rx.close();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.closed {
            // Best effort: the backend also drops the sender side when
            // it notices the receiver is gone.
            let _ = self
                .handle
                .tx
                .try_send(TransportCommand::Unobserve { id: self.id });
        }
    }
}
