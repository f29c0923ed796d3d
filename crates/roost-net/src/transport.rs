//! The transport seam between the session core and the outside world.
//!
//! The real socket layer lives below this crate; the session only needs the
//! narrow [`Transport`] contract: send to one peer or to everyone with a
//! chosen [`Delivery`] class, drain whatever arrived since the last tick,
//! and answer connectivity queries. [`LoopbackHub`] provides an in-process
//! implementation over crossbeam channels for tests and demos.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::delivery::Delivery;
use crate::messages::{Message, deserialize_message, serialize_message};

// ---------------------------------------------------------------------------
// PeerId
// ---------------------------------------------------------------------------

/// Identifies one participant of the session. The host allocates these on
/// connect; `PeerId(0)` conventionally names the host itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u64);

impl PeerId {
    /// The conventional host address.
    pub const HOST: PeerId = PeerId(0);
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by a transport implementation.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The target peer is not registered or no longer connected.
    #[error("unknown or disconnected peer: {0}")]
    UnknownPeer(PeerId),

    /// Message encoding failed before anything was sent.
    #[error("encode error: {0}")]
    Encode(#[from] postcard::Error),
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Non-blocking message transport drained once per tick.
///
/// Implementations must never block the tick thread; `drain` returns only
/// what has already arrived. The delivery class is a per-send request, not a
/// property of a connection.
pub trait Transport {
    /// The peer this endpoint speaks as.
    fn local_peer(&self) -> PeerId;

    /// Send to every other connected peer. Returns how many peers the
    /// message was handed to.
    fn send_to_all(&self, msg: &Message, delivery: Delivery) -> Result<usize, TransportError>;

    /// Send to a single peer.
    fn send_to(&self, peer: PeerId, msg: &Message, delivery: Delivery)
    -> Result<(), TransportError>;

    /// Drain all messages that arrived since the previous call.
    fn drain(&mut self) -> Vec<(PeerId, Message)>;

    /// Whether the given peer is currently connected.
    fn is_connected(&self, peer: PeerId) -> bool;

    /// All currently connected peers, excluding the local one.
    fn peers(&self) -> Vec<PeerId>;
}

// ---------------------------------------------------------------------------
// Loopback implementation
// ---------------------------------------------------------------------------

/// One serialized message in flight between loopback endpoints.
struct Envelope {
    from: PeerId,
    bytes: Vec<u8>,
}

type Registry = Arc<Mutex<HashMap<PeerId, Sender<Envelope>>>>;

/// In-process message hub connecting any number of [`LoopbackTransport`]
/// endpoints. Delivery is immediate and reliable regardless of the requested
/// class; tests that need loss or reordering wrap an endpoint and perturb
/// the unreliable class themselves.
#[derive(Clone, Default)]
pub struct LoopbackHub {
    registry: Registry,
}

impl LoopbackHub {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new endpoint for `peer`. Re-registering an id replaces
    /// the previous endpoint (the old receiver starts reporting
    /// disconnected sends).
    pub fn register(&self, peer: PeerId) -> LoopbackTransport {
        let (tx, rx) = unbounded();
        self.registry
            .lock()
            .expect("loopback registry lock poisoned")
            .insert(peer, tx);
        LoopbackTransport {
            me: peer,
            incoming: rx,
            registry: Arc::clone(&self.registry),
        }
    }

    /// Removes a peer from the hub. In-flight messages to it are dropped;
    /// subsequent connectivity checks report it as gone.
    pub fn disconnect(&self, peer: PeerId) {
        self.registry
            .lock()
            .expect("loopback registry lock poisoned")
            .remove(&peer);
    }
}

/// A single endpoint attached to a [`LoopbackHub`].
pub struct LoopbackTransport {
    me: PeerId,
    incoming: Receiver<Envelope>,
    registry: Registry,
}

impl Transport for LoopbackTransport {
    fn local_peer(&self) -> PeerId {
        self.me
    }

    fn send_to_all(&self, msg: &Message, _delivery: Delivery) -> Result<usize, TransportError> {
        let bytes = serialize_message(msg)?;
        let registry = self
            .registry
            .lock()
            .expect("loopback registry lock poisoned");
        let mut sent = 0;
        for (peer, tx) in registry.iter() {
            if *peer == self.me {
                continue;
            }
            if tx
                .send(Envelope {
                    from: self.me,
                    bytes: bytes.clone(),
                })
                .is_ok()
            {
                sent += 1;
            }
        }
        Ok(sent)
    }

    fn send_to(
        &self,
        peer: PeerId,
        msg: &Message,
        _delivery: Delivery,
    ) -> Result<(), TransportError> {
        let bytes = serialize_message(msg)?;
        let registry = self
            .registry
            .lock()
            .expect("loopback registry lock poisoned");
        let tx = registry
            .get(&peer)
            .ok_or(TransportError::UnknownPeer(peer))?;
        tx.send(Envelope {
            from: self.me,
            bytes,
        })
        .map_err(|_| TransportError::UnknownPeer(peer))
    }

    fn drain(&mut self) -> Vec<(PeerId, Message)> {
        let mut out = Vec::new();
        while let Ok(envelope) = self.incoming.try_recv() {
            match deserialize_message(&envelope.bytes) {
                Ok(msg) => out.push((envelope.from, msg)),
                Err(err) => {
                    tracing::warn!(from = %envelope.from, %err, "dropping undecodable message");
                }
            }
        }
        out
    }

    fn is_connected(&self, peer: PeerId) -> bool {
        self.registry
            .lock()
            .expect("loopback registry lock poisoned")
            .contains_key(&peer)
    }

    fn peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self
            .registry
            .lock()
            .expect("loopback registry lock poisoned")
            .keys()
            .copied()
            .filter(|p| *p != self.me)
            .collect();
        peers.sort();
        peers
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
