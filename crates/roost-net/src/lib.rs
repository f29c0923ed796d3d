//! Wire protocol for the roost session core: message catalogue, reliability
//! classes, versioned serialization, and the transport seam the session
//! components talk through.

pub mod delivery;
pub mod messages;
pub mod transport;

pub use delivery::Delivery;
pub use messages::{
    AiEvent, BatchEntry, BatchUpdate, EventKind, LootLockRequest, LootLockState, LootUnlock,
    Message, MessageError, PROTOCOL_VERSION, PlayerSnapshot, QuantizedVec3, ReconnectState,
    UpdateKind, deserialize_message, serialize_message,
};
pub use transport::{LoopbackHub, LoopbackTransport, PeerId, Transport, TransportError};
