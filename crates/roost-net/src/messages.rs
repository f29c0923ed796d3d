//! Session message types and serialization.
//!
//! All messages are serialized with [`postcard`] and prefixed with a protocol
//! version byte. Use [`serialize_message`] and [`deserialize_message`] for
//! encoding/decoding. Positions travel quantized to centimeters
//! ([`QuantizedVec3`]); everything else is exact.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Current wire-protocol version. Prepended to every serialized message.
pub const PROTOCOL_VERSION: u8 = 1;

// ---------------------------------------------------------------------------
// Quantized positions
// ---------------------------------------------------------------------------

/// A world-space vector quantized to 1/100 of a world unit (centimeters),
/// stored as three `i32` components. Snapshot and event positions use this
/// to keep the unreliable channel payloads small; the loss is at most half a
/// centimeter per axis.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantizedVec3 {
    /// X component in centimeters.
    pub x: i32,
    /// Y component in centimeters.
    pub y: i32,
    /// Z component in centimeters.
    pub z: i32,
}

impl From<Vec3> for QuantizedVec3 {
    fn from(v: Vec3) -> Self {
        Self {
            x: (v.x * 100.0).round() as i32,
            y: (v.y * 100.0).round() as i32,
            z: (v.z * 100.0).round() as i32,
        }
    }
}

impl From<QuantizedVec3> for Vec3 {
    fn from(q: QuantizedVec3) -> Self {
        Vec3::new(
            q.x as f32 / 100.0,
            q.y as f32 / 100.0,
            q.z as f32 / 100.0,
        )
    }
}

// ---------------------------------------------------------------------------
// Event and batch kinds
// ---------------------------------------------------------------------------

/// Discrete AI event kinds replayed through the time-ordered queue.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventKind {
    /// An attack animation/windup begins.
    AttackStart = 1,
    /// A skill or ability is cast.
    SkillCast = 2,
    /// The source entity died.
    Death = 3,
    /// The source entity dropped an item.
    ItemDrop = 4,
    /// A positional sound cue.
    Sound = 5,
    /// A visual effect spawn.
    Effect = 6,
}

/// Kinds of batched boolean object-state updates.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum UpdateKind {
    /// Door open/closed state.
    Door = 1,
    /// Destructible intact/destroyed state.
    Destructible = 2,
    /// Lootbox opened/closed state.
    Lootbox = 3,
}

// ---------------------------------------------------------------------------
// Top-level enum
// ---------------------------------------------------------------------------

/// Top-level session message. The enum discriminant is the type tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Message {
    /// Host broadcasts a sequenced pose sample for one entity.
    PlayerSnapshot(PlayerSnapshot),
    /// Host broadcasts a discrete event scheduled for a host-clock time.
    AiEvent(AiEvent),
    /// Client asks the host for exclusive access to a lootable resource.
    LootLockRequest(LootLockRequest),
    /// Host announces the outcome of a lock request to all participants.
    LootLockState(LootLockState),
    /// Host announces that a resource lock was released or reclaimed.
    LootUnlock(LootUnlock),
    /// Host sends a batch of boolean object-state changes.
    BatchUpdate(BatchUpdate),
    /// Client reports its last known state to request recovery after a
    /// reconnect.
    ReconnectState(ReconnectState),
}

// ---------------------------------------------------------------------------
// Payload structs
// ---------------------------------------------------------------------------

/// A timestamped, sequenced pose sample for one entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerSnapshot {
    /// Entity this sample belongs to.
    pub entity_id: u64,
    /// Strictly increasing per-entity sequence number.
    pub sequence: u32,
    /// Host clock at capture time, seconds since session start.
    pub host_time: f64,
    /// Position, quantized to centimeters.
    pub position: QuantizedVec3,
    /// Rotation as a unit quaternion.
    pub rotation: Quat,
    /// Linear velocity, quantized to centimeters per second.
    pub velocity: QuantizedVec3,
}

/// A discrete occurrence (attack, death, drop, ...) stamped with the host
/// time it should play at.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiEvent {
    /// Source entity.
    pub entity_id: u64,
    /// What happened.
    pub kind: EventKind,
    /// Where it happened.
    pub position: QuantizedVec3,
    /// Host-clock time the event should play at (occurrence time + delay).
    pub play_at: f64,
    /// Artificial delay that was added when stamping, for diagnostics.
    pub delay: f32,
    /// Small event-specific payload, opaque to the core.
    pub payload: Vec<u8>,
}

/// Client-to-host request for exclusive access to a resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LootLockRequest {
    /// The contested resource.
    pub resource_id: u64,
    /// The requesting participant.
    pub requester: u64,
}

/// Host-to-all announcement of a lock decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LootLockState {
    /// The contested resource.
    pub resource_id: u64,
    /// Whether the request was granted.
    pub granted: bool,
    /// The current holder (the grantee on success, the blocking holder on
    /// denial).
    pub holder: Option<u64>,
    /// Human-readable denial reason; `None` on success.
    pub denial: Option<String>,
}

/// Host-to-all announcement that a resource is unlocked again.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LootUnlock {
    /// The released resource.
    pub resource_id: u64,
}

/// One `(object, state)` pair inside a [`BatchUpdate`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchEntry {
    /// The affected object.
    pub object_id: u64,
    /// The new boolean state.
    pub state: bool,
}

/// A batch of boolean object-state changes of one kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchUpdate {
    /// What kind of objects changed.
    pub kind: UpdateKind,
    /// The changed objects, in the order the changes occurred.
    pub entries: Vec<BatchEntry>,
}

/// Client-to-host state report used to recover after a reconnect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReconnectState {
    /// The reconnecting participant.
    pub peer: u64,
    /// Last known position.
    pub position: QuantizedVec3,
    /// Last known rotation.
    pub rotation: Quat,
    /// Last known health.
    pub health: f32,
    /// Last known maximum health.
    pub max_health: f32,
    /// Scene the participant was in.
    pub scene: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during message deserialization.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// The payload was empty (no version byte).
    #[error("empty payload, no version byte")]
    EmptyPayload,

    /// The version byte does not match [`PROTOCOL_VERSION`].
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Postcard deserialization failed.
    #[error("deserialization error: {0}")]
    Postcard(#[from] postcard::Error),
}

// ---------------------------------------------------------------------------
// Serialization helpers
// ---------------------------------------------------------------------------

/// Serialize a [`Message`] into a versioned binary payload.
///
/// Wire format: `[version: u8] [postcard-encoded Message]`
pub fn serialize_message(msg: &Message) -> Result<Vec<u8>, postcard::Error> {
    let body = postcard::to_allocvec(msg)?;
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(PROTOCOL_VERSION);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Deserialize a versioned binary payload into a [`Message`].
///
/// Returns an error if the version is unsupported or the payload is malformed.
pub fn deserialize_message(data: &[u8]) -> Result<Message, MessageError> {
    if data.is_empty() {
        return Err(MessageError::EmptyPayload);
    }

    let version = data[0];
    if version != PROTOCOL_VERSION {
        return Err(MessageError::UnsupportedVersion(version));
    }

    let msg = postcard::from_bytes(&data[1..])?;
    Ok(msg)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
