//! Reconnect state recovery.
//!
//! A client periodically snapshots its own player state; after a reconnect
//! it sends the last snapshot to the host, which restores the player entity
//! so the participant resumes where they left off instead of at a spawn
//! point.

use glam::Quat;
use roost_net::{PeerId, ReconnectState};

use crate::registry::{EntityId, EntityRegistry, Pose};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Tuning for reconnect snapshots.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Seconds between local state snapshots.
    pub snapshot_interval: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: 5.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Local snapshots
// ---------------------------------------------------------------------------

/// The client's own recoverable state at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnState {
    /// Player pose.
    pub pose: Pose,
    /// Current health.
    pub health: f32,
    /// Maximum health.
    pub max_health: f32,
    /// Scene the player is in.
    pub scene: String,
    /// Session time the snapshot was taken.
    pub taken_at: f64,
}

/// Periodically captures the local player's recoverable state.
#[derive(Debug)]
pub struct ReconnectTracker {
    config: ReconnectConfig,
    last: Option<OwnState>,
    accumulator: f64,
}

impl ReconnectTracker {
    /// Creates a tracker with the given tuning.
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            last: None,
            accumulator: 0.0,
        }
    }

    /// Accumulates elapsed time; returns `true` when a new snapshot should
    /// be captured via [`Self::capture`].
    pub fn capture_due(&mut self, dt: f64) -> bool {
        self.accumulator += dt;
        if self.accumulator >= self.config.snapshot_interval {
            self.accumulator -= self.config.snapshot_interval;
            true
        } else {
            false
        }
    }

    /// Stores a fresh snapshot of the local player state.
    pub fn capture(&mut self, state: OwnState) {
        self.last = Some(state);
    }

    /// The most recent snapshot, if one was taken.
    pub fn last(&self) -> Option<&OwnState> {
        self.last.as_ref()
    }

    /// Builds the recovery request to send after reconnecting. `None` until
    /// a snapshot exists.
    pub fn recovery_request(&self, peer: PeerId) -> Option<ReconnectState> {
        self.last.as_ref().map(|state| ReconnectState {
            peer: peer.0,
            position: state.pose.position.into(),
            rotation: state.pose.rotation,
            health: state.health,
            max_health: state.max_health,
            scene: state.scene.clone(),
        })
    }
}

impl Default for ReconnectTracker {
    fn default() -> Self {
        Self::new(ReconnectConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Host-side restore
// ---------------------------------------------------------------------------

/// Why a recovery request was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RestoreError {
    /// The reporting peer does not match the message payload.
    #[error("peer mismatch: message claims {claimed}, sender is {sender}")]
    PeerMismatch {
        /// Peer id inside the message.
        claimed: u64,
        /// Peer the transport attributed the message to.
        sender: u64,
    },
    /// The peer has no registered player entity to restore.
    #[error("no player entity registered for peer {0}")]
    NoPlayerEntity(u64),
}

/// Applies a client's recovery request to the authoritative registry,
/// returning the restored entity so the host can force a resync snapshot
/// for it.
pub fn restore_player(
    registry: &mut EntityRegistry,
    sender: PeerId,
    state: &ReconnectState,
) -> Result<EntityId, RestoreError> {
    if state.peer != sender.0 {
        return Err(RestoreError::PeerMismatch {
            claimed: state.peer,
            sender: sender.0,
        });
    }
    let entry = registry
        .player_of_mut(sender)
        .ok_or(RestoreError::NoPlayerEntity(sender.0))?;

    entry.pose = Pose::new(state.position.into(), normalized(state.rotation));
    tracing::info!(peer = %sender, entity = %entry.id, scene = %state.scene, "restored player state after reconnect");
    Ok(entry.id)
}

/// Quaternions coming off the wire are re-normalized before use; a degenerate
/// one falls back to identity.
fn normalized(q: Quat) -> Quat {
    if q.length_squared() > 1e-6 {
        q.normalize()
    } else {
        Quat::IDENTITY
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Authority, EntityEntry, Role};
    use glam::Vec3;

    fn own_state(x: f32) -> OwnState {
        OwnState {
            pose: Pose::new(Vec3::new(x, 0.0, 0.0), Quat::IDENTITY),
            health: 80.0,
            max_health: 100.0,
            scene: "market".to_string(),
            taken_at: 1.0,
        }
    }

    #[test]
    fn test_capture_cadence() {
        let mut tracker = ReconnectTracker::default();
        assert!(!tracker.capture_due(4.0));
        assert!(tracker.capture_due(1.5));
        assert!(!tracker.capture_due(1.0));
    }

    #[test]
    fn test_recovery_request_needs_a_snapshot() {
        let mut tracker = ReconnectTracker::default();
        assert!(tracker.recovery_request(PeerId(2)).is_none());

        tracker.capture(own_state(3.0));
        let request = tracker.recovery_request(PeerId(2)).unwrap();
        assert_eq!(request.peer, 2);
        assert_eq!(request.scene, "market");
        let position: Vec3 = request.position.into();
        assert!((position.x - 3.0).abs() < 0.01);
    }

    #[test]
    fn test_restore_applies_pose_to_player_entity() {
        let mut registry = EntityRegistry::new();
        registry
            .spawn(EntityEntry::new(
                EntityId(1),
                Role::Player,
                Authority::Peer(PeerId(2)),
            ))
            .unwrap();

        let state = ReconnectState {
            peer: 2,
            position: Vec3::new(7.0, 1.0, -3.0).into(),
            rotation: Quat::from_rotation_y(1.0),
            health: 50.0,
            max_health: 100.0,
            scene: "market".to_string(),
        };

        let restored = restore_player(&mut registry, PeerId(2), &state).unwrap();
        assert_eq!(restored, EntityId(1));
        let pose = registry.get(EntityId(1)).unwrap().pose;
        assert!((pose.position - Vec3::new(7.0, 1.0, -3.0)).length() < 0.01);
    }

    #[test]
    fn test_restore_rejects_spoofed_peer() {
        let mut registry = EntityRegistry::new();
        registry
            .spawn(EntityEntry::new(
                EntityId(1),
                Role::Player,
                Authority::Peer(PeerId(2)),
            ))
            .unwrap();

        let state = ReconnectState {
            peer: 3, // claims to be someone else
            position: Vec3::ZERO.into(),
            rotation: Quat::IDENTITY,
            health: 1.0,
            max_health: 1.0,
            scene: String::new(),
        };
        let err = restore_player(&mut registry, PeerId(2), &state).unwrap_err();
        assert!(matches!(err, RestoreError::PeerMismatch { .. }));
    }

    #[test]
    fn test_restore_without_player_entity_fails() {
        let mut registry = EntityRegistry::new();
        let state = ReconnectState {
            peer: 5,
            position: Vec3::ZERO.into(),
            rotation: Quat::IDENTITY,
            health: 1.0,
            max_health: 1.0,
            scene: String::new(),
        };
        let err = restore_player(&mut registry, PeerId(5), &state).unwrap_err();
        assert_eq!(err, RestoreError::NoPlayerEntity(5));
    }

    #[test]
    fn test_degenerate_rotation_falls_back_to_identity() {
        let mut registry = EntityRegistry::new();
        registry
            .spawn(EntityEntry::new(
                EntityId(1),
                Role::Player,
                Authority::Peer(PeerId(2)),
            ))
            .unwrap();

        let state = ReconnectState {
            peer: 2,
            position: Vec3::ZERO.into(),
            rotation: Quat::from_xyzw(0.0, 0.0, 0.0, 0.0),
            health: 1.0,
            max_health: 1.0,
            scene: String::new(),
        };
        restore_player(&mut registry, PeerId(2), &state).unwrap();
        assert_eq!(registry.get(EntityId(1)).unwrap().pose.rotation, Quat::IDENTITY);
    }
}
