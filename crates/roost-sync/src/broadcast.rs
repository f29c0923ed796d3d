//! Delta-compressed snapshot broadcasting (host side).
//!
//! Once per send interval the broadcaster walks the host-visible entities
//! and emits a fresh [`PlayerSnapshot`] only for those whose pose moved
//! beyond the configured thresholds since the last send. Near-static
//! entities cost no bandwidth, and eventual consistency is guaranteed
//! because the comparison is always against the last pose actually sent,
//! never against a cached "should have sent".

use std::collections::HashMap;

use glam::Vec3;
use roost_net::{PeerId, PlayerSnapshot};

use crate::registry::{EntityId, Pose};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Tuning for the delta broadcaster.
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Seconds between send passes.
    pub interval: f64,
    /// Positional delta below which no snapshot is sent.
    pub position_threshold: f32,
    /// Angular delta in degrees below which no snapshot is sent.
    pub rotation_threshold_deg: f32,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            interval: 0.100,
            position_threshold: 0.05,
            rotation_threshold_deg: 2.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Outgoing snapshots
// ---------------------------------------------------------------------------

/// Who an emitted snapshot should go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastTarget {
    /// Public state, sent to every participant.
    All,
    /// Peer-specific payload, unicast.
    One(PeerId),
}

/// One snapshot the session should hand to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingSnapshot {
    /// Recipient selector.
    pub target: BroadcastTarget,
    /// The wire payload.
    pub snapshot: PlayerSnapshot,
}

// ---------------------------------------------------------------------------
// DeltaBroadcaster
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct LastSent {
    pose: Pose,
}

/// Threshold-gated snapshot emitter with per-entity sequence counters.
#[derive(Debug)]
pub struct DeltaBroadcaster {
    config: BroadcastConfig,
    accumulator: f64,
    last_sent: HashMap<EntityId, LastSent>,
    sequences: HashMap<EntityId, u32>,
}

impl DeltaBroadcaster {
    /// Creates a broadcaster with the given tuning.
    pub fn new(config: BroadcastConfig) -> Self {
        Self {
            config,
            accumulator: 0.0,
            last_sent: HashMap::new(),
            sequences: HashMap::new(),
        }
    }

    /// Accumulates elapsed time; returns `true` when a send pass is due.
    /// The remainder carries over so the cadence stays stable under uneven
    /// tick lengths.
    pub fn pass_due(&mut self, dt: f64) -> bool {
        self.accumulator += dt;
        if self.accumulator >= self.config.interval {
            self.accumulator -= self.config.interval;
            true
        } else {
            false
        }
    }

    /// Whether `pose` differs from the last sent pose for `entity` by more
    /// than the thresholds. A never-sent entity always counts as changed.
    pub fn has_changed(&self, entity: EntityId, pose: &Pose) -> bool {
        let Some(last) = self.last_sent.get(&entity) else {
            return true;
        };
        let position_delta = pose.position.distance(last.pose.position);
        let rotation_delta = pose.rotation.angle_between(last.pose.rotation).to_degrees();
        position_delta > self.config.position_threshold
            || rotation_delta > self.config.rotation_threshold_deg
    }

    /// Emits a snapshot for `entity` if its pose moved past the thresholds,
    /// bumping the per-entity sequence and recording the sent pose. Returns
    /// `None` when the delta check suppresses the send, leaving all
    /// broadcaster state untouched.
    pub fn consider(
        &mut self,
        entity: EntityId,
        pose: &Pose,
        velocity: Vec3,
        host_time: f64,
    ) -> Option<PlayerSnapshot> {
        if !self.has_changed(entity, pose) {
            return None;
        }
        Some(self.emit(entity, pose, velocity, host_time))
    }

    /// Emits unconditionally, bypassing the delta check. Used to resync an
    /// entity after discontinuities (respawn, reconnect).
    pub fn force(
        &mut self,
        entity: EntityId,
        pose: &Pose,
        velocity: Vec3,
        host_time: f64,
    ) -> PlayerSnapshot {
        self.emit(entity, pose, velocity, host_time)
    }

    fn emit(
        &mut self,
        entity: EntityId,
        pose: &Pose,
        velocity: Vec3,
        host_time: f64,
    ) -> PlayerSnapshot {
        let sequence = self.sequences.entry(entity).or_insert(0);
        *sequence += 1;
        self.last_sent.insert(entity, LastSent { pose: *pose });
        PlayerSnapshot {
            entity_id: entity.0,
            sequence: *sequence,
            host_time,
            position: pose.position.into(),
            rotation: pose.rotation,
            velocity: velocity.into(),
        }
    }

    /// Forgets per-entity state after a despawn so a reused id starts a
    /// fresh stream.
    pub fn forget(&mut self, entity: EntityId) {
        self.last_sent.remove(&entity);
        self.sequences.remove(&entity);
    }

    /// The last sequence number sent for `entity`, if any.
    pub fn sequence_of(&self, entity: EntityId) -> Option<u32> {
        self.sequences.get(&entity).copied()
    }

    /// The last pose sent for `entity`, if any.
    pub fn last_sent_pose(&self, entity: EntityId) -> Option<Pose> {
        self.last_sent.get(&entity).map(|l| l.pose)
    }
}

impl Default for DeltaBroadcaster {
    fn default() -> Self {
        Self::new(BroadcastConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
