//! Per-entity snapshot buffering and interpolated sampling.
//!
//! Each remote entity owns an [`InterpolationBuffer`] holding its most
//! recent authoritative snapshots. Presentation samples the buffer at a
//! deliberately delayed render time (now minus the back-time window), which
//! trades a fixed amount of latency for smooth motion between 100 ms
//! snapshot arrivals. Stale and duplicate packets are rejected by sequence
//! number before they ever reach the buffer.

use std::collections::VecDeque;

use glam::{Quat, Vec3};
use roost_net::PlayerSnapshot;

use crate::registry::Pose;

/// Two snapshot timestamps closer than this are treated as coincident and
/// sampling snaps to the newer one instead of dividing by the gap.
const MIN_INTERP_WINDOW: f64 = 1e-4;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Tuning for snapshot interpolation.
#[derive(Debug, Clone)]
pub struct InterpConfig {
    /// Render delay in seconds. Larger is smoother but laggier.
    pub back_time: f64,
    /// Distance beyond which the presented pose teleports to the target
    /// instead of smoothing toward it.
    pub snap_distance: f32,
    /// Exponential-decay blend factor applied per presentation tick.
    pub blend_factor: f32,
    /// Longest gap in seconds that dead-reckoning extrapolation is allowed
    /// to cover; beyond this the last known pose is held.
    pub max_extrapolation: f64,
    /// Maximum buffered snapshots per entity; the oldest is evicted first.
    pub capacity: usize,
}

impl Default for InterpConfig {
    fn default() -> Self {
        Self {
            back_time: 0.150,
            snap_distance: 2.0,
            blend_factor: 0.9,
            max_extrapolation: 0.5,
            capacity: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// One accepted pose sample, in world units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    /// Per-entity sequence number.
    pub sequence: u32,
    /// Host clock at capture time.
    pub host_time: f64,
    /// Position in world units.
    pub position: Vec3,
    /// Rotation as a unit quaternion.
    pub rotation: Quat,
    /// Linear velocity in world units per second.
    pub velocity: Vec3,
}

impl From<&PlayerSnapshot> for Snapshot {
    fn from(wire: &PlayerSnapshot) -> Self {
        Self {
            sequence: wire.sequence,
            host_time: wire.host_time,
            position: wire.position.into(),
            rotation: wire.rotation,
            velocity: wire.velocity.into(),
        }
    }
}

/// Outcome of offering a snapshot to the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receive {
    /// The snapshot was newer than everything seen so far and was buffered.
    Accepted,
    /// The snapshot arrived late or duplicated and was dropped.
    Stale {
        /// Sequence number of the rejected snapshot.
        sequence: u32,
        /// Newest sequence number accepted so far.
        newest: u32,
    },
}

/// Outcome of one presentation step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// No snapshot data; keep the current pose.
    Idle,
    /// The target was too far away; the pose was set directly and the
    /// buffer cleared.
    Snapped(Pose),
    /// Normal smoothing toward the resolved target.
    Blended(Pose),
}

// ---------------------------------------------------------------------------
// InterpolationBuffer
// ---------------------------------------------------------------------------

/// Bounded, timestamp-ordered snapshot history for one entity.
#[derive(Debug)]
pub struct InterpolationBuffer {
    config: InterpConfig,
    entries: VecDeque<Snapshot>,
    last_sequence: Option<u32>,
}

impl InterpolationBuffer {
    /// Creates an empty buffer with the given tuning.
    pub fn new(config: InterpConfig) -> Self {
        let capacity = config.capacity;
        Self {
            config,
            entries: VecDeque::with_capacity(capacity),
            last_sequence: None,
        }
    }

    /// Offers a snapshot. Only sequence numbers strictly greater than the
    /// newest accepted one are kept; everything else is a stale packet and
    /// dropped. Acceptance order equals timestamp order because the host
    /// stamps and numbers snapshots together.
    pub fn receive(&mut self, snapshot: Snapshot) -> Receive {
        if let Some(newest) = self.last_sequence
            && snapshot.sequence <= newest
        {
            tracing::debug!(
                sequence = snapshot.sequence,
                newest,
                "dropping stale snapshot"
            );
            return Receive::Stale {
                sequence: snapshot.sequence,
                newest,
            };
        }

        self.last_sequence = Some(snapshot.sequence);
        self.entries.push_back(snapshot);
        while self.entries.len() > self.config.capacity {
            self.entries.pop_front();
        }
        Receive::Accepted
    }

    /// Resolves the target pose for `render_time`.
    ///
    /// With snapshots on both sides of the render time this interpolates
    /// between them (and prunes entries that have scrolled out of the
    /// back-time window, always keeping at least one). With only older
    /// snapshots it dead-reckons from the newest for up to the configured
    /// extrapolation window, then holds. Returns `None` on an empty buffer.
    pub fn sample(&mut self, render_time: f64) -> Option<Pose> {
        if self.entries.is_empty() {
            return None;
        }

        let before = self
            .entries
            .iter()
            .filter(|s| s.host_time <= render_time)
            .next_back()
            .copied();
        let after = self
            .entries
            .iter()
            .find(|s| s.host_time > render_time)
            .copied();

        match (before, after) {
            (Some(b), Some(a)) => {
                let total = a.host_time - b.host_time;
                let pose = if total < MIN_INTERP_WINDOW {
                    Pose::new(a.position, a.rotation)
                } else {
                    let t = ((render_time - b.host_time) / total) as f32;
                    Pose::new(
                        b.position.lerp(a.position, t),
                        b.rotation.slerp(a.rotation, t),
                    )
                };
                self.prune(render_time);
                Some(pose)
            }
            (Some(b), None) => {
                let elapsed = render_time - b.host_time;
                if elapsed < self.config.max_extrapolation {
                    Some(Pose::new(
                        b.position + b.velocity * elapsed as f32,
                        b.rotation,
                    ))
                } else {
                    // Too old to trust the velocity; hold the last pose.
                    Some(Pose::new(b.position, b.rotation))
                }
            }
            // Everything buffered is still in the future; head toward the
            // earliest of it.
            (None, Some(a)) => Some(Pose::new(a.position, a.rotation)),
            (None, None) => None,
        }
    }

    /// Runs one full presentation step: resolve the target for
    /// `render_time`, teleport-and-clear if it is beyond the snap distance
    /// from `presented`, otherwise blend toward it.
    pub fn step(&mut self, render_time: f64, presented: &Pose) -> Step {
        let Some(target) = self.sample(render_time) else {
            return Step::Idle;
        };

        let distance = presented.position.distance(target.position);
        if distance > self.config.snap_distance {
            // A discontinuous repositioning (respawn, scene change), not
            // motion to smooth over.
            tracing::warn!(distance, "snap threshold exceeded, teleporting");
            self.entries.clear();
            return Step::Snapped(target);
        }

        let blend = self.config.blend_factor;
        Step::Blended(Pose::new(
            presented.position.lerp(target.position, blend),
            presented.rotation.slerp(target.rotation, blend),
        ))
    }

    /// Drops entries older than the back-time window behind `render_time`,
    /// keeping at least one.
    fn prune(&mut self, render_time: f64) {
        while self.entries.len() > 1 {
            let oldest = self.entries.front().expect("len checked");
            if oldest.host_time < render_time - self.config.back_time {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    /// Number of buffered snapshots.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the buffer holds no snapshots.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The newest accepted sequence number, if any snapshot was accepted.
    pub fn newest_sequence(&self) -> Option<u32> {
        self.last_sequence
    }
}

impl Default for InterpolationBuffer {
    fn default() -> Self {
        Self::new(InterpConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(sequence: u32, host_time: f64, position: Vec3) -> Snapshot {
        Snapshot {
            sequence,
            host_time,
            position,
            rotation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
        }
    }

    #[test]
    fn test_accepted_sequences_are_strictly_increasing() {
        // P1: regardless of delivery order, the accepted set is the maximal
        // increasing subsequence of what was offered.
        let mut buffer = InterpolationBuffer::default();
        let delivery = [3u32, 1, 4, 2, 6, 5, 7, 7];
        let mut accepted = Vec::new();
        for seq in delivery {
            if buffer.receive(snap(seq, seq as f64 * 0.1, Vec3::ZERO)) == Receive::Accepted {
                accepted.push(seq);
            }
        }
        assert_eq!(accepted, vec![3, 4, 6, 7]);
        for pair in accepted.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert_eq!(buffer.newest_sequence(), Some(7));
    }

    #[test]
    fn test_stale_snapshot_dropped_after_newer_arrival() {
        // Scenario A: seq=1 then an out-of-order seq=0.
        let mut buffer = InterpolationBuffer::default();
        assert_eq!(
            buffer.receive(snap(1, 1.000, Vec3::ZERO)),
            Receive::Accepted
        );
        assert_eq!(
            buffer.receive(snap(0, 0.900, Vec3::new(9.0, 9.0, 9.0))),
            Receive::Stale {
                sequence: 0,
                newest: 1
            }
        );
        assert_eq!(buffer.len(), 1);
        let pose = buffer.sample(1.000).unwrap();
        assert_eq!(pose.position, Vec3::ZERO);
    }

    #[test]
    fn test_two_point_interpolation_is_on_segment() {
        // P2 / Scenario C: sampling between t=0 (0,0,0) and t=0.2 (2,0,0).
        let mut buffer = InterpolationBuffer::default();
        buffer.receive(snap(1, 0.0, Vec3::ZERO));
        buffer.receive(snap(2, 0.2, Vec3::new(2.0, 0.0, 0.0)));

        let mid = buffer.sample(0.1).unwrap();
        assert!((mid.position - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-5);

        for (t, expected_x) in [(0.0, 0.0f32), (0.05, 0.5), (0.15, 1.5), (0.2, 2.0)] {
            let pose = buffer.sample(t).unwrap();
            assert!(
                (pose.position.x - expected_x).abs() < 1e-4,
                "at t={t} expected x={expected_x}, got {}",
                pose.position.x
            );
            assert_eq!(pose.position.y, 0.0);
            assert_eq!(pose.position.z, 0.0);
        }
    }

    #[test]
    fn test_rotation_interpolates_between_snapshots() {
        let mut buffer = InterpolationBuffer::default();
        let mut a = snap(1, 0.0, Vec3::ZERO);
        let mut b = snap(2, 1.0, Vec3::ZERO);
        a.rotation = Quat::IDENTITY;
        b.rotation = Quat::from_rotation_y(1.0);
        buffer.receive(a);
        buffer.receive(b);

        let pose = buffer.sample(0.5).unwrap();
        let (axis, angle) = pose.rotation.to_axis_angle();
        assert!((angle - 0.5).abs() < 1e-3, "angle was {angle}");
        assert!(axis.y > 0.99);
    }

    #[test]
    fn test_degenerate_window_snaps_to_after() {
        let mut buffer = InterpolationBuffer::default();
        buffer.receive(snap(1, 1.0, Vec3::ZERO));
        buffer.receive(snap(2, 1.0 + 5e-5, Vec3::new(1.0, 0.0, 0.0)));

        let pose = buffer.sample(1.0 + 2e-5).unwrap();
        assert_eq!(pose.position, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_extrapolation_uses_velocity_within_window() {
        let mut buffer = InterpolationBuffer::default();
        let mut s = snap(1, 1.0, Vec3::new(1.0, 0.0, 0.0));
        s.velocity = Vec3::new(2.0, 0.0, 0.0);
        buffer.receive(s);

        // 0.3s past the newest snapshot: dead-reckon 0.6 units forward.
        let pose = buffer.sample(1.3).unwrap();
        assert!((pose.position.x - 1.6).abs() < 1e-5);
    }

    #[test]
    fn test_extrapolation_capped_at_half_second() {
        let mut buffer = InterpolationBuffer::default();
        let mut s = snap(1, 1.0, Vec3::new(1.0, 0.0, 0.0));
        s.velocity = Vec3::new(100.0, 0.0, 0.0);
        buffer.receive(s);

        // Way past the window: hold the last known position, no drift.
        let pose = buffer.sample(3.0).unwrap();
        assert_eq!(pose.position, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_snap_teleports_and_clears_buffer() {
        // Scenario D: 5m discrepancy with a 2m threshold.
        let mut buffer = InterpolationBuffer::default();
        buffer.receive(snap(1, 0.0, Vec3::new(5.0, 0.0, 0.0)));
        buffer.receive(snap(2, 0.2, Vec3::new(5.0, 0.0, 0.0)));

        let presented = Pose::IDENTITY;
        match buffer.step(0.1, &presented) {
            Step::Snapped(pose) => assert_eq!(pose.position, Vec3::new(5.0, 0.0, 0.0)),
            other => panic!("expected snap, got {other:?}"),
        }
        assert!(buffer.is_empty(), "snap must clear the buffer");
    }

    #[test]
    fn test_blend_moves_toward_target_without_reaching_it() {
        let mut buffer = InterpolationBuffer::default();
        buffer.receive(snap(1, 0.0, Vec3::new(1.0, 0.0, 0.0)));
        buffer.receive(snap(2, 0.2, Vec3::new(1.0, 0.0, 0.0)));

        let presented = Pose::IDENTITY;
        match buffer.step(0.1, &presented) {
            Step::Blended(pose) => {
                assert!((pose.position.x - 0.9).abs() < 1e-5, "0.9 blend factor");
            }
            other => panic!("expected blend, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_buffer_is_a_no_op() {
        let mut buffer = InterpolationBuffer::default();
        assert!(buffer.sample(1.0).is_none());
        assert_eq!(buffer.step(1.0, &Pose::IDENTITY), Step::Idle);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut buffer = InterpolationBuffer::new(InterpConfig {
            capacity: 4,
            ..InterpConfig::default()
        });
        for i in 1..=10u32 {
            buffer.receive(snap(i, i as f64, Vec3::ZERO));
        }
        assert_eq!(buffer.len(), 4);
        // Oldest remaining entry is seq 7.
        assert_eq!(buffer.entries.front().unwrap().sequence, 7);
    }

    #[test]
    fn test_prune_keeps_at_least_one_entry() {
        let mut buffer = InterpolationBuffer::default();
        buffer.receive(snap(1, 0.0, Vec3::ZERO));
        buffer.receive(snap(2, 0.05, Vec3::ZERO));
        buffer.receive(snap(3, 10.0, Vec3::ZERO));
        buffer.receive(snap(4, 10.1, Vec3::ZERO));

        // Sampling far ahead prunes the ancient entries but never empties.
        buffer.sample(10.05).unwrap();
        assert!(buffer.len() >= 1);
        assert!(
            buffer.entries.iter().all(|s| s.host_time >= 9.0),
            "entries from t=0 should have been pruned"
        );
    }

    #[test]
    fn test_future_only_buffer_targets_earliest_snapshot() {
        let mut buffer = InterpolationBuffer::default();
        buffer.receive(snap(1, 5.0, Vec3::new(3.0, 0.0, 0.0)));
        let pose = buffer.sample(4.0).unwrap();
        assert_eq!(pose.position, Vec3::new(3.0, 0.0, 0.0));
    }
}
