//! Client-side shot prediction.
//!
//! Firing feels instant because the local effect plays the moment the
//! trigger is pulled; the host still owns the hit verdict. Each predicted
//! shot is remembered until the host's response resolves it, and entries
//! that never get a response age out instead of accumulating.

use std::collections::VecDeque;

use glam::Vec3;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Tuning for the pending-shot buffer.
#[derive(Debug, Clone)]
pub struct PredictionConfig {
    /// Maximum outstanding predicted shots.
    pub capacity: usize,
    /// Seconds after which an unconfirmed shot is expired.
    pub max_age: f64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            capacity: 128,
            max_age: 2.0,
        }
    }
}

// ---------------------------------------------------------------------------
// PendingShot
// ---------------------------------------------------------------------------

/// One locally predicted shot awaiting the host verdict.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingShot {
    /// Locally assigned shot identifier, echoed by the host.
    pub shot_id: u32,
    /// Muzzle position at fire time.
    pub muzzle: Vec3,
    /// Normalized fire direction.
    pub direction: Vec3,
    /// Weapon type for effect selection.
    pub weapon_type: u32,
    /// Session time the shot was fired.
    pub fired_at: f64,
}

/// The host's answer to a predicted shot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShotVerdict {
    /// The shot that was resolved.
    pub shot: PendingShot,
    /// Whether the host scored it as a hit.
    pub hit: bool,
    /// Impact point when `hit` is true.
    pub hit_point: Option<Vec3>,
}

// ---------------------------------------------------------------------------
// ShotBuffer
// ---------------------------------------------------------------------------

/// Bounded buffer of unconfirmed predicted shots.
#[derive(Debug)]
pub struct ShotBuffer {
    config: PredictionConfig,
    shots: VecDeque<PendingShot>,
    next_id: u32,
}

impl ShotBuffer {
    /// Creates an empty buffer with the given tuning.
    pub fn new(config: PredictionConfig) -> Self {
        Self {
            config,
            shots: VecDeque::new(),
            next_id: 1,
        }
    }

    /// Records a fired shot and returns its id for the host request. The
    /// caller plays the local trajectory effect immediately.
    pub fn fire(&mut self, muzzle: Vec3, direction: Vec3, weapon_type: u32, now: f64) -> u32 {
        let shot_id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        if self.shots.len() >= self.config.capacity {
            self.shots.pop_front();
        }
        self.shots.push_back(PendingShot {
            shot_id,
            muzzle,
            direction,
            weapon_type,
            fired_at: now,
        });
        shot_id
    }

    /// Resolves a host verdict against its predicted shot. Unknown ids
    /// (already expired, or duplicated responses) return `None`.
    pub fn confirm(&mut self, shot_id: u32, hit: bool, hit_point: Option<Vec3>) -> Option<ShotVerdict> {
        let index = self.shots.iter().position(|s| s.shot_id == shot_id)?;
        let shot = self.shots.remove(index).expect("position valid");
        Some(ShotVerdict {
            shot,
            hit,
            hit_point,
        })
    }

    /// Expires shots older than the configured age, returning how many were
    /// dropped.
    pub fn expire(&mut self, now: f64) -> usize {
        let mut dropped = 0;
        while let Some(front) = self.shots.front() {
            if now - front.fired_at > self.config.max_age {
                self.shots.pop_front();
                dropped += 1;
            } else {
                break;
            }
        }
        dropped
    }

    /// Number of unconfirmed shots.
    pub fn len(&self) -> usize {
        self.shots.len()
    }

    /// Whether no shots are outstanding.
    pub fn is_empty(&self) -> bool {
        self.shots.is_empty()
    }
}

impl Default for ShotBuffer {
    fn default() -> Self {
        Self::new(PredictionConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
