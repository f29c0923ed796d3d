//! Spatial interest gating for broadcast traffic.
//!
//! The world is carved into fixed-size grid cells on the two horizontal
//! axes. Every tick the host recomputes, per cell, whether any observing
//! participant is present and how many host-owned entities occupy it. Cells
//! with neither can have their broadcast traffic suppressed without hurting
//! correctness: the delta broadcaster compares against the last pose it
//! actually sent, so an entity re-entering an active cell resyncs on the
//! next pass.

use std::collections::{HashMap, HashSet};

use glam::Vec3;

use crate::registry::{EntityEntry, Role};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Tuning for the zone grid.
#[derive(Debug, Clone)]
pub struct ZoneConfig {
    /// Cell edge length in world units.
    pub cell_size: f32,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self { cell_size: 50.0 }
    }
}

// ---------------------------------------------------------------------------
// ZoneId
// ---------------------------------------------------------------------------

/// A grid-cell identifier on the x/z plane. Derived from position every
/// tick; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ZoneId {
    /// Cell index along x.
    pub x: i32,
    /// Cell index along z.
    pub z: i32,
}

impl ZoneId {
    /// Computes the cell containing `position` for the given cell size.
    pub fn of(position: Vec3, cell_size: f32) -> Self {
        Self {
            x: (position.x / cell_size).floor() as i32,
            z: (position.z / cell_size).floor() as i32,
        }
    }
}

// ---------------------------------------------------------------------------
// InterestGrid
// ---------------------------------------------------------------------------

/// Per-tick zone occupancy, rebuilt from the entity registry.
#[derive(Debug, Default)]
pub struct InterestGrid {
    config: ZoneConfig,
    observed: HashSet<ZoneId>,
    npc_counts: HashMap<ZoneId, u32>,
}

impl InterestGrid {
    /// Creates an empty grid with the given tuning.
    pub fn new(config: ZoneConfig) -> Self {
        Self {
            config,
            observed: HashSet::new(),
            npc_counts: HashMap::new(),
        }
    }

    /// Recomputes occupancy from the current entity set. Player entities
    /// mark their cell as observed; host-owned non-player entities bump
    /// their cell's count.
    pub fn rebuild<'a>(&mut self, entities: impl Iterator<Item = &'a EntityEntry>) {
        self.observed.clear();
        self.npc_counts.clear();

        for entry in entities {
            let zone = ZoneId::of(entry.pose.position, self.config.cell_size);
            match entry.role {
                Role::Player => {
                    self.observed.insert(zone);
                }
                Role::NonPlayerCharacter => {
                    if entry.is_host_owned_npc() {
                        *self.npc_counts.entry(zone).or_insert(0) += 1;
                    }
                }
            }
        }
    }

    /// Whether a cell contains an observer.
    pub fn has_observer(&self, zone: ZoneId) -> bool {
        self.observed.contains(&zone)
    }

    /// Number of host-owned entities in a cell.
    pub fn npc_count(&self, zone: ZoneId) -> u32 {
        self.npc_counts.get(&zone).copied().unwrap_or(0)
    }

    /// A cell is active iff it contains an observer or at least one
    /// host-owned entity. Only active cells are worth broadcasting in
    /// detail.
    pub fn is_active(&self, zone: ZoneId) -> bool {
        self.has_observer(zone) || self.npc_count(zone) > 0
    }

    /// Convenience: whether the cell containing `position` is active.
    pub fn should_broadcast(&self, position: Vec3) -> bool {
        self.is_active(ZoneId::of(position, self.config.cell_size))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
