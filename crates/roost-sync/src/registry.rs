//! The authoritative entity registry.
//!
//! Every simulated actor is registered here with a stable id, a role, and an
//! authority owner resolved once at spawn time. Components look entities up
//! by id and get an explicit `Option` back; there are no global singletons
//! and no by-name probing of live objects.

use std::collections::HashMap;

use glam::{Quat, Vec3};
use roost_net::PeerId;

// ---------------------------------------------------------------------------
// Identifiers and tags
// ---------------------------------------------------------------------------

/// Unique per-session identifier for a simulated entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// What an entity is, resolved once at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// A participant's avatar.
    Player,
    /// Any host-simulated actor (AI, creatures, vendors).
    NonPlayerCharacter,
}

/// Who owns an entity's simulation. Ownership never changes mid-session:
/// the host owns every non-player entity, and each participant owns its own
/// player entity for input purposes only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    /// Simulated by the host.
    Host,
    /// Input-owned by a specific participant.
    Peer(PeerId),
}

// ---------------------------------------------------------------------------
// Pose
// ---------------------------------------------------------------------------

/// A world transform: position plus rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// World-space position.
    pub position: Vec3,
    /// World-space rotation as a unit quaternion.
    pub rotation: Quat,
}

impl Pose {
    /// A pose at the origin with identity rotation.
    pub const IDENTITY: Pose = Pose {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    /// Creates a pose from its parts.
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// One registered entity.
#[derive(Debug, Clone)]
pub struct EntityEntry {
    /// Stable identifier.
    pub id: EntityId,
    /// Player or non-player, fixed at spawn.
    pub role: Role,
    /// Simulation owner, fixed at spawn.
    pub authority: Authority,
    /// Current transform.
    pub pose: Pose,
    /// Current linear velocity.
    pub velocity: Vec3,
    /// Whether local simulation for this entity is enabled. The authority
    /// gate flips this; presentation-only replicas keep it `false`.
    pub sim_enabled: bool,
}

impl EntityEntry {
    /// Creates an entry with the given tags at the identity pose, with
    /// simulation enabled.
    pub fn new(id: EntityId, role: Role, authority: Authority) -> Self {
        Self {
            id,
            role,
            authority,
            pose: Pose::IDENTITY,
            velocity: Vec3::ZERO,
            sim_enabled: true,
        }
    }

    /// Sets the initial pose, builder-style.
    pub fn at(mut self, pose: Pose) -> Self {
        self.pose = pose;
        self
    }

    /// Whether this is a host-owned non-player entity, the kind the
    /// authority gate cares about.
    pub fn is_host_owned_npc(&self) -> bool {
        self.role == Role::NonPlayerCharacter && self.authority == Authority::Host
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from registry mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// An entity with this id is already registered.
    #[error("duplicate entity id {0}")]
    Duplicate(EntityId),
}

// ---------------------------------------------------------------------------
// EntityRegistry
// ---------------------------------------------------------------------------

/// Id-keyed registry of all live entities on this side of the session.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: HashMap<EntityId, EntityEntry>,
}

impl EntityRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly spawned entity.
    pub fn spawn(&mut self, entry: EntityEntry) -> Result<(), RegistryError> {
        if self.entities.contains_key(&entry.id) {
            return Err(RegistryError::Duplicate(entry.id));
        }
        self.entities.insert(entry.id, entry);
        Ok(())
    }

    /// Removes an entity, returning its final entry if it existed.
    pub fn despawn(&mut self, id: EntityId) -> Option<EntityEntry> {
        self.entities.remove(&id)
    }

    /// Looks up an entity. Absence is an explicit `None`, not an error.
    pub fn get(&self, id: EntityId) -> Option<&EntityEntry> {
        self.entities.get(&id)
    }

    /// Mutable lookup.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut EntityEntry> {
        self.entities.get_mut(&id)
    }

    /// Iterates over all entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityEntry> {
        self.entities.values()
    }

    /// Mutable iteration over all entries.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut EntityEntry> {
        self.entities.values_mut()
    }

    /// The player entity input-owned by `peer`, if one is registered.
    pub fn player_of(&self, peer: PeerId) -> Option<&EntityEntry> {
        self.entities
            .values()
            .find(|e| e.role == Role::Player && e.authority == Authority::Peer(peer))
    }

    /// Mutable variant of [`Self::player_of`].
    pub fn player_of_mut(&mut self, peer: PeerId) -> Option<&mut EntityEntry> {
        self.entities
            .values_mut()
            .find(|e| e.role == Role::Player && e.authority == Authority::Peer(peer))
    }

    /// Number of registered entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_lookup_despawn() {
        let mut registry = EntityRegistry::new();
        let entry = EntityEntry::new(EntityId(1), Role::Player, Authority::Peer(PeerId(1)));
        registry.spawn(entry).unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.get(EntityId(1)).is_some());
        assert!(registry.get(EntityId(2)).is_none());

        let removed = registry.despawn(EntityId(1)).unwrap();
        assert_eq!(removed.id, EntityId(1));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_spawn_rejected() {
        let mut registry = EntityRegistry::new();
        registry
            .spawn(EntityEntry::new(
                EntityId(5),
                Role::NonPlayerCharacter,
                Authority::Host,
            ))
            .unwrap();
        let err = registry
            .spawn(EntityEntry::new(
                EntityId(5),
                Role::NonPlayerCharacter,
                Authority::Host,
            ))
            .unwrap_err();
        assert_eq!(err, RegistryError::Duplicate(EntityId(5)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_player_of_finds_owned_avatar() {
        let mut registry = EntityRegistry::new();
        registry
            .spawn(EntityEntry::new(
                EntityId(1),
                Role::Player,
                Authority::Peer(PeerId(7)),
            ))
            .unwrap();
        registry
            .spawn(EntityEntry::new(
                EntityId(2),
                Role::NonPlayerCharacter,
                Authority::Host,
            ))
            .unwrap();

        assert_eq!(registry.player_of(PeerId(7)).unwrap().id, EntityId(1));
        assert!(registry.player_of(PeerId(8)).is_none());
    }

    #[test]
    fn test_host_owned_npc_classification() {
        let npc = EntityEntry::new(EntityId(1), Role::NonPlayerCharacter, Authority::Host);
        let player = EntityEntry::new(EntityId(2), Role::Player, Authority::Peer(PeerId(1)));
        assert!(npc.is_host_owned_npc());
        assert!(!player.is_host_owned_npc());
    }
}
