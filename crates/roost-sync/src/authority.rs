//! Authority enforcement: only the host simulates host-owned entities.
//!
//! This is a narrow gate, not a scheduler. On a client every host-owned
//! non-player entity has its simulation disabled outright (the replica is
//! driven by snapshots); on the host it is kept enabled. Outside a networked
//! session the gate is bypassed entirely so single-player keeps working.
//! Both directions are idempotent.

use crate::registry::{EntityEntry, EntityId, EntityRegistry};

// ---------------------------------------------------------------------------
// SessionMode
// ---------------------------------------------------------------------------

/// Which side of the session this process is, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// No networked session; simulation always runs.
    Offline,
    /// The authoritative participant.
    Host,
    /// A replica-rendering participant.
    Client,
}

// ---------------------------------------------------------------------------
// AuthorityGate
// ---------------------------------------------------------------------------

/// Entities whose simulation flag was flipped by one enforcement pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateReport {
    /// Entities whose simulation was switched on.
    pub enabled: Vec<EntityId>,
    /// Entities whose simulation was switched off.
    pub disabled: Vec<EntityId>,
}

/// Gate deciding where simulation may execute.
#[derive(Debug, Clone, Copy)]
pub struct AuthorityGate {
    mode: SessionMode,
}

impl AuthorityGate {
    /// Creates a gate for the given session mode.
    pub fn new(mode: SessionMode) -> Self {
        Self { mode }
    }

    /// The mode this gate enforces.
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Whether simulation for `entry` may run in this process.
    ///
    /// Host-owned non-player entities simulate only on the host. Player
    /// entities always run locally (their owner feeds input; the host stays
    /// authoritative over outcomes). Offline bypasses the gate.
    pub fn simulation_allowed(&self, entry: &EntityEntry) -> bool {
        match self.mode {
            SessionMode::Offline => true,
            SessionMode::Host => true,
            SessionMode::Client => !entry.is_host_owned_npc(),
        }
    }

    /// Applies the gate to every registered entity, flipping `sim_enabled`
    /// where it disagrees with the verdict. Re-enabling an enabled entity or
    /// re-disabling a disabled one is a no-op, so running this every tick is
    /// safe and cheap.
    pub fn enforce(&self, registry: &mut EntityRegistry) -> GateReport {
        let mut report = GateReport::default();
        for entry in registry.iter_mut() {
            let allowed = self.simulation_allowed(entry);
            if entry.sim_enabled == allowed {
                continue;
            }
            entry.sim_enabled = allowed;
            if allowed {
                report.enabled.push(entry.id);
            } else {
                tracing::debug!(entity = %entry.id, "disabling replica simulation");
                report.disabled.push(entry.id);
            }
        }
        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Authority, Role};
    use roost_net::PeerId;

    fn registry_with_npc_and_player() -> EntityRegistry {
        let mut registry = EntityRegistry::new();
        registry
            .spawn(EntityEntry::new(
                EntityId(1),
                Role::NonPlayerCharacter,
                Authority::Host,
            ))
            .unwrap();
        registry
            .spawn(EntityEntry::new(
                EntityId(2),
                Role::Player,
                Authority::Peer(PeerId(1)),
            ))
            .unwrap();
        registry
    }

    #[test]
    fn test_client_disables_host_owned_npcs() {
        let mut registry = registry_with_npc_and_player();
        let gate = AuthorityGate::new(SessionMode::Client);

        let report = gate.enforce(&mut registry);
        assert_eq!(report.disabled, vec![EntityId(1)]);
        assert!(report.enabled.is_empty());
        assert!(!registry.get(EntityId(1)).unwrap().sim_enabled);
        assert!(registry.get(EntityId(2)).unwrap().sim_enabled);
    }

    #[test]
    fn test_host_keeps_npcs_enabled() {
        let mut registry = registry_with_npc_and_player();
        // Something turned the NPC off earlier; the host turns it back on.
        registry.get_mut(EntityId(1)).unwrap().sim_enabled = false;

        let gate = AuthorityGate::new(SessionMode::Host);
        let report = gate.enforce(&mut registry);
        assert_eq!(report.enabled, vec![EntityId(1)]);
        assert!(registry.get(EntityId(1)).unwrap().sim_enabled);
    }

    #[test]
    fn test_offline_bypasses_gate() {
        let mut registry = registry_with_npc_and_player();
        registry.get_mut(EntityId(1)).unwrap().sim_enabled = false;

        let gate = AuthorityGate::new(SessionMode::Offline);
        let report = gate.enforce(&mut registry);
        assert_eq!(report.enabled, vec![EntityId(1)]);
        assert!(
            registry.iter().all(|e| e.sim_enabled),
            "offline runs everything"
        );
    }

    #[test]
    fn test_enforcement_is_idempotent() {
        let mut registry = registry_with_npc_and_player();
        let gate = AuthorityGate::new(SessionMode::Client);

        let first = gate.enforce(&mut registry);
        assert!(!first.disabled.is_empty());

        // Second pass finds nothing to do.
        let second = gate.enforce(&mut registry);
        assert_eq!(second, GateReport::default());
    }

    #[test]
    fn test_player_simulation_always_allowed() {
        let player = EntityEntry::new(EntityId(9), Role::Player, Authority::Peer(PeerId(3)));
        for mode in [SessionMode::Offline, SessionMode::Host, SessionMode::Client] {
            assert!(AuthorityGate::new(mode).simulation_allowed(&player), "{mode:?}");
        }
    }
}
