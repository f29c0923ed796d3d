//! Host-arbitrated exclusive locks over contested lootable resources.
//!
//! The host is the single arbiter: every request, release, and reclaim is
//! serialized through its tick, so at most one valid holder can exist per
//! resource without any distributed consensus. Liveness comes from
//! timeout-based reclamation plus disconnect detection; a crashed client
//! never wedges a container shut.

use std::collections::HashMap;

use roost_net::PeerId;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Tuning for the lock table.
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Seconds after acquisition at which a lock becomes reclaimable.
    pub timeout: f64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self { timeout: 15.0 }
    }
}

// ---------------------------------------------------------------------------
// Lock state
// ---------------------------------------------------------------------------

/// A held lock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LootLock {
    /// The participant holding the lock.
    pub holder: PeerId,
    /// Session time when the lock was (last) acquired or refreshed.
    pub acquired_at: f64,
}

/// Outcome of a lock request, as decided by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LockDecision {
    /// The resource was free (or its previous lock was stale) and is now
    /// held by the requester.
    Granted,
    /// The requester already held the lock; the timestamp was refreshed.
    Refreshed,
    /// Another participant holds a still-valid lock.
    Denied {
        /// The blocking holder.
        holder: PeerId,
    },
}

impl LockDecision {
    /// Whether the requester ends up holding the lock.
    pub fn is_granted(self) -> bool {
        matches!(self, LockDecision::Granted | LockDecision::Refreshed)
    }
}

// ---------------------------------------------------------------------------
// LootLockTable
// ---------------------------------------------------------------------------

/// Resource-id-keyed lock table. On the host this is authoritative; on a
/// client it mirrors broadcast lock state so the UI can show who is looting
/// without polling.
#[derive(Debug)]
pub struct LootLockTable {
    config: LockConfig,
    locks: HashMap<u64, LootLock>,
}

impl LootLockTable {
    /// Creates an empty table with the given tuning.
    pub fn new(config: LockConfig) -> Self {
        Self {
            config,
            locks: HashMap::new(),
        }
    }

    /// Decides a lock request (host side).
    ///
    /// A lock whose holder timed out or disconnected is purged before the
    /// decision, so the request is retried as a fresh grant. Re-acquisition
    /// by the current holder refreshes the timestamp.
    pub fn request(
        &mut self,
        resource_id: u64,
        requester: PeerId,
        now: f64,
        is_connected: impl Fn(PeerId) -> bool,
    ) -> LockDecision {
        if let Some(existing) = self.locks.get(&resource_id).copied() {
            if self.is_stale(&existing, now, &is_connected) {
                self.locks.remove(&resource_id);
            } else if existing.holder == requester {
                self.locks.insert(
                    resource_id,
                    LootLock {
                        holder: requester,
                        acquired_at: now,
                    },
                );
                return LockDecision::Refreshed;
            } else {
                return LockDecision::Denied {
                    holder: existing.holder,
                };
            }
        }

        self.locks.insert(
            resource_id,
            LootLock {
                holder: requester,
                acquired_at: now,
            },
        );
        LockDecision::Granted
    }

    /// Releases a lock. Succeeds only if `requester` is the current holder;
    /// anything else is a no-op returning `false`.
    pub fn release(&mut self, resource_id: u64, requester: PeerId) -> bool {
        match self.locks.get(&resource_id) {
            Some(lock) if lock.holder == requester => {
                self.locks.remove(&resource_id);
                true
            }
            _ => false,
        }
    }

    /// Purges every expired or orphaned lock, returning the freed resource
    /// ids so the host can broadcast the unlocks. Run once per tick.
    pub fn sweep(&mut self, now: f64, is_connected: impl Fn(PeerId) -> bool) -> Vec<u64> {
        let stale: Vec<u64> = self
            .locks
            .iter()
            .filter(|(_, lock)| self.is_stale(lock, now, &is_connected))
            .map(|(id, _)| *id)
            .collect();
        for id in &stale {
            let lock = self.locks.remove(id);
            if let Some(lock) = lock {
                tracing::debug!(
                    resource_id = id,
                    holder = %lock.holder,
                    "reclaimed stale loot lock"
                );
            }
        }
        stale
    }

    fn is_stale(&self, lock: &LootLock, now: f64, is_connected: impl Fn(PeerId) -> bool) -> bool {
        now - lock.acquired_at > self.config.timeout || !is_connected(lock.holder)
    }

    /// Current holder of a resource, if locked.
    pub fn holder(&self, resource_id: u64) -> Option<PeerId> {
        self.locks.get(&resource_id).map(|l| l.holder)
    }

    /// Whether a resource is currently locked.
    pub fn is_locked(&self, resource_id: u64) -> bool {
        self.locks.contains_key(&resource_id)
    }

    /// Number of held locks.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no locks are held.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    // --- Client mirror ---

    /// Applies a broadcast lock state (client side). Clients record an
    /// approximate acquisition time; staleness is still decided by the host.
    pub fn apply_state(&mut self, resource_id: u64, granted: bool, holder: Option<PeerId>, now: f64) {
        match (granted, holder) {
            (true, Some(holder)) => {
                self.locks.insert(
                    resource_id,
                    LootLock {
                        holder,
                        acquired_at: now,
                    },
                );
            }
            _ => {
                // A denial carries no state change for replicas.
            }
        }
    }

    /// Applies a broadcast unlock (client side).
    pub fn apply_unlock(&mut self, resource_id: u64) {
        self.locks.remove(&resource_id);
    }
}

impl Default for LootLockTable {
    fn default() -> Self {
        Self::new(LockConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
