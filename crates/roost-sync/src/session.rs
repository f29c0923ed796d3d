//! Session contexts: the host and client tick pipelines.
//!
//! A session object owns the clock, the entity registry, and every sync
//! component, wired together by explicit construction instead of global
//! singletons. The host pipeline per tick: drain input, enforce authority,
//! sweep locks, rebuild interest, delta-broadcast, flush batches, replay due
//! events. The client pipeline: drain and route messages through the
//! sequence/staleness checks into buffers and queues, enforce authority,
//! replay due events, and sample every replica's pose at the delayed render
//! time.
//!
//! Presentation reacts through [`SessionCallbacks`]; the callbacks receive
//! resolved state (accepted snapshots, lock results, due events), never raw
//! packets.

use std::collections::HashMap;

use glam::Vec3;
use roost_net::{
    EventKind, LootLockRequest, LootLockState, LootUnlock, Message, PeerId, Transport,
    TransportError, UpdateKind,
};

use crate::authority::{AuthorityGate, SessionMode};
use crate::batch::{BatchConfig, BatchQueue};
use crate::broadcast::{BroadcastConfig, BroadcastTarget, DeltaBroadcaster, OutgoingSnapshot};
use crate::clock::SessionClock;
use crate::diagnostics::{DiagnosticsConfig, DiagnosticsTracker, SyncDiagnostics};
use crate::events::{DueEvent, EventConfig, EventReplayQueue};
use crate::interest::{InterestGrid, ZoneConfig};
use crate::interp::{InterpConfig, InterpolationBuffer, Receive, Snapshot, Step};
use crate::loot_lock::{LockConfig, LockDecision, LootLockTable};
use crate::prediction::{PredictionConfig, ShotBuffer, ShotVerdict};
use crate::reconnect::{OwnState, ReconnectConfig, ReconnectTracker, restore_player};
use crate::registry::{Authority, EntityEntry, EntityId, EntityRegistry, Pose, RegistryError, Role};

// ---------------------------------------------------------------------------
// Tuning
// ---------------------------------------------------------------------------

/// Aggregated tuning for every session component.
#[derive(Debug, Clone, Default)]
pub struct SessionTuning {
    /// Interpolation buffer tuning.
    pub interp: InterpConfig,
    /// Delta broadcaster tuning.
    pub broadcast: BroadcastConfig,
    /// Loot lock tuning.
    pub lock: LockConfig,
    /// Event replay tuning.
    pub events: EventConfig,
    /// Zone grid tuning.
    pub zones: ZoneConfig,
    /// Batch queue tuning.
    pub batch: BatchConfig,
    /// Shot prediction tuning.
    pub prediction: PredictionConfig,
    /// Reconnect snapshot tuning.
    pub reconnect: ReconnectConfig,
    /// Diagnostics tuning.
    pub diagnostics: DiagnosticsConfig,
}

// ---------------------------------------------------------------------------
// Callbacks
// ---------------------------------------------------------------------------

/// Hooks the presentation layer registers to react to resolved state.
/// Unset hooks are skipped.
#[derive(Default)]
pub struct SessionCallbacks {
    /// An authoritative snapshot was accepted for an entity.
    pub on_snapshot: Option<Box<dyn FnMut(EntityId, &Snapshot)>>,
    /// A loot lock request was resolved (granted or denied with holder).
    pub on_loot_lock_result: Option<Box<dyn FnMut(u64, bool, Option<PeerId>)>>,
    /// A queued event became due and should play now.
    pub on_event_due: Option<Box<dyn FnMut(&DueEvent)>>,
    /// A batch of object-state changes arrived.
    pub on_batch_update: Option<Box<dyn FnMut(UpdateKind, u64, bool)>>,
    /// A participant joined the session.
    pub on_peer_joined: Option<Box<dyn FnMut(PeerId)>>,
    /// A participant left the session.
    pub on_peer_left: Option<Box<dyn FnMut(PeerId)>>,
}

impl std::fmt::Debug for SessionCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCallbacks")
            .field("on_snapshot", &self.on_snapshot.is_some())
            .field("on_loot_lock_result", &self.on_loot_lock_result.is_some())
            .field("on_event_due", &self.on_event_due.is_some())
            .field("on_batch_update", &self.on_batch_update.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The transport rejected a send.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Registry mutation failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

// ---------------------------------------------------------------------------
// HostSession
// ---------------------------------------------------------------------------

/// The authoritative side of the session.
pub struct HostSession<T: Transport> {
    transport: T,
    clock: SessionClock,
    registry: EntityRegistry,
    gate: AuthorityGate,
    interest: InterestGrid,
    broadcaster: DeltaBroadcaster,
    locks: LootLockTable,
    events: EventReplayQueue,
    batches: BatchQueue,
    diagnostics: DiagnosticsTracker,
    /// Presentation hooks.
    pub callbacks: SessionCallbacks,
    event_skew_warn: f64,
    next_entity_id: u64,
}

impl<T: Transport> HostSession<T> {
    /// Creates a host session over the given transport.
    pub fn new(transport: T, tuning: SessionTuning) -> Self {
        Self {
            transport,
            clock: SessionClock::new(),
            registry: EntityRegistry::new(),
            gate: AuthorityGate::new(SessionMode::Host),
            interest: InterestGrid::new(tuning.zones.clone()),
            broadcaster: DeltaBroadcaster::new(tuning.broadcast.clone()),
            locks: LootLockTable::new(tuning.lock.clone()),
            events: EventReplayQueue::new(tuning.events.clone()),
            batches: BatchQueue::new(tuning.batch.clone()),
            diagnostics: DiagnosticsTracker::new(tuning.diagnostics.clone()),
            callbacks: SessionCallbacks::default(),
            event_skew_warn: tuning.events.skew_warn,
            next_entity_id: 1,
        }
    }

    /// Spawns the player entity for a newly connected participant.
    pub fn spawn_player(&mut self, peer: PeerId, pose: Pose) -> Result<EntityId, SessionError> {
        let id = self.allocate_entity_id();
        self.registry
            .spawn(EntityEntry::new(id, Role::Player, Authority::Peer(peer)).at(pose))?;
        if let Some(hook) = self.callbacks.on_peer_joined.as_mut() {
            hook(peer);
        }
        Ok(id)
    }

    /// Spawns a host-owned non-player entity.
    pub fn spawn_npc(&mut self, pose: Pose) -> Result<EntityId, SessionError> {
        let id = self.allocate_entity_id();
        self.registry
            .spawn(EntityEntry::new(id, Role::NonPlayerCharacter, Authority::Host).at(pose))?;
        Ok(id)
    }

    /// Despawns an entity and forgets its broadcast stream.
    pub fn despawn(&mut self, id: EntityId) -> Option<EntityEntry> {
        self.broadcaster.forget(id);
        self.registry.despawn(id)
    }

    /// Handles a participant disconnect: releases nothing directly (the
    /// sweep reclaims their locks) but notifies presentation.
    pub fn peer_left(&mut self, peer: PeerId) {
        if let Some(hook) = self.callbacks.on_peer_left.as_mut() {
            hook(peer);
        }
    }

    fn allocate_entity_id(&mut self) -> EntityId {
        let id = EntityId(self.next_entity_id);
        self.next_entity_id += 1;
        id
    }

    /// Stamps an event at the current host time plus `delay`, broadcasts it
    /// reliably, and queues it locally so the host plays it at the same
    /// staggered instant as everyone else.
    pub fn broadcast_event(
        &mut self,
        entity: EntityId,
        kind: EventKind,
        position: Vec3,
        delay: f32,
        payload: Vec<u8>,
    ) -> Result<(), SessionError> {
        let event =
            EventReplayQueue::stamp(entity.0, kind, position, self.clock.now(), delay, payload);
        let msg = Message::AiEvent(event.clone());
        let delivery = msg.delivery();
        self.transport.send_to_all(&msg, delivery)?;
        self.events.schedule(event);
        Ok(())
    }

    /// Queues an object-state change for the next batch flush.
    pub fn queue_object_update(&mut self, kind: UpdateKind, object_id: u64, state: bool) {
        self.batches.push(kind, object_id, state);
    }

    /// Requests a loot lock on behalf of the host's own participant.
    pub fn request_lock_local(&mut self, resource_id: u64) -> Result<LockDecision, SessionError> {
        let me = self.transport.local_peer();
        self.decide_lock(resource_id, me)
    }

    /// Releases a lock held by `peer`, broadcasting the unlock on success.
    pub fn release_lock(&mut self, resource_id: u64, peer: PeerId) -> Result<bool, SessionError> {
        let released = self.locks.release(resource_id, peer);
        if released {
            let msg = Message::LootUnlock(LootUnlock { resource_id });
            let delivery = msg.delivery();
            self.transport.send_to_all(&msg, delivery)?;
        }
        Ok(released)
    }

    fn decide_lock(
        &mut self,
        resource_id: u64,
        requester: PeerId,
    ) -> Result<LockDecision, SessionError> {
        let now = self.clock.now();
        let transport = &self.transport;
        let decision = self
            .locks
            .request(resource_id, requester, now, |p| transport.is_connected(p));

        match decision {
            LockDecision::Granted | LockDecision::Refreshed => {
                let msg = Message::LootLockState(LootLockState {
                    resource_id,
                    granted: true,
                    holder: Some(requester.0),
                    denial: None,
                });
                let delivery = msg.delivery();
                self.transport.send_to_all(&msg, delivery)?;
                if let Some(hook) = self.callbacks.on_loot_lock_result.as_mut() {
                    hook(resource_id, true, Some(requester));
                }
            }
            LockDecision::Denied { holder } => {
                let msg = Message::LootLockState(LootLockState {
                    resource_id,
                    granted: false,
                    holder: Some(holder.0),
                    denial: Some(format!("already being looted by {holder}")),
                });
                let delivery = msg.delivery();
                // Denials only matter to the requester; replicas keep the
                // grant they already saw.
                if requester == self.transport.local_peer() {
                    if let Some(hook) = self.callbacks.on_loot_lock_result.as_mut() {
                        hook(resource_id, false, Some(holder));
                    }
                } else {
                    self.transport.send_to(requester, &msg, delivery)?;
                }
            }
        }
        Ok(decision)
    }

    /// Runs one host tick. `dt` is the elapsed time since the previous tick
    /// in seconds.
    pub fn tick(&mut self, dt: f64) -> Result<(), SessionError> {
        self.clock.advance(dt);
        let now = self.clock.now();

        // Inbound first, so this tick's decisions see fresh requests.
        let incoming = self.transport.drain();
        for (peer, msg) in incoming {
            match msg {
                Message::LootLockRequest(request) => {
                    // The sender's transport identity is authoritative, not
                    // the id embedded in the payload.
                    if request.requester != peer.0 {
                        tracing::warn!(
                            claimed = request.requester,
                            sender = %peer,
                            "lock request with mismatched requester id"
                        );
                    }
                    self.decide_lock(request.resource_id, peer)?;
                }
                Message::ReconnectState(state) => {
                    match restore_player(&mut self.registry, peer, &state) {
                        Ok(entity) => {
                            // Force a resync so every replica converges on
                            // the restored pose immediately.
                            if let Some(entry) = self.registry.get(entity) {
                                let snapshot = self.broadcaster.force(
                                    entity,
                                    &entry.pose,
                                    entry.velocity,
                                    now,
                                );
                                let msg = Message::PlayerSnapshot(snapshot);
                                let delivery = msg.delivery();
                                self.transport.send_to_all(&msg, delivery)?;
                                self.diagnostics.record_snapshot_sent();
                            }
                        }
                        Err(err) => {
                            tracing::warn!(peer = %peer, %err, "rejected reconnect state");
                        }
                    }
                }
                other => {
                    tracing::warn!(peer = %peer, ?other, "unexpected client message dropped");
                }
            }
        }

        // Authority: host-owned simulation stays enabled here.
        self.gate.enforce(&mut self.registry);

        // Reclaim expired and orphaned locks, announcing each unlock.
        let transport = &self.transport;
        let freed = self.locks.sweep(now, |p| transport.is_connected(p));
        for resource_id in freed {
            let msg = Message::LootUnlock(LootUnlock { resource_id });
            let delivery = msg.delivery();
            self.transport.send_to_all(&msg, delivery)?;
        }

        // Interest is recomputed from scratch every tick.
        self.interest.rebuild(self.registry.iter());

        // Delta-compressed snapshot pass on its own cadence.
        if self.broadcaster.pass_due(dt) {
            for outgoing in self.collect_snapshots(now) {
                let msg = Message::PlayerSnapshot(outgoing.snapshot);
                let delivery = msg.delivery();
                match outgoing.target {
                    BroadcastTarget::All => {
                        self.transport.send_to_all(&msg, delivery)?;
                    }
                    BroadcastTarget::One(peer) => {
                        self.transport.send_to(peer, &msg, delivery)?;
                    }
                }
                self.diagnostics.record_snapshot_sent();
            }
        }

        // Batched object updates on their own cadence.
        if self.batches.flush_due(dt) {
            for batch in self.batches.flush() {
                let msg = Message::BatchUpdate(batch);
                let delivery = msg.delivery();
                self.transport.send_to_all(&msg, delivery)?;
            }
        }

        // The host replays its own events at the same stamped times.
        for due in self.events.drain_due(now) {
            self.diagnostics
                .record_event_played(due.skew, due.is_late(self.event_skew_warn));
            if let Some(hook) = self.callbacks.on_event_due.as_mut() {
                hook(&due);
            }
        }

        Ok(())
    }

    /// Walks the registry and produces this pass's snapshots: broadcasts
    /// for host-owned entities in active zones, unicast echo-backs for
    /// peer-owned avatars. Suppressed entities leave the broadcaster state
    /// untouched.
    fn collect_snapshots(&mut self, now: f64) -> Vec<OutgoingSnapshot> {
        let mut outgoing = Vec::new();
        let me = self.transport.local_peer();
        let candidates: Vec<(EntityId, Pose, Vec3, Authority)> = self
            .registry
            .iter()
            .map(|e| (e.id, e.pose, e.velocity, e.authority))
            .collect();

        for (entity, pose, velocity, authority) in candidates {
            if !self.interest.should_broadcast(pose.position) {
                continue;
            }
            let Some(snapshot) = self.broadcaster.consider(entity, &pose, velocity, now) else {
                self.diagnostics.record_snapshot_suppressed();
                continue;
            };
            let target = match authority {
                // Host-simulated entities and the host's own avatar are
                // public state.
                Authority::Host => BroadcastTarget::All,
                Authority::Peer(owner) if owner == me => BroadcastTarget::All,
                // The authoritative echo of a remote peer's avatar is
                // peer-specific.
                Authority::Peer(owner) => BroadcastTarget::One(owner),
            };
            outgoing.push(OutgoingSnapshot { snapshot, target });
        }
        outgoing
    }

    /// Current session time on the host clock.
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// The entity registry.
    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// Mutable access for the simulation layer to move entities.
    pub fn registry_mut(&mut self) -> &mut EntityRegistry {
        &mut self.registry
    }

    /// The authoritative lock table.
    pub fn locks(&self) -> &LootLockTable {
        &self.locks
    }

    /// A diagnostics snapshot.
    pub fn diagnostics(&self) -> SyncDiagnostics {
        self.diagnostics.snapshot()
    }
}

// ---------------------------------------------------------------------------
// ClientSession
// ---------------------------------------------------------------------------

/// The replica-rendering side of the session.
pub struct ClientSession<T: Transport> {
    transport: T,
    clock: SessionClock,
    registry: EntityRegistry,
    gate: AuthorityGate,
    buffers: HashMap<EntityId, InterpolationBuffer>,
    interp_config: InterpConfig,
    locks: LootLockTable,
    events: EventReplayQueue,
    shots: ShotBuffer,
    reconnect: ReconnectTracker,
    diagnostics: DiagnosticsTracker,
    /// Presentation hooks.
    pub callbacks: SessionCallbacks,
    event_skew_warn: f64,
    own_health: f32,
    own_max_health: f32,
    own_scene: String,
}

impl<T: Transport> ClientSession<T> {
    /// Creates a client session over the given transport.
    pub fn new(transport: T, tuning: SessionTuning) -> Self {
        Self {
            transport,
            clock: SessionClock::new(),
            registry: EntityRegistry::new(),
            gate: AuthorityGate::new(SessionMode::Client),
            buffers: HashMap::new(),
            interp_config: tuning.interp.clone(),
            locks: LootLockTable::new(tuning.lock.clone()),
            events: EventReplayQueue::new(tuning.events.clone()),
            shots: ShotBuffer::new(tuning.prediction.clone()),
            reconnect: ReconnectTracker::new(tuning.reconnect.clone()),
            diagnostics: DiagnosticsTracker::new(tuning.diagnostics.clone()),
            callbacks: SessionCallbacks::default(),
            event_skew_warn: tuning.events.skew_warn,
            own_health: 0.0,
            own_max_health: 0.0,
            own_scene: String::new(),
        }
    }

    /// Registers a replica entity ahead of its first snapshot, with the
    /// correct role and owner. Entities that show up unannounced are
    /// auto-registered as host-owned replicas on first snapshot.
    pub fn register_replica(
        &mut self,
        id: EntityId,
        role: Role,
        authority: Authority,
    ) -> Result<(), SessionError> {
        let mut entry = EntityEntry::new(id, role, authority);
        entry.sim_enabled = false;
        self.registry.spawn(entry)?;
        Ok(())
    }

    /// Updates the vitals captured into reconnect snapshots.
    pub fn set_own_vitals(&mut self, health: f32, max_health: f32, scene: &str) {
        self.own_health = health;
        self.own_max_health = max_health;
        self.own_scene = scene.to_string();
    }

    /// Sends a loot lock request to the host.
    pub fn request_lock(&mut self, resource_id: u64) -> Result<(), SessionError> {
        let msg = Message::LootLockRequest(LootLockRequest {
            resource_id,
            requester: self.transport.local_peer().0,
        });
        let delivery = msg.delivery();
        self.transport.send_to(PeerId::HOST, &msg, delivery)?;
        Ok(())
    }

    /// Records a predicted shot (the caller plays the local effect) and
    /// returns its id for the host request.
    pub fn fire_shot(&mut self, muzzle: Vec3, direction: Vec3, weapon_type: u32) -> u32 {
        let now = self.clock.now();
        self.shots.fire(muzzle, direction, weapon_type, now)
    }

    /// Applies the host's verdict for a predicted shot.
    pub fn confirm_shot(
        &mut self,
        shot_id: u32,
        hit: bool,
        hit_point: Option<Vec3>,
    ) -> Option<ShotVerdict> {
        self.shots.confirm(shot_id, hit, hit_point)
    }

    /// Sends the stored recovery state to the host after a reconnect.
    /// Returns `false` when no snapshot has been captured yet.
    pub fn send_recovery_request(&mut self) -> Result<bool, SessionError> {
        let me = self.transport.local_peer();
        match self.reconnect.recovery_request(me) {
            Some(request) => {
                let msg = Message::ReconnectState(request);
                let delivery = msg.delivery();
                self.transport.send_to(PeerId::HOST, &msg, delivery)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Runs one client tick. `dt` is the elapsed time since the previous
    /// tick in seconds.
    pub fn tick(&mut self, dt: f64) -> Result<(), SessionError> {
        self.clock.advance(dt);
        let local_now = self.clock.now();

        let incoming = self.transport.drain();
        for (peer, msg) in incoming {
            match msg {
                Message::PlayerSnapshot(wire) => {
                    self.clock.observe_host_time(wire.host_time, local_now);
                    let entity = EntityId(wire.entity_id);
                    if self.registry.get(entity).is_none() {
                        tracing::debug!(%entity, "auto-registering replica for unannounced entity");
                        let mut entry =
                            EntityEntry::new(entity, Role::NonPlayerCharacter, Authority::Host);
                        entry.sim_enabled = false;
                        let _ = self.registry.spawn(entry);
                    }
                    let buffer = self
                        .buffers
                        .entry(entity)
                        .or_insert_with(|| InterpolationBuffer::new(self.interp_config.clone()));
                    let snapshot = Snapshot::from(&wire);
                    match buffer.receive(snapshot) {
                        Receive::Accepted => {
                            self.diagnostics.record_snapshot_accepted();
                            if let Some(hook) = self.callbacks.on_snapshot.as_mut() {
                                hook(entity, &snapshot);
                            }
                        }
                        Receive::Stale { .. } => {
                            self.diagnostics.record_stale_drop();
                        }
                    }
                }
                Message::AiEvent(event) => {
                    // The stamp time (play time minus the artificial delay)
                    // is the host-clock observation.
                    self.clock
                        .observe_host_time(event.play_at - event.delay as f64, local_now);
                    self.events.schedule(event);
                }
                Message::LootLockState(state) => {
                    let holder = state.holder.map(PeerId);
                    self.locks
                        .apply_state(state.resource_id, state.granted, holder, local_now);
                    if let Some(hook) = self.callbacks.on_loot_lock_result.as_mut() {
                        hook(state.resource_id, state.granted, holder);
                    }
                }
                Message::LootUnlock(unlock) => {
                    self.locks.apply_unlock(unlock.resource_id);
                }
                Message::BatchUpdate(batch) => {
                    if let Some(hook) = self.callbacks.on_batch_update.as_mut() {
                        for entry in &batch.entries {
                            hook(batch.kind, entry.object_id, entry.state);
                        }
                    }
                }
                other => {
                    tracing::warn!(peer = %peer, ?other, "unexpected host message dropped");
                }
            }
        }

        // Replica simulation stays off for host-owned entities.
        self.gate.enforce(&mut self.registry);

        // Events play against the host-adjusted clock.
        let host_now = self.clock.host_now();
        for due in self.events.drain_due(host_now) {
            self.diagnostics
                .record_event_played(due.skew, due.is_late(self.event_skew_warn));
            if let Some(hook) = self.callbacks.on_event_due.as_mut() {
                hook(&due);
            }
        }

        // Sample every replica at the delayed render time and move the
        // presented poses.
        let render_time = host_now - self.interp_config.back_time;
        for (entity, buffer) in self.buffers.iter_mut() {
            let Some(entry) = self.registry.get_mut(*entity) else {
                continue;
            };
            match buffer.step(render_time, &entry.pose) {
                Step::Idle => {}
                Step::Snapped(pose) => {
                    self.diagnostics.record_snap_teleport();
                    entry.pose = pose;
                }
                Step::Blended(pose) => {
                    entry.pose = pose;
                }
            }
        }

        // Housekeeping.
        self.shots.expire(local_now);
        if self.reconnect.capture_due(dt) {
            let me = self.transport.local_peer();
            if let Some(player) = self.registry.player_of(me) {
                let state = OwnState {
                    pose: player.pose,
                    health: self.own_health,
                    max_health: self.own_max_health,
                    scene: self.own_scene.clone(),
                    taken_at: local_now,
                };
                self.reconnect.capture(state);
            }
        }

        Ok(())
    }

    /// Current session time on the local clock.
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// The local estimate of the host clock.
    pub fn host_now(&self) -> f64 {
        self.clock.host_now()
    }

    /// The replica registry.
    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// Mutable access for the input/presentation layer.
    pub fn registry_mut(&mut self) -> &mut EntityRegistry {
        &mut self.registry
    }

    /// The mirrored lock table.
    pub fn locks(&self) -> &LootLockTable {
        &self.locks
    }

    /// A diagnostics snapshot.
    pub fn diagnostics(&self) -> SyncDiagnostics {
        self.diagnostics.snapshot()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;
    use roost_net::LoopbackHub;

    const HOST: PeerId = PeerId(0);
    const CLIENT: PeerId = PeerId(1);

    fn pair() -> (HostSession<roost_net::LoopbackTransport>, ClientSession<roost_net::LoopbackTransport>) {
        let hub = LoopbackHub::new();
        let host = HostSession::new(hub.register(HOST), SessionTuning::default());
        let client = ClientSession::new(hub.register(CLIENT), SessionTuning::default());
        (host, client)
    }

    #[test]
    fn test_npc_motion_reaches_client_buffer() {
        let (mut host, mut client) = pair();
        let npc = host.spawn_npc(Pose::IDENTITY).unwrap();

        // Move the NPC and run enough ticks for a broadcast pass.
        host.registry_mut().get_mut(npc).unwrap().pose.position = Vec3::new(3.0, 0.0, 0.0);
        host.tick(0.1).unwrap();
        client.tick(0.1).unwrap();

        assert_eq!(client.diagnostics().snapshots_accepted, 1);
        assert!(client.registry().get(npc).is_some(), "replica auto-registered");
    }

    #[test]
    fn test_lock_request_roundtrip_grants_and_mirrors() {
        let (mut host, mut client) = pair();
        host.spawn_player(CLIENT, Pose::IDENTITY).unwrap();

        client.request_lock(42).unwrap();
        host.tick(0.01).unwrap();
        client.tick(0.01).unwrap();

        assert_eq!(host.locks().holder(42), Some(CLIENT));
        assert_eq!(client.locks().holder(42), Some(CLIENT));
    }

    #[test]
    fn test_denied_lock_is_unicast_with_holder() {
        let hub = LoopbackHub::new();
        let mut host = HostSession::new(hub.register(HOST), SessionTuning::default());
        let mut alice = ClientSession::new(hub.register(PeerId(1)), SessionTuning::default());
        let mut bob = ClientSession::new(hub.register(PeerId(2)), SessionTuning::default());
        host.spawn_player(PeerId(1), Pose::IDENTITY).unwrap();
        host.spawn_player(PeerId(2), Pose::IDENTITY).unwrap();

        alice.request_lock(7).unwrap();
        host.tick(0.01).unwrap();
        alice.tick(0.01).unwrap();
        bob.tick(0.01).unwrap();

        let denied = std::rc::Rc::new(std::cell::RefCell::new(None));
        let denied_clone = denied.clone();
        bob.callbacks.on_loot_lock_result = Some(Box::new(move |resource, granted, holder| {
            *denied_clone.borrow_mut() = Some((resource, granted, holder));
        }));

        bob.request_lock(7).unwrap();
        host.tick(0.01).unwrap();
        bob.tick(0.01).unwrap();

        assert_eq!(
            *denied.borrow(),
            Some((7, false, Some(PeerId(1)))),
            "bob hears the denial naming alice"
        );
        // Bob's mirror still shows alice as holder.
        assert_eq!(bob.locks().holder(7), Some(PeerId(1)));
    }

    #[test]
    fn test_event_broadcast_plays_on_both_sides() {
        let (mut host, mut client) = pair();

        let host_events = std::rc::Rc::new(std::cell::RefCell::new(0));
        let hc = host_events.clone();
        host.callbacks.on_event_due = Some(Box::new(move |_| *hc.borrow_mut() += 1));

        let client_events = std::rc::Rc::new(std::cell::RefCell::new(0));
        let cc = client_events.clone();
        client.callbacks.on_event_due = Some(Box::new(move |_| *cc.borrow_mut() += 1));

        let npc = host.spawn_npc(Pose::IDENTITY).unwrap();
        host.broadcast_event(npc, EventKind::AttackStart, Vec3::ZERO, 0.0, Vec::new())
            .unwrap();

        host.tick(0.02).unwrap();
        client.tick(0.02).unwrap();

        assert_eq!(*host_events.borrow(), 1);
        assert_eq!(*client_events.borrow(), 1);
    }

    #[test]
    fn test_batched_updates_reach_client_callback() {
        let (mut host, mut client) = pair();

        let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        client.callbacks.on_batch_update = Some(Box::new(move |kind, id, state| {
            seen_clone.borrow_mut().push((kind, id, state));
        }));

        host.queue_object_update(UpdateKind::Door, 11, true);
        host.queue_object_update(UpdateKind::Door, 12, false);
        host.tick(0.1).unwrap();
        client.tick(0.1).unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![(UpdateKind::Door, 11, true), (UpdateKind::Door, 12, false)]
        );
    }

    #[test]
    fn test_reconnect_state_restores_pose_on_host() {
        let (mut host, mut client) = pair();
        let player = host.spawn_player(CLIENT, Pose::IDENTITY).unwrap();
        client
            .register_replica(player, Role::Player, Authority::Peer(CLIENT))
            .unwrap();
        client.set_own_vitals(60.0, 100.0, "hideout");

        // Give the client a pose and let the 5s capture fire.
        client.registry_mut().get_mut(player).unwrap().pose =
            Pose::new(Vec3::new(8.0, 0.0, 2.0), Quat::IDENTITY);
        client.tick(5.1).unwrap();
        assert!(client.send_recovery_request().unwrap());

        host.tick(0.01).unwrap();
        let pose = host.registry().get(player).unwrap().pose;
        assert!((pose.position - Vec3::new(8.0, 0.0, 2.0)).length() < 0.02);
    }

    #[test]
    fn test_peer_owned_snapshot_is_echoed_to_owner_only() {
        let hub = LoopbackHub::new();
        let mut host = HostSession::new(hub.register(HOST), SessionTuning::default());
        let mut owner = ClientSession::new(hub.register(PeerId(1)), SessionTuning::default());
        let mut other = ClientSession::new(hub.register(PeerId(2)), SessionTuning::default());

        let avatar = host.spawn_player(PeerId(1), Pose::IDENTITY).unwrap();
        host.registry_mut().get_mut(avatar).unwrap().pose.position = Vec3::new(1.0, 0.0, 0.0);
        host.tick(0.1).unwrap();
        owner.tick(0.1).unwrap();
        other.tick(0.1).unwrap();

        assert_eq!(owner.diagnostics().snapshots_accepted, 1);
        assert_eq!(other.diagnostics().snapshots_accepted, 0);
    }
}
