//! Real-time synchronization core for a peer-hosted co-op session: one host
//! runs the authoritative simulation, every other participant renders a
//! replica driven by host messages. This crate covers what makes that
//! replica correct and smooth over lossy transport: snapshot interpolation,
//! delta-compressed broadcasting, host-arbitrated loot locks, time-ordered
//! event replay, spatial interest gating, and authority enforcement.

pub mod authority;
pub mod batch;
pub mod broadcast;
pub mod clock;
pub mod diagnostics;
pub mod events;
pub mod interest;
pub mod interp;
pub mod loot_lock;
pub mod prediction;
pub mod reconnect;
pub mod registry;
pub mod session;

pub use authority::{AuthorityGate, GateReport, SessionMode};
pub use batch::{BatchConfig, BatchQueue};
pub use broadcast::{BroadcastConfig, BroadcastTarget, DeltaBroadcaster, OutgoingSnapshot};
pub use clock::SessionClock;
pub use diagnostics::{DiagnosticsConfig, DiagnosticsTracker, SyncDiagnostics};
pub use events::{DueEvent, EventConfig, EventReplayQueue};
pub use interest::{InterestGrid, ZoneConfig, ZoneId};
pub use interp::{InterpConfig, InterpolationBuffer, Receive, Snapshot, Step};
pub use loot_lock::{LockConfig, LockDecision, LootLock, LootLockTable};
pub use prediction::{PendingShot, PredictionConfig, ShotBuffer, ShotVerdict};
pub use reconnect::{OwnState, ReconnectConfig, ReconnectTracker, RestoreError, restore_player};
pub use registry::{
    Authority, EntityEntry, EntityId, EntityRegistry, Pose, RegistryError, Role,
};
pub use session::{
    ClientSession, HostSession, SessionCallbacks, SessionError, SessionTuning,
};
