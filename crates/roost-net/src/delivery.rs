//! Reliability classes and the message-to-class mapping.
//!
//! The transport below this crate offers four delivery guarantees. Each
//! message type is pinned to the cheapest class that keeps the session
//! correct: pose snapshots ride the unreliable class because the per-entity
//! sequence check makes stale arrivals harmless, while lock traffic and
//! irreversible events need ordered reliability.

use crate::messages::{EventKind, Message};

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// Transport reliability class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Delivery {
    /// May drop, duplicate, or reorder.
    Unreliable,
    /// May drop; never delivers older than the newest seen.
    SequencedUnreliable,
    /// Retransmitted until acknowledged; older arrivals are discarded.
    ReliableSequenced,
    /// Retransmitted until acknowledged; delivered in send order.
    ReliableOrdered,
}

impl EventKind {
    /// The reliability class an event of this kind is broadcast with.
    ///
    /// Attack starts, deaths, and item drops are irreversible and must not
    /// be lost or reordered; the remaining kinds are cosmetic enough that
    /// newest-wins sequencing suffices.
    pub fn delivery(self) -> Delivery {
        match self {
            EventKind::AttackStart | EventKind::Death | EventKind::ItemDrop => {
                Delivery::ReliableOrdered
            }
            EventKind::SkillCast | EventKind::Sound | EventKind::Effect => {
                Delivery::ReliableSequenced
            }
        }
    }
}

impl Message {
    /// The reliability class this message is sent with.
    pub fn delivery(&self) -> Delivery {
        match self {
            Message::PlayerSnapshot(_) => Delivery::Unreliable,
            Message::AiEvent(event) => event.kind.delivery(),
            Message::LootLockRequest(_)
            | Message::LootLockState(_)
            | Message::LootUnlock(_)
            | Message::ReconnectState(_) => Delivery::ReliableOrdered,
            Message::BatchUpdate(_) => Delivery::ReliableSequenced,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::*;
    use glam::{Quat, Vec3};

    #[test]
    fn test_snapshots_are_unreliable() {
        let msg = Message::PlayerSnapshot(PlayerSnapshot {
            entity_id: 1,
            sequence: 1,
            host_time: 0.0,
            position: Vec3::ZERO.into(),
            rotation: Quat::IDENTITY,
            velocity: Vec3::ZERO.into(),
        });
        assert_eq!(msg.delivery(), Delivery::Unreliable);
    }

    #[test]
    fn test_irreversible_events_are_reliable_ordered() {
        for kind in [EventKind::AttackStart, EventKind::Death, EventKind::ItemDrop] {
            assert_eq!(kind.delivery(), Delivery::ReliableOrdered, "{kind:?}");
        }
        for kind in [EventKind::SkillCast, EventKind::Sound, EventKind::Effect] {
            assert_eq!(kind.delivery(), Delivery::ReliableSequenced, "{kind:?}");
        }
    }

    #[test]
    fn test_event_message_delivery_follows_kind() {
        let event = |kind| {
            Message::AiEvent(AiEvent {
                entity_id: 1,
                kind,
                position: Vec3::ZERO.into(),
                play_at: 0.0,
                delay: 0.0,
                payload: Vec::new(),
            })
        };
        assert_eq!(
            event(EventKind::Death).delivery(),
            Delivery::ReliableOrdered
        );
        assert_eq!(
            event(EventKind::Sound).delivery(),
            Delivery::ReliableSequenced
        );
    }

    #[test]
    fn test_lock_traffic_is_reliable_ordered() {
        let msg = Message::LootUnlock(LootUnlock { resource_id: 9 });
        assert_eq!(msg.delivery(), Delivery::ReliableOrdered);
    }

    #[test]
    fn test_batches_are_reliable_sequenced() {
        let msg = Message::BatchUpdate(BatchUpdate {
            kind: UpdateKind::Door,
            entries: Vec::new(),
        });
        assert_eq!(msg.delivery(), Delivery::ReliableSequenced);
    }
}
