//! Time-ordered replay of discrete AI events.
//!
//! Discrete occurrences (attacks, deaths, drops) are not interpolated; they
//! are stamped by the host with the clock time they should play at and
//! broadcast reliably the moment they occur. Both sides queue them by that
//! embedded timestamp, so arrival order and transport jitter never change
//! playback order. Events that turn out late are still played; the skew is
//! measured and reported rather than the event being dropped.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use glam::Vec3;
use roost_net::{AiEvent, EventKind};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Tuning for event replay.
#[derive(Debug, Clone)]
pub struct EventConfig {
    /// Skew in seconds beyond which a late event is reported.
    pub skew_warn: f64,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self { skew_warn: 0.080 }
    }
}

// ---------------------------------------------------------------------------
// Queue entries
// ---------------------------------------------------------------------------

/// An event that just became due, with the skew observed at pop time.
#[derive(Debug, Clone, PartialEq)]
pub struct DueEvent {
    /// The event to play.
    pub event: AiEvent,
    /// `now - play_at` at the moment the event was popped. Positive means
    /// the event is playing late.
    pub skew: f64,
}

impl DueEvent {
    /// Whether the observed skew exceeds the given threshold.
    pub fn is_late(&self, threshold: f64) -> bool {
        self.skew > threshold
    }
}

/// Heap entry ordering: earliest play time first, ties broken by arrival.
#[derive(Debug, Clone)]
struct QueuedEvent {
    event: AiEvent,
    arrival: u64,
}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.event.play_at == other.event.play_at && self.arrival == other.arrival
    }
}

impl Eq for QueuedEvent {}

impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap on (play_at, arrival).
        other
            .event
            .play_at
            .total_cmp(&self.event.play_at)
            .then_with(|| other.arrival.cmp(&self.arrival))
    }
}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ---------------------------------------------------------------------------
// EventReplayQueue
// ---------------------------------------------------------------------------

/// Priority queue of events keyed by scheduled play time.
#[derive(Debug)]
pub struct EventReplayQueue {
    config: EventConfig,
    heap: BinaryHeap<QueuedEvent>,
    next_arrival: u64,
}

impl EventReplayQueue {
    /// Creates an empty queue with the given tuning.
    pub fn new(config: EventConfig) -> Self {
        Self {
            config,
            heap: BinaryHeap::new(),
            next_arrival: 0,
        }
    }

    /// Stamps a new event for broadcast: it plays at `host_now + delay`.
    /// The host calls this at the moment the event occurs.
    pub fn stamp(
        entity_id: u64,
        kind: EventKind,
        position: Vec3,
        host_now: f64,
        delay: f32,
        payload: Vec<u8>,
    ) -> AiEvent {
        AiEvent {
            entity_id,
            kind,
            position: position.into(),
            play_at: host_now + delay as f64,
            delay,
            payload,
        }
    }

    /// Enqueues an event, keyed by its embedded play time (never by arrival
    /// time). Events are immutable once enqueued.
    pub fn schedule(&mut self, event: AiEvent) {
        let arrival = self.next_arrival;
        self.next_arrival += 1;
        self.heap.push(QueuedEvent { event, arrival });
    }

    /// Pops and returns every event whose play time is at or before `now`,
    /// in ascending play-time order (arrival order on ties). Late events are
    /// returned with their measured skew and reported, never dropped.
    pub fn drain_due(&mut self, now: f64) -> Vec<DueEvent> {
        let mut due = Vec::new();
        while let Some(queued) = self.heap.peek() {
            if queued.event.play_at > now {
                break;
            }
            let queued = self.heap.pop().expect("peeked entry exists");
            let skew = now - queued.event.play_at;
            if skew > self.config.skew_warn {
                tracing::warn!(
                    entity_id = queued.event.entity_id,
                    kind = ?queued.event.kind,
                    skew_ms = skew * 1000.0,
                    "event playing late"
                );
            }
            due.push(DueEvent {
                event: queued.event,
                skew,
            });
        }
        due
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether no events are pending.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl Default for EventReplayQueue {
    fn default() -> Self {
        Self::new(EventConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
