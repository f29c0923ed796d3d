//! Batched boolean object-state updates.
//!
//! Doors, destructibles, and lootbox lids change rarely and only between
//! two states, so individual messages would be mostly header. The host
//! queues changes as they happen and flushes them every batch interval,
//! grouped by kind, over the reliable-sequenced class.

use std::collections::VecDeque;

use roost_net::{BatchEntry, BatchUpdate, UpdateKind};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Tuning for the batch queue.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Seconds between flushes.
    pub interval: f64,
    /// Maximum queued updates; the oldest is evicted first.
    pub capacity: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            interval: 0.100,
            capacity: 256,
        }
    }
}

// ---------------------------------------------------------------------------
// BatchQueue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct PendingUpdate {
    kind: UpdateKind,
    object_id: u64,
    state: bool,
}

/// Bounded queue of object-state changes flushed on a fixed cadence.
#[derive(Debug)]
pub struct BatchQueue {
    config: BatchConfig,
    accumulator: f64,
    pending: VecDeque<PendingUpdate>,
}

impl BatchQueue {
    /// Creates an empty queue with the given tuning.
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            accumulator: 0.0,
            pending: VecDeque::new(),
        }
    }

    /// Queues one state change, evicting the oldest entry when full.
    pub fn push(&mut self, kind: UpdateKind, object_id: u64, state: bool) {
        if self.pending.len() >= self.config.capacity {
            self.pending.pop_front();
        }
        self.pending.push_back(PendingUpdate {
            kind,
            object_id,
            state,
        });
    }

    /// Accumulates elapsed time; returns `true` when a flush is due.
    pub fn flush_due(&mut self, dt: f64) -> bool {
        self.accumulator += dt;
        if self.accumulator >= self.config.interval {
            self.accumulator -= self.config.interval;
            true
        } else {
            false
        }
    }

    /// Drains the queue into one [`BatchUpdate`] per kind, preserving the
    /// order changes were queued in within each kind.
    pub fn flush(&mut self) -> Vec<BatchUpdate> {
        if self.pending.is_empty() {
            return Vec::new();
        }

        let mut batches: Vec<BatchUpdate> = Vec::new();
        for update in self.pending.drain(..) {
            let entry = BatchEntry {
                object_id: update.object_id,
                state: update.state,
            };
            match batches.iter_mut().find(|b| b.kind == update.kind) {
                Some(batch) => batch.entries.push(entry),
                None => batches.push(BatchUpdate {
                    kind: update.kind,
                    entries: vec![entry],
                }),
            }
        }
        batches
    }

    /// Number of queued updates.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for BatchQueue {
    fn default() -> Self {
        Self::new(BatchConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_groups_by_kind_in_order() {
        let mut queue = BatchQueue::default();
        queue.push(UpdateKind::Door, 1, true);
        queue.push(UpdateKind::Destructible, 9, false);
        queue.push(UpdateKind::Door, 2, false);

        let batches = queue.flush();
        assert_eq!(batches.len(), 2);

        let doors = batches.iter().find(|b| b.kind == UpdateKind::Door).unwrap();
        assert_eq!(
            doors.entries,
            vec![
                BatchEntry {
                    object_id: 1,
                    state: true
                },
                BatchEntry {
                    object_id: 2,
                    state: false
                },
            ]
        );
        assert!(queue.is_empty(), "flush drains the queue");
    }

    #[test]
    fn test_flush_with_nothing_pending_is_empty() {
        let mut queue = BatchQueue::default();
        assert!(queue.flush().is_empty());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut queue = BatchQueue::new(BatchConfig {
            capacity: 3,
            ..BatchConfig::default()
        });
        for id in 0..5 {
            queue.push(UpdateKind::Door, id, true);
        }
        assert_eq!(queue.len(), 3);
        let batches = queue.flush();
        let ids: Vec<u64> = batches[0].entries.iter().map(|e| e.object_id).collect();
        assert_eq!(ids, vec![2, 3, 4]);
    }

    #[test]
    fn test_flush_cadence() {
        let mut queue = BatchQueue::default();
        assert!(!queue.flush_due(0.05));
        assert!(queue.flush_due(0.06));
        assert!(!queue.flush_due(0.05));
    }
}
