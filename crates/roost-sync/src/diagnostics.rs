//! Synchronization diagnostics: counters and skew tracking.
//!
//! Nothing in the core treats stale packets, teleports, or late events as
//! fatal, but all of them are worth seeing on an overlay or in logs. The
//! tracker accumulates lifetime counters plus a bounded window of observed
//! event skews and produces an immutable snapshot on demand.

use std::collections::VecDeque;

/// Configuration for the diagnostics tracker.
#[derive(Debug, Clone)]
pub struct DiagnosticsConfig {
    /// Number of skew samples kept in the rolling window. Default: 100.
    pub skew_window: usize,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self { skew_window: 100 }
    }
}

/// Accumulates synchronization counters over the session lifetime.
#[derive(Debug)]
pub struct DiagnosticsTracker {
    config: DiagnosticsConfig,
    snapshots_sent: u64,
    snapshots_suppressed: u64,
    snapshots_accepted: u64,
    stale_drops: u64,
    snap_teleports: u64,
    events_played: u64,
    late_events: u64,
    skew_samples: VecDeque<f64>,
    max_skew: f64,
}

impl DiagnosticsTracker {
    /// Creates a tracker with the given configuration.
    pub fn new(config: DiagnosticsConfig) -> Self {
        Self {
            config,
            snapshots_sent: 0,
            snapshots_suppressed: 0,
            snapshots_accepted: 0,
            stale_drops: 0,
            snap_teleports: 0,
            events_played: 0,
            late_events: 0,
            skew_samples: VecDeque::new(),
            max_skew: 0.0,
        }
    }

    /// Records a snapshot handed to the transport.
    pub fn record_snapshot_sent(&mut self) {
        self.snapshots_sent += 1;
    }

    /// Records a snapshot suppressed by the delta check.
    pub fn record_snapshot_suppressed(&mut self) {
        self.snapshots_suppressed += 1;
    }

    /// Records a snapshot accepted into an interpolation buffer.
    pub fn record_snapshot_accepted(&mut self) {
        self.snapshots_accepted += 1;
    }

    /// Records a stale or duplicate snapshot drop.
    pub fn record_stale_drop(&mut self) {
        self.stale_drops += 1;
    }

    /// Records a snap teleport (discontinuous repositioning).
    pub fn record_snap_teleport(&mut self) {
        self.snap_teleports += 1;
    }

    /// Records a played event and its skew. `late` marks skews past the
    /// configured warn threshold.
    pub fn record_event_played(&mut self, skew: f64, late: bool) {
        self.events_played += 1;
        if late {
            self.late_events += 1;
        }
        if self.skew_samples.len() >= self.config.skew_window {
            self.skew_samples.pop_front();
        }
        self.skew_samples.push_back(skew);
        if skew > self.max_skew {
            self.max_skew = skew;
        }
    }

    /// Mean skew over the rolling window, if any events played.
    pub fn average_skew(&self) -> Option<f64> {
        if self.skew_samples.is_empty() {
            return None;
        }
        Some(self.skew_samples.iter().sum::<f64>() / self.skew_samples.len() as f64)
    }

    /// Produces an immutable snapshot of current diagnostics.
    pub fn snapshot(&self) -> SyncDiagnostics {
        SyncDiagnostics {
            snapshots_sent: self.snapshots_sent,
            snapshots_suppressed: self.snapshots_suppressed,
            snapshots_accepted: self.snapshots_accepted,
            stale_drops: self.stale_drops,
            snap_teleports: self.snap_teleports,
            events_played: self.events_played,
            late_events: self.late_events,
            average_skew: self.average_skew(),
            max_skew: self.max_skew,
        }
    }
}

impl Default for DiagnosticsTracker {
    fn default() -> Self {
        Self::new(DiagnosticsConfig::default())
    }
}

/// Immutable snapshot of synchronization diagnostics, cheap to clone into
/// overlays or log lines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncDiagnostics {
    /// Snapshots handed to the transport.
    pub snapshots_sent: u64,
    /// Snapshots suppressed by the delta check.
    pub snapshots_suppressed: u64,
    /// Snapshots accepted into interpolation buffers.
    pub snapshots_accepted: u64,
    /// Stale or duplicate snapshots dropped.
    pub stale_drops: u64,
    /// Snap teleports performed.
    pub snap_teleports: u64,
    /// Events played.
    pub events_played: u64,
    /// Events that played later than the warn threshold.
    pub late_events: u64,
    /// Mean event skew over the rolling window.
    pub average_skew: Option<f64>,
    /// Largest event skew seen this session.
    pub max_skew: f64,
}
