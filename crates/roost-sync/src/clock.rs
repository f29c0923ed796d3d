//! Session time: a tick-advanced local clock plus the client-side estimate
//! of the host's clock.
//!
//! All temporal effects in the core (interpolation delay, event scheduling,
//! lock timeouts) are comparisons against clock values, never blocking
//! waits. The embedder measures real elapsed time and feeds it in through
//! [`SessionClock::advance`], which keeps every component deterministic
//! under test. The host reads its own clock directly; a client folds every
//! host timestamp it sees into an exponentially weighted offset estimate
//! and uses `host_now` for render time and event playback.

/// Smoothing factor for the host-offset EWMA, the usual TCP-style RTT
/// weighting.
const OFFSET_ALPHA: f64 = 0.125;

/// Accumulated session clock with an optional host-offset estimate.
#[derive(Debug, Clone, Default)]
pub struct SessionClock {
    elapsed: f64,
    /// EWMA of `host_time - local_time` from observed host timestamps.
    host_offset: f64,
    /// Number of host timestamps folded into the offset so far.
    observations: u64,
}

impl SessionClock {
    /// Creates a clock at zero seconds with no host offset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the clock by one tick's worth of measured real time.
    pub fn advance(&mut self, dt: f64) {
        self.elapsed += dt;
    }

    /// Seconds since the session started.
    pub fn now(&self) -> f64 {
        self.elapsed
    }

    /// Folds a host timestamp observed at local time `local_now` into the
    /// offset estimate. The first observation seeds the estimate directly;
    /// later ones are blended so one delayed packet cannot yank the clock.
    pub fn observe_host_time(&mut self, host_time: f64, local_now: f64) {
        let sample = host_time - local_now;
        if self.observations == 0 {
            self.host_offset = sample;
        } else {
            self.host_offset = OFFSET_ALPHA * sample + (1.0 - OFFSET_ALPHA) * self.host_offset;
        }
        self.observations += 1;
    }

    /// The local-to-host-adjusted clock. On the host (no observations) this
    /// equals [`Self::now`].
    pub fn host_now(&self) -> f64 {
        self.elapsed + self.host_offset
    }

    /// Current offset estimate (`host_time - local_time`).
    pub fn host_offset(&self) -> f64 {
        self.host_offset
    }

    /// How many host timestamps have been observed.
    pub fn observations(&self) -> u64 {
        self.observations
    }
}
