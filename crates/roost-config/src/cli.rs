//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Roost session command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug)]
#[command(name = "roost", about = "Peer-hosted co-op session core")]
pub struct CliArgs {
    /// Session port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Maximum participants including the host.
    #[arg(long)]
    pub max_peers: Option<u32>,

    /// Simulation tick rate in Hz.
    #[arg(long)]
    pub tick_rate: Option<u32>,

    /// Snapshot send interval in milliseconds.
    #[arg(long)]
    pub snapshot_interval_ms: Option<f64>,

    /// Interpolation back-time in milliseconds.
    #[arg(long)]
    pub back_time_ms: Option<f64>,

    /// Loot lock timeout in seconds.
    #[arg(long)]
    pub lock_timeout_secs: Option<f64>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(port) = args.port {
            self.session.port = port;
        }
        if let Some(max_peers) = args.max_peers {
            self.session.max_peers = max_peers;
        }
        if let Some(tick_rate) = args.tick_rate {
            self.session.tick_rate = tick_rate;
        }
        if let Some(interval) = args.snapshot_interval_ms {
            self.broadcast.interval_ms = interval;
        }
        if let Some(back_time) = args.back_time_ms {
            self.interp.back_time_ms = back_time;
        }
        if let Some(timeout) = args.lock_timeout_secs {
            self.lock.timeout_secs = timeout;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_args() -> CliArgs {
        CliArgs {
            port: None,
            max_peers: None,
            tick_rate: None,
            snapshot_interval_ms: None,
            back_time_ms: None,
            lock_timeout_secs: None,
            log_level: None,
            config: None,
        }
    }

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            port: Some(7777),
            lock_timeout_secs: Some(30.0),
            log_level: Some("debug".to_string()),
            ..no_args()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.session.port, 7777);
        assert_eq!(config.lock.timeout_secs, 30.0);
        assert_eq!(config.debug.log_level, "debug");
        // Non-overridden fields retain defaults.
        assert_eq!(config.session.max_peers, 8);
        assert_eq!(config.broadcast.interval_ms, 100.0);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&no_args());
        assert_eq!(config, original);
    }
}
