//! Configuration structs with sensible defaults and RON persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Session settings.
    pub session: SessionConfig,
    /// Snapshot interpolation settings.
    pub interp: InterpTuning,
    /// Delta broadcast settings.
    pub broadcast: BroadcastTuning,
    /// Loot lock settings.
    pub lock: LockTuning,
    /// Event replay settings.
    pub events: EventTuning,
    /// Zone interest settings.
    pub zones: ZoneTuning,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Session-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Session port advertised to joining peers.
    pub port: u16,
    /// Maximum participants including the host.
    pub max_peers: u32,
    /// Simulation tick rate in Hz.
    pub tick_rate: u32,
}

/// Snapshot interpolation tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InterpTuning {
    /// Render delay in milliseconds.
    pub back_time_ms: f64,
    /// Snap threshold in world units.
    pub snap_distance: f32,
    /// Per-tick blend factor (0.0 - 1.0).
    pub blend_factor: f32,
    /// Dead-reckoning cap in milliseconds.
    pub max_extrapolation_ms: f64,
}

/// Delta broadcast tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BroadcastTuning {
    /// Milliseconds between snapshot passes.
    pub interval_ms: f64,
    /// Positional send threshold in world units.
    pub position_threshold: f32,
    /// Angular send threshold in degrees.
    pub rotation_threshold_deg: f32,
}

/// Loot lock tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LockTuning {
    /// Lock timeout in seconds.
    pub timeout_secs: f64,
}

/// Event replay tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EventTuning {
    /// Skew in milliseconds past which a late event is reported.
    pub skew_warn_ms: f64,
}

/// Zone interest tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ZoneTuning {
    /// Zone cell edge length in world units.
    pub cell_size: f32,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Print the diagnostics snapshot on session end.
    pub print_diagnostics: bool,
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port: 9050,
            max_peers: 8,
            tick_rate: 30,
        }
    }
}

impl Default for InterpTuning {
    fn default() -> Self {
        Self {
            back_time_ms: 150.0,
            snap_distance: 2.0,
            blend_factor: 0.9,
            max_extrapolation_ms: 500.0,
        }
    }
}

impl Default for BroadcastTuning {
    fn default() -> Self {
        Self {
            interval_ms: 100.0,
            position_threshold: 0.05,
            rotation_threshold_deg: 2.0,
        }
    }
}

impl Default for LockTuning {
    fn default() -> Self {
        Self { timeout_secs: 15.0 }
    }
}

impl Default for EventTuning {
    fn default() -> Self {
        Self { skew_warn_ms: 80.0 }
    }
}

impl Default for ZoneTuning {
    fn default() -> Self {
        Self { cell_size: 50.0 }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            print_diagnostics: false,
            log_level: "info".to_string(),
        }
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_carry_protocol_constants() {
        let config = Config::default();
        assert_eq!(config.interp.back_time_ms, 150.0);
        assert_eq!(config.broadcast.position_threshold, 0.05);
        assert_eq!(config.broadcast.rotation_threshold_deg, 2.0);
        assert_eq!(config.interp.snap_distance, 2.0);
        assert_eq!(config.lock.timeout_secs, 15.0);
        assert_eq!(config.events.skew_warn_ms, 80.0);
        assert_eq!(config.zones.cell_size, 50.0);
    }

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(!ron_str.is_empty());
        assert!(ron_str.contains("port: 9050"));
        assert!(ron_str.contains("timeout_secs: 15.0"));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let ron_str = ron::to_string(&config).unwrap();
        let deserialized: Config = ron::from_str(&ron_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_missing_section_uses_default() {
        // Config missing the `lock` section entirely.
        let ron_str = "(session: (), interp: (), broadcast: (), events: (), zones: (), debug: ())";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.lock, LockTuning::default());
    }

    #[test]
    fn test_extra_field_ignored() {
        let ron_str = "(future_setting: true)";
        let result: Result<Config, _> = ron::from_str(ron_str);
        assert!(result.is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.session.port = 7777;
        config.interp.back_time_ms = 200.0;

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.lock.timeout_secs = 30.0;
        modified.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert!(result.is_some());
        assert_eq!(result.unwrap().lock.timeout_secs, 30.0);
    }

    #[test]
    fn test_reload_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let result: Result<Config, _> = ron::from_str("{{not valid}}");
        assert!(result.is_err());
    }
}
