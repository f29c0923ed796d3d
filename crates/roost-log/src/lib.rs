//! Structured logging for the roost session tools.
//!
//! Provides structured, span-based, filterable logging via the `tracing`
//! ecosystem. Supports console output with timestamps and module paths, plus
//! JSON file logging in debug builds for post-mortem analysis. Integrates
//! with the configuration system for runtime log level control.

use std::path::Path;

use roost_config::Config;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter: `info` everywhere, with the chatty per-packet targets
/// kept at `warn`.
const DEFAULT_FILTER: &str = "info,roost_net=warn";

/// Initialize the tracing subscriber.
///
/// Sets up structured logging with:
/// - Console output with timestamps, module paths, and severity levels
/// - JSON file logging in debug builds (optional)
/// - Environment-based filtering (respects RUST_LOG)
/// - Integration with the config system log_level setting
///
/// # Arguments
///
/// * `log_dir` - Optional directory for JSON log files (debug builds only)
/// * `debug_build` - Whether this is a debug build (enables file logging)
/// * `config` - Optional configuration to use for log level override
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let filter_str = match config {
        Some(config) if !config.debug.log_level.is_empty() => config.debug.log_level.clone(),
        _ => DEFAULT_FILTER.to_string(),
    };

    // RUST_LOG wins over everything when set.
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    // In debug builds, also log to a file for post-mortem analysis.
    if debug_build
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_dir.join("roost.log"))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        return;
    }

    subscriber.init();
}

/// Create an `EnvFilter` with the default filter string.
///
/// Useful for tests and for consistent default behavior.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_level() {
        let filter = default_env_filter();
        let filter_str = format!("{}", filter);
        assert!(filter_str.contains("roost_net=warn"));
        assert!(filter_str.contains("info"));
    }

    #[test]
    fn test_subsystem_filter() {
        let filter = EnvFilter::new("info,roost_sync=debug");
        let filter_str = format!("{}", filter);
        assert!(filter_str.contains("roost_sync=debug"));
        assert!(filter_str.contains("info"));
    }

    #[test]
    fn test_env_filter_parsing() {
        let valid_filters = [
            "info",
            "debug,roost_sync=trace",
            "warn,roost_net=debug,roost_sync=trace",
            "error",
        ];

        for filter_str in &valid_filters {
            let result = EnvFilter::try_from(*filter_str);
            assert!(result.is_ok(), "failed to parse filter: {}", filter_str);
        }
    }

    #[test]
    fn test_config_level_is_used() {
        let mut config = Config::default();
        config.debug.log_level = "trace".to_string();
        // The init path picks the config level when RUST_LOG is unset; here
        // we only check the string selection logic stays valid as a filter.
        let filter = EnvFilter::new(&config.debug.log_level);
        assert!(format!("{}", filter).contains("trace"));
    }

    #[test]
    fn test_file_logger_creation() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path();

        std::fs::create_dir_all(log_path).unwrap();
        let log_file_path = log_path.join("roost.log");
        assert_eq!(log_file_path.file_name().unwrap(), "roost.log");
    }
}
