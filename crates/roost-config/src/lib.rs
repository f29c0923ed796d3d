//! Configuration for the roost session tools.
//!
//! Provides runtime-configurable settings that persist to disk as RON files.
//! Supports CLI overrides via clap, hot-reload detection, and forward/backward
//! compatible serialization.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    BroadcastTuning, Config, DebugConfig, EventTuning, InterpTuning, LockTuning, SessionConfig,
    ZoneTuning,
};
pub use error::ConfigError;
