//! Monitoring daemon for the vitalink wearable health device.
//!
//! This crate wraps [`vitalink_core`] in a runnable daemon: TOML
//! configuration with validation, a console notification sink, and a CLI
//! for running the monitor, inspecting the alert history, and managing
//! the config file.

pub mod config;
pub mod sink;

pub use config::{Config, ConfigError, ValidationError};
pub use sink::ConsoleSink;
