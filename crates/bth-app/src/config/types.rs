//! Configuration types for the harness
//!
//! Defines:
//! - `Settings` - Global application settings
//! - Per-section settings structs

use bth_core::SafetyMode;
use serde::{Deserialize, Serialize};

/// Global settings from `.btharness/config.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub behavior: BehaviorSettings,
    pub log: LogSettings,
    pub sim: SimSettings,
}

/// Startup behavior
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct BehaviorSettings {
    /// Safety mode the harness starts in
    #[serde(default)]
    pub initial_mode: SafetyMode,
}

/// Message log settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LogSettings {
    /// Entries kept before the oldest are dropped
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Characters of a message shown in the "[log] received" notification
    #[serde(default = "default_notification_preview")]
    pub notification_preview: usize,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            notification_preview: default_notification_preview(),
        }
    }
}

fn default_max_entries() -> usize {
    500
}

fn default_notification_preview() -> usize {
    10
}

/// Simulated adapter used by the headless driver
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SimSettings {
    #[serde(default = "default_discovery_delay_ms")]
    pub discovery_delay_ms: u64,

    #[serde(default = "default_connect_delay_ms")]
    pub connect_delay_ms: u64,

    #[serde(default = "default_device_count")]
    pub device_count: usize,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            discovery_delay_ms: default_discovery_delay_ms(),
            connect_delay_ms: default_connect_delay_ms(),
            device_count: default_device_count(),
        }
    }
}

fn default_discovery_delay_ms() -> u64 {
    200
}

fn default_connect_delay_ms() -> u64 {
    100
}

fn default_device_count() -> usize {
    3
}
