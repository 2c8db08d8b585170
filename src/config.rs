//! Configuration for a bridge instance. This decides which plugin from a CLAP library gets wrapped
//! and tunes a couple of the wrapper's host-facing defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::wrapper::vst3::run_loop::MIN_TIMER_PERIOD_MS;

/// The number of MIDI channels exposed per event bus when the plugin doesn't tell us otherwise.
pub const DEFAULT_MIDI_CHANNELS: u16 = 16;

/// Settings for a single wrapped plugin. Every field has a sensible default, so an empty JSON
/// object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct BridgeConfig {
    /// The index of the plugin within the CLAP library's factory. Ignored when `plugin_id` is set.
    pub plugin_index: u32,
    /// The CLAP plugin ID to wrap. Takes precedence over `plugin_index`.
    pub plugin_id: Option<String>,
    /// The period of the idle handler registered with the host's run loop. Values below the timer
    /// floor are raised to it.
    pub idle_interval_ms: u32,
    /// The number of channels on each event bus when the plugin does not implement the VST3 hint
    /// extension.
    pub default_midi_channels: u16,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            plugin_index: 0,
            plugin_id: None,
            idle_interval_ms: MIN_TIMER_PERIOD_MS,
            default_midi_channels: DEFAULT_MIDI_CHANNELS,
        }
    }
}

impl BridgeConfig {
    /// Parse a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Could not parse the bridge configuration")
    }

    /// Read and parse a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Could not read '{}'", path.display()))?;

        Self::from_json_str(&json).with_context(|| format!("Invalid configuration in '{}'", path.display()))
    }

    /// The idle handler period after applying the timer floor.
    pub fn effective_idle_interval_ms(&self) -> u32 {
        self.idle_interval_ms.max(MIN_TIMER_PERIOD_MS)
    }
}
