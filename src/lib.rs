//! Run a CLAP plugin inside of a VST3 host. The [`Wrapper`][wrapper::vst3::Wrapper] owns the CLAP
//! plugin instance and translates between the VST3 host's view of the world and the plugin's:
//! lifecycle calls, busses, parameters and units, MIDI controller mappings, note expressions,
//! parameter edits made from the audio thread, and the timers and file descriptors CLAP plugins
//! use to get called back on the main thread.
//!
//! The COM entry points that expose a [`Wrapper`][wrapper::vst3::Wrapper] to a VST3 host should
//! call [`setup_logger()`][wrapper::setup_logger()] once before creating the first instance.

#[macro_use]
pub mod debug;

pub mod config;
pub mod host;
pub mod plugin;
pub mod util;
pub mod wrapper;

// Used by the logging macros
#[doc(hidden)]
pub use log;

pub use config::BridgeConfig;
pub use wrapper::vst3::{BridgeError, Wrapper};
