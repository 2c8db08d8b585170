//! The wrapped CLAP plugin as seen from the bridge. A plugin is a lifecycle object plus a set of
//! optional extensions, and every extension query may come back empty. The bridge in turn exposes
//! itself to the plugin through [`ClapHost`], the set of host callbacks a CLAP plugin may call.

use std::sync::Weak;

use crate::config::BridgeConfig;
use crate::wrapper::vst3::BridgeError;

pub mod clap;
pub mod vst3;

pub use self::clap::{
    AudioPortInfo, ClapId, NotePortInfo, ParamInfo, ParamRescanFlags, PluginAudioPorts,
    PluginGui, PluginLatency, PluginNotePorts, PluginParams, PluginPosixFdSupport, PluginState,
    PluginTail, PluginTimerSupport, PosixFdFlags,
};
pub use self::vst3::{PluginAsVst3, SupportedNoteExpressions};

/// A CLAP plugin instance. All functions take `&self` because a CLAP plugin may be called from the
/// main thread and the audio thread at the same time, and it's up to the implementation to uphold
/// the thread safety guarantees from the CLAP specification.
pub trait ClapPlugin: Send + Sync {
    /// Initialize the plugin. Returns `false` if the plugin refuses to initialize.
    fn init(&self) -> bool;
    /// Destroy the plugin. Called exactly once before the instance gets dropped.
    fn terminate(&self) {}

    /// Activate the plugin with the negotiated sample rate and block sizes.
    fn activate(&self, sample_rate: f64, min_frames_count: u32, max_frames_count: u32) -> bool;
    fn deactivate(&self);

    /// Called on the audio thread before the first process call after activation.
    fn start_processing(&self) -> bool;
    fn stop_processing(&self);

    /// Called on the main thread after the plugin requested a callback through
    /// [`ClapHost::request_callback()`].
    fn on_main_thread(&self);

    fn audio_ports(&self) -> Option<&dyn PluginAudioPorts> {
        None
    }
    fn note_ports(&self) -> Option<&dyn PluginNotePorts> {
        None
    }
    fn params(&self) -> Option<&dyn PluginParams> {
        None
    }
    fn latency(&self) -> Option<&dyn PluginLatency> {
        None
    }
    fn tail(&self) -> Option<&dyn PluginTail> {
        None
    }
    fn timer_support(&self) -> Option<&dyn PluginTimerSupport> {
        None
    }
    fn posix_fd_support(&self) -> Option<&dyn PluginPosixFdSupport> {
        None
    }
    fn state(&self) -> Option<&dyn PluginState> {
        None
    }
    fn gui(&self) -> Option<&dyn PluginGui> {
        None
    }
    /// The wrapper specific hints, see [`PluginAsVst3`].
    fn as_vst3(&self) -> Option<&dyn PluginAsVst3> {
        None
    }
}

/// Creates plugin instances from a loaded CLAP library.
pub trait PluginFactory: Send + Sync {
    /// Create the plugin selected by `config`. The plugin should store `host` and use it for all of
    /// its host callbacks. Returns `None` if no matching plugin exists.
    fn create_plugin(
        &self,
        config: &BridgeConfig,
        host: Weak<dyn ClapHost>,
    ) -> Option<Box<dyn ClapPlugin>>;
}

/// The host callbacks the bridge implements for the wrapped plugin. These correspond to the CLAP
/// host and host extension functions, translated to whatever the VST3 host understands.
pub trait ClapHost: Send + Sync {
    /// `clap_host_state::mark_dirty()`.
    fn mark_dirty(&self);
    /// `clap_host::request_callback()`. The callback happens during the next idle pass.
    fn request_callback(&self);
    /// `clap_host::request_restart()`.
    fn request_restart(&self);

    /// `clap_host_latency::changed()`.
    fn latency_changed(&self);
    /// `clap_host_tail::changed()`.
    fn tail_changed(&self);

    /// `clap_host_gui::request_resize()` and friends.
    fn gui_can_resize(&self) -> bool;
    fn gui_request_resize(&self, width: u32, height: u32) -> Result<(), BridgeError>;
    fn gui_request_show(&self) -> Result<(), BridgeError>;
    fn gui_request_hide(&self) -> Result<(), BridgeError>;

    /// `clap_host_params::rescan()`.
    fn param_rescan(&self, flags: ParamRescanFlags);
    /// `clap_host_params::clear()`.
    fn param_clear(&self, param_id: ClapId, flags: u32);
    /// `clap_host_params::request_flush()`. Safe to call from any thread.
    fn param_request_flush(&self);

    /// `clap_host_timer_support`. Returns the ID of the new timer.
    fn register_timer(&self, period_ms: u32) -> Result<ClapId, BridgeError>;
    fn unregister_timer(&self, timer_id: ClapId) -> Result<(), BridgeError>;

    /// `clap_host_posix_fd_support`.
    fn register_fd(&self, fd: i32, flags: PosixFdFlags) -> Result<(), BridgeError>;
    fn modify_fd(&self, fd: i32, flags: PosixFdFlags) -> Result<(), BridgeError>;
    fn unregister_fd(&self, fd: i32) -> Result<(), BridgeError>;
}
