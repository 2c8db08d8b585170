//! The CLAP extensions the bridge knows how to translate. Each extension is a separate trait so a
//! plugin only implements what it actually supports. Descriptor getters return `None` for entries
//! the plugin could not describe, and the bridge skips those entries.

use bitflags::bitflags;
use clap_sys::ext::audio_ports::{CLAP_AUDIO_PORT_IS_MAIN, CLAP_PORT_MONO, CLAP_PORT_STEREO};
use clap_sys::ext::note_ports::{CLAP_NOTE_DIALECT_CLAP, CLAP_NOTE_DIALECT_MIDI};
use clap_sys::ext::params::{
    CLAP_PARAM_IS_AUTOMATABLE, CLAP_PARAM_IS_BYPASS, CLAP_PARAM_IS_HIDDEN,
    CLAP_PARAM_IS_READONLY, CLAP_PARAM_IS_STEPPED, CLAP_PARAM_RESCAN_ALL, CLAP_PARAM_RESCAN_INFO,
    CLAP_PARAM_RESCAN_TEXT, CLAP_PARAM_RESCAN_VALUES,
};
use clap_sys::ext::posix_fd_support::{CLAP_POSIX_FD_ERROR, CLAP_POSIX_FD_READ, CLAP_POSIX_FD_WRITE};
use std::io::{Read, Write};

/// A CLAP parameter, port, or timer ID.
pub type ClapId = clap_sys::id::clap_id;

bitflags! {
    /// The flags passed to `clap_host_params::rescan()`.
    pub struct ParamRescanFlags: u32 {
        const VALUES = CLAP_PARAM_RESCAN_VALUES;
        const TEXT = CLAP_PARAM_RESCAN_TEXT;
        const INFO = CLAP_PARAM_RESCAN_INFO;
        const ALL = CLAP_PARAM_RESCAN_ALL;
    }
}

bitflags! {
    /// The conditions a file descriptor is watched for.
    pub struct PosixFdFlags: u32 {
        const READ = CLAP_POSIX_FD_READ;
        const WRITE = CLAP_POSIX_FD_WRITE;
        const ERROR = CLAP_POSIX_FD_ERROR;
    }
}

/// `clap_audio_port_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPortInfo {
    pub id: ClapId,
    pub name: String,
    pub flags: u32,
    pub channel_count: u32,
    /// `CLAP_PORT_MONO`, `CLAP_PORT_STEREO`, or some other port type. `None` if the plugin didn't
    /// specify a type.
    pub port_type: Option<String>,
}

impl AudioPortInfo {
    pub fn is_main(&self) -> bool {
        self.flags & CLAP_AUDIO_PORT_IS_MAIN != 0
    }

    pub fn is_mono(&self) -> bool {
        self.port_type.as_deref().map(str::as_bytes) == Some(CLAP_PORT_MONO.to_bytes())
    }

    pub fn is_stereo(&self) -> bool {
        self.port_type.as_deref().map(str::as_bytes) == Some(CLAP_PORT_STEREO.to_bytes())
    }
}

/// `clap_note_port_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotePortInfo {
    pub id: ClapId,
    pub name: String,
    pub supported_dialects: u32,
    pub preferred_dialect: u32,
}

impl NotePortInfo {
    pub fn supports_midi(&self) -> bool {
        self.supported_dialects & CLAP_NOTE_DIALECT_MIDI != 0
    }

    /// Whether the port can be fed from a VST3 event bus. Both raw MIDI and CLAP note events can be
    /// synthesized from VST3 events.
    pub fn supports_vst3_events(&self) -> bool {
        self.supported_dialects & (CLAP_NOTE_DIALECT_MIDI | CLAP_NOTE_DIALECT_CLAP) != 0
    }
}

/// `clap_param_info`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamInfo {
    pub id: ClapId,
    pub flags: u32,
    pub name: String,
    /// A `/`-separated module path like `Oscillators/Osc 1`. Empty for the root.
    pub module: String,
    pub min_value: f64,
    pub max_value: f64,
    pub default_value: f64,
}

impl ParamInfo {
    pub fn is_stepped(&self) -> bool {
        self.flags & CLAP_PARAM_IS_STEPPED != 0
    }

    pub fn is_automatable(&self) -> bool {
        self.flags & CLAP_PARAM_IS_AUTOMATABLE != 0
    }

    pub fn is_readonly(&self) -> bool {
        self.flags & CLAP_PARAM_IS_READONLY != 0
    }

    pub fn is_hidden(&self) -> bool {
        self.flags & CLAP_PARAM_IS_HIDDEN != 0
    }

    pub fn is_bypass(&self) -> bool {
        self.flags & CLAP_PARAM_IS_BYPASS != 0
    }
}

/// `clap_plugin_audio_ports`.
pub trait PluginAudioPorts: Send + Sync {
    fn count(&self, is_input: bool) -> u32;
    fn get(&self, index: u32, is_input: bool) -> Option<AudioPortInfo>;
}

/// `clap_plugin_note_ports`.
pub trait PluginNotePorts: Send + Sync {
    fn count(&self, is_input: bool) -> u32;
    fn get(&self, index: u32, is_input: bool) -> Option<NotePortInfo>;
}

/// `clap_plugin_params`. Values are always in the parameter's plain range.
pub trait PluginParams: Send + Sync {
    fn count(&self) -> u32;
    fn get_info(&self, index: u32) -> Option<ParamInfo>;
    fn get_value(&self, param_id: ClapId) -> Option<f64>;
    fn value_to_text(&self, param_id: ClapId, value: f64) -> Option<String>;
    fn text_to_value(&self, param_id: ClapId, text: &str) -> Option<f64>;
}

/// `clap_plugin_latency`.
pub trait PluginLatency: Send + Sync {
    fn get(&self) -> u32;
}

/// `clap_plugin_tail`. A value of `i32::MAX` or above means an infinite tail.
pub trait PluginTail: Send + Sync {
    fn get(&self) -> u32;
}

/// `clap_plugin_timer_support`.
pub trait PluginTimerSupport: Send + Sync {
    fn on_timer(&self, timer_id: ClapId);
}

/// `clap_plugin_posix_fd_support`.
pub trait PluginPosixFdSupport: Send + Sync {
    fn on_fd(&self, fd: i32, flags: PosixFdFlags);
}

/// `clap_plugin_state`. The streams are passed through directly from the VST3 host.
pub trait PluginState: Send + Sync {
    fn save(&self, stream: &mut dyn Write) -> bool;
    fn load(&self, stream: &mut dyn Read) -> bool;
}

/// `clap_plugin_gui`. Embedding the actual window is up to the view implementation, the bridge
/// only needs to know whether there is a GUI and how it may be resized.
pub trait PluginGui: Send + Sync {
    fn get_size(&self) -> Option<(u32, u32)>;
    fn can_resize(&self) -> bool;
    fn set_size(&self, width: u32, height: u32) -> bool;
}
