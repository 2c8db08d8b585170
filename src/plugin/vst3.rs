use bitflags::bitflags;

/// The ID of the extension a CLAP plugin can implement to give the VST3 wrapper some additional
/// hints.
pub const CLAP_PLUGIN_AS_VST3: &str = "clap.plugin-info-as-vst3/0";

bitflags! {
    /// The VST3 note expressions a plugin wants to receive. Pressure is not a note expression in
    /// the catalogue, it gets routed through the MIDI controller mapping instead.
    pub struct SupportedNoteExpressions: u32 {
        const VOLUME = 1 << 0;
        const PAN = 1 << 1;
        const TUNING = 1 << 2;
        const VIBRATO = 1 << 3;
        const EXPRESSION = 1 << 4;
        const BRIGHTNESS = 1 << 5;
        const PRESSURE = 1 << 6;
    }
}

impl Default for SupportedNoteExpressions {
    fn default() -> Self {
        Self::empty()
    }
}

/// Optional hints for the VST3 wrapper.
#[allow(unused_variables)]
pub trait PluginAsVst3: Send + Sync {
    /// The number of MIDI channels on the event bus for the note port at `note_port`.
    fn num_midi_channels(&self, note_port: u32) -> u32 {
        16
    }

    /// The note expressions this plugin supports.
    fn supported_note_expressions(&self) -> SupportedNoteExpressions {
        SupportedNoteExpressions::empty()
    }
}
