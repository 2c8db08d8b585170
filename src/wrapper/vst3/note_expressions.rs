//! The note expressions the bridge advertises to the host through `INoteExpressionController`. We
//! only offer the predefined VST3 expression types, and only those the plugin asked for through
//! the `PluginAsVst3` hint extension. Translating the actual expression events to CLAP note
//! expression events is up to the process adapter.

use crate::plugin::SupportedNoteExpressions;

/// `kVolumeTypeID`.
pub const VOLUME_TYPE_ID: u32 = 0;
/// `kPanTypeID`.
pub const PAN_TYPE_ID: u32 = 1;
/// `kTuningTypeID`.
pub const TUNING_TYPE_ID: u32 = 2;
/// `kVibratoTypeID`.
pub const VIBRATO_TYPE_ID: u32 = 3;
/// `kExpressionTypeID`.
pub const EXPRESSION_TYPE_ID: u32 = 4;
/// `kBrightnessTypeID`.
pub const BRIGHTNESS_TYPE_ID: u32 = 5;

/// `NoteExpressionTypeInfo::kIsBipolar`, missing from vst3-sys.
pub const NOTE_EXPRESSION_IS_BIPOLAR: i32 = 1 << 0;

/// One entry in the note expression catalogue. Values are always normalized to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteExpressionType {
    pub type_id: u32,
    pub title: &'static str,
    pub short_title: &'static str,
    pub units: &'static str,
    pub default_value: f64,
    pub flags: i32,
}

/// The catalogue in the order it's exposed to the host. Pressure is handled through the MIDI
/// controller mapping and does not appear here.
const CATALOGUE: [(SupportedNoteExpressions, NoteExpressionType); 6] = [
    (
        SupportedNoteExpressions::VOLUME,
        NoteExpressionType {
            type_id: VOLUME_TYPE_ID,
            title: "Volume",
            short_title: "Vol",
            units: "",
            // VST3 volume expressions use a 4x gain scaling, so 0.25 is unity gain
            default_value: 0.25,
            flags: 0,
        },
    ),
    (
        SupportedNoteExpressions::PAN,
        NoteExpressionType {
            type_id: PAN_TYPE_ID,
            title: "Panorama",
            short_title: "Pan",
            units: "",
            default_value: 0.5,
            flags: NOTE_EXPRESSION_IS_BIPOLAR,
        },
    ),
    (
        SupportedNoteExpressions::TUNING,
        NoteExpressionType {
            type_id: TUNING_TYPE_ID,
            title: "Tuning",
            short_title: "Tun",
            units: "",
            default_value: 0.5,
            flags: NOTE_EXPRESSION_IS_BIPOLAR,
        },
    ),
    (
        SupportedNoteExpressions::VIBRATO,
        NoteExpressionType {
            type_id: VIBRATO_TYPE_ID,
            title: "Vibrato",
            short_title: "Vibr",
            units: "",
            default_value: 0.0,
            flags: 0,
        },
    ),
    (
        SupportedNoteExpressions::EXPRESSION,
        NoteExpressionType {
            type_id: EXPRESSION_TYPE_ID,
            title: "Expression",
            short_title: "Expr",
            units: "",
            default_value: 0.0,
            flags: 0,
        },
    ),
    (
        SupportedNoteExpressions::BRIGHTNESS,
        NoteExpressionType {
            type_id: BRIGHTNESS_TYPE_ID,
            title: "Brightness",
            short_title: "Brit",
            units: "",
            default_value: 0.0,
            flags: 0,
        },
    ),
];

/// The note expression types offered on event bus 0, channel 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteExpressions {
    types: Vec<NoteExpressionType>,
}

impl NoteExpressions {
    pub fn new(supported: SupportedNoteExpressions) -> Self {
        Self {
            types: CATALOGUE
                .iter()
                .filter(|(flag, _)| supported.contains(*flag))
                .map(|(_, expression)| *expression)
                .collect(),
        }
    }

    /// `INoteExpressionController::getNoteExpressionCount()`. Only the first bus and channel have
    /// note expressions.
    pub fn count(&self, bus_index: i32, channel: i16) -> usize {
        if bus_index == 0 && channel == 0 {
            self.types.len()
        } else {
            0
        }
    }

    /// `INoteExpressionController::getNoteExpressionInfo()`.
    pub fn info(&self, bus_index: i32, channel: i16, index: usize) -> Option<&NoteExpressionType> {
        if bus_index == 0 && channel == 0 {
            self.types.get(index)
        } else {
            None
        }
    }

    pub fn get(&self, type_id: u32) -> Option<&NoteExpressionType> {
        self.types.iter().find(|expression| expression.type_id == type_id)
    }

    /// `INoteExpressionController::getNoteExpressionStringByValue()`.
    pub fn string_by_value(&self, type_id: u32, value_normalized: f64) -> Option<String> {
        let expression = self.get(type_id)?;

        Some(format!(
            "{:.3}{}",
            value_normalized.clamp(0.0, 1.0),
            expression.units
        ))
    }

    /// `INoteExpressionController::getNoteExpressionValueByString()`.
    pub fn value_by_string(&self, type_id: u32, string: &str) -> Option<f64> {
        let expression = self.get(type_id)?;
        let string = string.trim();
        let string = string.strip_suffix(expression.units).unwrap_or(string).trim_end();

        string
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(|value| value.clamp(0.0, 1.0))
    }
}
