//! The VST3 view of the plugin's parameters. Next to the plugin's own CLAP parameters this contains
//! one synthetic parameter for every MIDI controller on every channel when the plugin wants raw
//! MIDI, because VST3 hosts only send controller changes to plugins as parameter changes through
//! `IMidiMapping`.

use atomic_float::AtomicF64;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use vst3_sys::vst::{kRootUnitId, ParameterFlags};

use super::param_units::ParamUnits;
use super::util::PARAM_ID_MASK;
use crate::plugin::{ClapId, ParamInfo, PluginParams};

/// The first ID handed out to the synthetic MIDI controller parameters.
pub const MIDI_MAPPING_BASE_ID: u32 = 0xb0_0000;
/// The number of MIDI controllers mapped per channel.
pub const MIDI_CONTROLLER_COUNT: usize = 128;
/// The maximum number of MIDI channels that get mapped.
pub const MAX_MIDI_CHANNELS: usize = 16;

/// What a VST3 parameter stands for.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    /// One of the plugin's CLAP parameters.
    Clap(ParamInfo),
    /// A synthetic parameter for a MIDI controller. These are forwarded to the plugin as MIDI
    /// events by the process adapter.
    MidiController { channel: u8, controller: u8 },
}

/// A parameter as exposed to the VST3 host. The last normalized value the host or the plugin
/// reported is cached here so the host can query it without going through the plugin.
#[derive(Debug)]
pub struct Vst3Parameter {
    pub id: u32,
    pub unit_id: i32,
    pub kind: ParamKind,
    normalized_value: AtomicF64,
}

/// `ParameterInfo` as returned from `IEditController::getParameterInfo()`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterInfo {
    pub id: u32,
    pub title: String,
    pub short_title: String,
    pub units: String,
    pub step_count: i32,
    pub default_normalized_value: f64,
    pub unit_id: i32,
    pub flags: i32,
}

impl Vst3Parameter {
    pub fn from_clap(info: ParamInfo, unit_id: i32) -> Self {
        let mut param = Self {
            id: info.id & PARAM_ID_MASK,
            unit_id,
            kind: ParamKind::Clap(info),
            normalized_value: AtomicF64::new(0.0),
        };
        param.normalized_value = AtomicF64::new(param.default_normalized_value());

        param
    }

    pub fn midi_controller(id: u32, channel: u8, controller: u8) -> Self {
        Self {
            id,
            unit_id: kRootUnitId,
            kind: ParamKind::MidiController {
                channel,
                controller,
            },
            normalized_value: AtomicF64::new(0.0),
        }
    }

    pub fn is_midi_controller(&self) -> bool {
        matches!(self.kind, ParamKind::MidiController { .. })
    }

    /// The ID the plugin knows this parameter by, if this is one of the plugin's parameters.
    pub fn clap_id(&self) -> Option<ClapId> {
        match &self.kind {
            ParamKind::Clap(info) => Some(info.id),
            ParamKind::MidiController { .. } => None,
        }
    }

    pub fn title(&self) -> Cow<'_, str> {
        match &self.kind {
            ParamKind::Clap(info) => Cow::Borrowed(&info.name),
            ParamKind::MidiController {
                channel,
                controller,
            } => Cow::Owned(format!("MIDI Ch {} CC {}", channel + 1, controller)),
        }
    }

    /// The number of discrete steps, or 0 for continuous parameters.
    pub fn step_count(&self) -> i32 {
        match &self.kind {
            ParamKind::Clap(info) if info.is_stepped() => {
                (info.max_value - info.min_value).round().max(0.0) as i32
            }
            ParamKind::Clap(_) => 0,
            ParamKind::MidiController { .. } => 127,
        }
    }

    pub fn flags(&self) -> i32 {
        match &self.kind {
            ParamKind::Clap(info) => {
                let mut flags = 0;
                if info.is_automatable() {
                    flags |= ParameterFlags::kCanAutomate as i32;
                }
                if info.is_readonly() {
                    flags |= ParameterFlags::kIsReadOnly as i32;
                }
                if info.is_hidden() {
                    flags |= ParameterFlags::kIsHidden as i32;
                }
                if info.is_bypass() {
                    flags |= ParameterFlags::kIsBypass as i32;
                }

                flags
            }
            // These should not show up in the host's automation lanes as separate parameters
            ParamKind::MidiController { .. } => {
                ParameterFlags::kCanAutomate as i32 | ParameterFlags::kIsHidden as i32
            }
        }
    }

    pub fn default_normalized_value(&self) -> f64 {
        match &self.kind {
            ParamKind::Clap(info) => self.plain_to_normalized(info.default_value),
            ParamKind::MidiController { .. } => 0.0,
        }
    }

    pub fn info(&self) -> ParameterInfo {
        let title = self.title().into_owned();

        ParameterInfo {
            id: self.id,
            short_title: title.clone(),
            title,
            units: String::new(),
            step_count: self.step_count(),
            default_normalized_value: self.default_normalized_value(),
            unit_id: self.unit_id,
            flags: self.flags(),
        }
    }

    /// Convert a plain CLAP value to a normalized VST3 value.
    pub fn plain_to_normalized(&self, plain: f64) -> f64 {
        match &self.kind {
            ParamKind::Clap(info) => {
                let range = info.max_value - info.min_value;
                if range > 0.0 {
                    ((plain - info.min_value) / range).clamp(0.0, 1.0)
                } else {
                    0.0
                }
            }
            ParamKind::MidiController { .. } => (plain / 127.0).clamp(0.0, 1.0),
        }
    }

    /// Convert a normalized VST3 value to a plain CLAP value. Stepped parameters are rounded to the
    /// nearest step.
    pub fn normalized_to_plain(&self, normalized: f64) -> f64 {
        let normalized = normalized.clamp(0.0, 1.0);
        match &self.kind {
            ParamKind::Clap(info) => {
                let plain = info.min_value + normalized * (info.max_value - info.min_value);
                if info.is_stepped() {
                    plain.round()
                } else {
                    plain
                }
            }
            ParamKind::MidiController { .. } => (normalized * 127.0).round(),
        }
    }

    pub fn normalized_value(&self) -> f64 {
        self.normalized_value.load(Ordering::Relaxed)
    }

    pub fn set_normalized_value(&self, normalized: f64) {
        self.normalized_value
            .store(normalized.clamp(0.0, 1.0), Ordering::Relaxed);
    }
}

/// The synthetic parameter IDs for every `(channel, controller)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiMapping {
    ids: Vec<[u32; MIDI_CONTROLLER_COUNT]>,
    /// Whether `ids` is a contiguous range starting at [`MIDI_MAPPING_BASE_ID`], so lookups can be
    /// computed instead of read from the table.
    easy: bool,
}

impl MidiMapping {
    /// Look up the parameter ID for a controller. Returns `None` for channels or controllers that
    /// are out of range.
    pub fn lookup(&self, channel: usize, controller: usize) -> Option<u32> {
        if channel >= self.ids.len() || controller >= MIDI_CONTROLLER_COUNT {
            return None;
        }

        if self.easy {
            Some(MIDI_MAPPING_BASE_ID + (channel * MIDI_CONTROLLER_COUNT + controller) as u32)
        } else {
            Some(self.ids[channel][controller])
        }
    }

    pub fn num_channels(&self) -> usize {
        self.ids.len()
    }

    /// `false` if some synthetic IDs had to skip over the plugin's own IDs.
    pub fn is_easy(&self) -> bool {
        self.easy
    }
}

/// One generation of the parameter tree: the units, the parameters, and the MIDI mapping. A new
/// generation is built whenever the plugin's parameter layout changes, so IDs resolved against an
/// older generation simply won't be found anymore.
#[derive(Debug)]
pub struct ParamTable {
    units: ParamUnits,
    params: Vec<Vst3Parameter>,
    index_by_id: HashMap<u32, usize>,
    midi_mapping: Option<MidiMapping>,
}

impl Default for ParamTable {
    fn default() -> Self {
        Self {
            units: ParamUnits::new(),
            params: Vec::new(),
            index_by_id: HashMap::new(),
            midi_mapping: None,
        }
    }
}

impl ParamTable {
    /// Build the parameter table from the plugin's parameters. Parameters the plugin fails to
    /// describe are skipped. If `midi_channels` is set, then a synthetic parameter is added for
    /// every controller on every channel, up to 16 channels.
    pub fn build(params: Option<&dyn PluginParams>, midi_channels: Option<usize>) -> Self {
        let mut table = Self::default();

        if let Some(params) = params {
            for index in 0..params.count() {
                let info = match params.get_info(index) {
                    Some(info) => info,
                    None => {
                        bridge_warn!(
                            "The plugin could not describe parameter {}, skipping",
                            index
                        );
                        continue;
                    }
                };

                let clap_id = info.id;
                let unit_id = table.units.get_or_create_unit(&info.module);
                let param = Vst3Parameter::from_clap(info, unit_id);
                if let Some(value) = params.get_value(clap_id) {
                    param.set_normalized_value(param.plain_to_normalized(value));
                }

                table.push(param);
            }
        }

        if let Some(channels) = midi_channels {
            table.add_midi_mapping(channels.min(MAX_MIDI_CHANNELS));
        }

        table
    }

    fn push(&mut self, param: Vst3Parameter) {
        let index = self.params.len();
        if self.index_by_id.insert(param.id, index).is_some() {
            bridge_warn!("Duplicate parameter ID {:#x}, only the last one can be reached", param.id);
        }
        self.params.push(param);
    }

    fn add_midi_mapping(&mut self, channels: usize) {
        let mut ids = vec![[0u32; MIDI_CONTROLLER_COUNT]; channels];
        let mut easy = true;
        let mut next_id = MIDI_MAPPING_BASE_ID;
        for (channel, channel_ids) in ids.iter_mut().enumerate() {
            for (controller, id) in channel_ids.iter_mut().enumerate() {
                while self.index_by_id.contains_key(&next_id) {
                    easy = false;
                    next_id += 1;
                }

                *id = next_id;
                self.push(Vst3Parameter::midi_controller(
                    next_id,
                    channel as u8,
                    controller as u8,
                ));
                next_id += 1;
            }
        }

        if !easy {
            bridge_log!(
                "The plugin's parameter IDs overlap with the MIDI controller range, falling back \
                 to table lookups"
            );
        }

        self.midi_mapping = Some(MidiMapping { ids, easy });
    }

    pub fn units(&self) -> &ParamUnits {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vst3Parameter> {
        self.params.iter()
    }

    /// Get a parameter by its index, for `IEditController::getParameterInfo()`.
    pub fn by_index(&self, index: usize) -> Option<&Vst3Parameter> {
        self.params.get(index)
    }

    /// Get a parameter by its VST3 ID.
    pub fn get(&self, id: u32) -> Option<&Vst3Parameter> {
        self.index_by_id
            .get(&id)
            .and_then(|index| self.params.get(*index))
    }

    pub fn midi_mapping(&self) -> Option<&MidiMapping> {
        self.midi_mapping.as_ref()
    }
}
