//! Converts the plugin's CLAP audio and note ports to VST3 busses. Audio ports become audio busses
//! with a speaker arrangement derived from the port type. Note ports that accept MIDI or CLAP note
//! events become event busses.

use vst3_sys::vst::{kEmpty, kMono, kStereo, BusDirections, BusTypes, MediaTypes, SpeakerArrangement};

use crate::plugin::{AudioPortInfo, ClapPlugin};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Audio,
    Event,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusDirection {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusType {
    Main,
    Aux,
}

impl MediaType {
    pub fn from_vst3(media_type: i32) -> Option<Self> {
        match media_type {
            t if t == MediaTypes::kAudio as i32 => Some(MediaType::Audio),
            t if t == MediaTypes::kEvent as i32 => Some(MediaType::Event),
            _ => None,
        }
    }
}

impl BusDirection {
    pub fn from_vst3(direction: i32) -> Option<Self> {
        match direction {
            d if d == BusDirections::kInput as i32 => Some(BusDirection::Input),
            d if d == BusDirections::kOutput as i32 => Some(BusDirection::Output),
            _ => None,
        }
    }

    fn is_input(self) -> bool {
        self == BusDirection::Input
    }
}

impl BusType {
    pub fn as_vst3(self) -> i32 {
        match self {
            BusType::Main => BusTypes::kMain as i32,
            BusType::Aux => BusTypes::kAux as i32,
        }
    }
}

/// A VST3 bus. Audio busses have a speaker arrangement, event busses have a MIDI channel count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bus {
    pub name: String,
    pub media_type: MediaType,
    pub direction: BusDirection,
    pub bus_type: BusType,
    pub channel_count: i32,
    /// `kEmpty` for event busses.
    pub arrangement: SpeakerArrangement,
    pub active: bool,
}

/// Only mono and stereo ports have a VST3 counterpart. Anything else gets an empty arrangement.
pub fn speaker_arrangement_for_port(port: &AudioPortInfo) -> SpeakerArrangement {
    if port.is_mono() {
        kMono
    } else if port.is_stereo() {
        kStereo
    } else {
        kEmpty
    }
}

/// The number of MIDI channels for the note port at `index`, as hinted by the plugin. A missing
/// hint or a zero channel count falls back to `default_midi_channels`.
pub fn midi_channels_for_port(
    plugin: &dyn ClapPlugin,
    index: u32,
    default_midi_channels: u16,
) -> u16 {
    plugin
        .as_vst3()
        .map(|hints| hints.num_midi_channels(index))
        .filter(|channels| *channels > 0)
        .map_or(default_midi_channels, |channels| {
            channels.min(u16::MAX as u32) as u16
        })
}

/// All of the plugin's busses, indexed per media type and direction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusList {
    audio_inputs: Vec<Bus>,
    audio_outputs: Vec<Bus>,
    event_inputs: Vec<Bus>,
    event_outputs: Vec<Bus>,
}

impl BusList {
    /// Build the bus list from the plugin's ports. Ports the plugin cannot describe are skipped.
    /// Event busses get the channel count the plugin's VST3 hints give for their note port, or
    /// `default_midi_channels` without hints.
    pub fn build(plugin: &dyn ClapPlugin, default_midi_channels: u16) -> Self {
        let mut busses = Self::default();

        if let Some(audio_ports) = plugin.audio_ports() {
            for direction in [BusDirection::Input, BusDirection::Output] {
                for index in 0..audio_ports.count(direction.is_input()) {
                    let port = match audio_ports.get(index, direction.is_input()) {
                        Some(port) => port,
                        None => {
                            bridge_trace!("Skipping audio port {} ({:?})", index, direction);
                            continue;
                        }
                    };

                    let arrangement = speaker_arrangement_for_port(&port);
                    busses.list_mut(MediaType::Audio, direction).push(Bus {
                        bus_type: if port.is_main() {
                            BusType::Main
                        } else {
                            BusType::Aux
                        },
                        name: port.name,
                        media_type: MediaType::Audio,
                        direction,
                        channel_count: arrangement.count_ones() as i32,
                        arrangement,
                        active: true,
                    });
                }
            }
        }

        if let Some(note_ports) = plugin.note_ports() {
            for direction in [BusDirection::Input, BusDirection::Output] {
                for index in 0..note_ports.count(direction.is_input()) {
                    let port = match note_ports.get(index, direction.is_input()) {
                        Some(port) if port.supports_vst3_events() => port,
                        _ => {
                            bridge_trace!("Skipping note port {} ({:?})", index, direction);
                            continue;
                        }
                    };

                    busses.list_mut(MediaType::Event, direction).push(Bus {
                        name: port.name,
                        media_type: MediaType::Event,
                        direction,
                        bus_type: BusType::Main,
                        channel_count: midi_channels_for_port(
                            plugin,
                            index,
                            default_midi_channels,
                        ) as i32,
                        arrangement: kEmpty,
                        active: true,
                    });
                }
            }
        }

        busses
    }

    /// Copy the activation state of the busses in `previous` to the busses at the same positions
    /// in this list.
    pub fn carry_over_activation(&mut self, previous: &BusList) {
        for media_type in [MediaType::Audio, MediaType::Event] {
            for direction in [BusDirection::Input, BusDirection::Output] {
                for (bus, old_bus) in self
                    .list_mut(media_type, direction)
                    .iter_mut()
                    .zip(previous.list(media_type, direction))
                {
                    bus.active = old_bus.active;
                }
            }
        }
    }

    pub fn list(&self, media_type: MediaType, direction: BusDirection) -> &[Bus] {
        match (media_type, direction) {
            (MediaType::Audio, BusDirection::Input) => &self.audio_inputs,
            (MediaType::Audio, BusDirection::Output) => &self.audio_outputs,
            (MediaType::Event, BusDirection::Input) => &self.event_inputs,
            (MediaType::Event, BusDirection::Output) => &self.event_outputs,
        }
    }

    fn list_mut(&mut self, media_type: MediaType, direction: BusDirection) -> &mut Vec<Bus> {
        match (media_type, direction) {
            (MediaType::Audio, BusDirection::Input) => &mut self.audio_inputs,
            (MediaType::Audio, BusDirection::Output) => &mut self.audio_outputs,
            (MediaType::Event, BusDirection::Input) => &mut self.event_inputs,
            (MediaType::Event, BusDirection::Output) => &mut self.event_outputs,
        }
    }

    pub fn count(&self, media_type: MediaType, direction: BusDirection) -> usize {
        self.list(media_type, direction).len()
    }

    pub fn get(&self, media_type: MediaType, direction: BusDirection, index: usize) -> Option<&Bus> {
        self.list(media_type, direction).get(index)
    }

    /// Change a bus' activation state. Returns `false` if the bus does not exist.
    pub fn set_active(
        &mut self,
        media_type: MediaType,
        direction: BusDirection,
        index: usize,
        active: bool,
    ) -> bool {
        match self.list_mut(media_type, direction).get_mut(index) {
            Some(bus) => {
                bus.active = active;
                true
            }
            None => false,
        }
    }

    /// The channel counts of the audio busses in one direction, for the process adapter.
    pub fn audio_channel_counts(&self, direction: BusDirection) -> Vec<u32> {
        self.list(MediaType::Audio, direction)
            .iter()
            .map(|bus| bus.channel_count as u32)
            .collect()
    }

    /// Check a host proposed arrangement against ours. Only the exact arrangements we reported are
    /// accepted, since the plugin's ports can't be reconfigured from here.
    pub fn accepts_arrangements(
        &self,
        inputs: &[SpeakerArrangement],
        outputs: &[SpeakerArrangement],
    ) -> bool {
        let matches = |busses: &[Bus], proposed: &[SpeakerArrangement]| {
            busses.len() == proposed.len()
                && busses
                    .iter()
                    .zip(proposed)
                    .all(|(bus, arrangement)| bus.arrangement == *arrangement)
        };

        matches(&self.audio_inputs, inputs) && matches(&self.audio_outputs, outputs)
    }
}

/// Whether any of the plugin's input note ports accepts raw MIDI. Only then do we need to map MIDI
/// controllers to parameters.
pub fn wants_midi_input(plugin: &dyn ClapPlugin) -> bool {
    let note_ports = match plugin.note_ports() {
        Some(note_ports) => note_ports,
        None => return false,
    };

    (0..note_ports.count(true))
        .filter_map(|index| note_ports.get(index, true))
        .any(|port| port.supports_midi())
}
