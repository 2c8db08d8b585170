//! The seam between the bridge and the code that converts VST3 process data to CLAP process data.
//! That conversion is done by a [`ProcessAdapter`], which the bridge creates on activation and
//! feeds every process call. Parameter gestures the plugin makes while processing go to the
//! adapter's [`ParamEditSink`].

use std::sync::Arc;

use super::busses::BusDirection;
use super::edit_queue::ParamEditSink;
use super::params::ParamTable;
use crate::plugin::ClapPlugin;

/// The sample rate and maximum block size set through `IAudioProcessor::setupProcessing()`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferConfig {
    pub sample_rate: f64,
    pub max_buffer_size: u32,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            max_buffer_size: 1024,
        }
    }
}

/// `ProcessSetup` as passed to `IAudioProcessor::setupProcessing()`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessingSetup {
    pub process_mode: i32,
    pub symbolic_sample_size: i32,
    pub max_samples_per_block: u32,
    pub sample_rate: f64,
}

/// Everything a process adapter needs to know about the current configuration.
#[derive(Clone)]
pub struct AdapterSetup {
    /// The channel count for every audio input bus.
    pub audio_inputs: Vec<u32>,
    /// The channel count for every audio output bus.
    pub audio_outputs: Vec<u32>,
    /// 0 for the temporary adapters used to flush parameters.
    pub max_block_size: u32,
    pub num_event_inputs: usize,
    pub num_event_outputs: usize,
    pub params: Arc<ParamTable>,
    pub edit_sink: Arc<dyn ParamEditSink>,
    /// Whether VST3 note expressions should be translated to CLAP note expressions.
    pub supports_note_expressions: bool,
    pub supports_tuning_expressions: bool,
}

/// Converts between VST3 and CLAP processing.
pub trait ProcessAdapter: Send {
    /// The host's process data, `ProcessData` for a real VST3 host.
    type ProcessData;

    /// Process a single block. Returns `false` if the plugin failed to process.
    fn process(&mut self, plugin: &dyn ClapPlugin, data: &mut Self::ProcessData) -> bool;

    /// Flush parameter changes without processing any audio.
    fn flush(&mut self, plugin: &dyn ClapPlugin);

    /// An audio bus was (de)activated by the host.
    fn activate_audio_bus(&mut self, direction: BusDirection, index: usize, active: bool);

    /// The parameter table got rebuilt after the plugin rescanned its parameters.
    #[allow(unused_variables)]
    fn update_parameters(&mut self, params: Arc<ParamTable>) {}
}

/// Creates [`ProcessAdapter`]s.
pub trait ProcessAdapterFactory: Send + Sync + 'static {
    type Adapter: ProcessAdapter + 'static;

    fn create(&self, setup: AdapterSetup) -> Self::Adapter;
}
