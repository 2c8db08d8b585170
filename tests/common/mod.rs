//! Test doubles for both sides of the bridge: a configurable CLAP plugin, a recording VST3
//! component handler, a run loop, an editor view, and a process adapter.

#![allow(dead_code)]

use clap_sys::ext::audio_ports::CLAP_AUDIO_PORT_IS_MAIN;
use clap_sys::ext::note_ports::{CLAP_NOTE_DIALECT_CLAP, CLAP_NOTE_DIALECT_MIDI};
use clap_sys::ext::params::{CLAP_PARAM_IS_AUTOMATABLE, CLAP_PARAM_IS_STEPPED};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use clap_as_vst3::config::BridgeConfig;
use clap_as_vst3::host::{
    same_handler, ComponentHandler, ComponentHandler2, EventHandler, FileDescriptor, PlugView,
    RestartFlags, RunLoop, TimerHandler, ViewCallbacks, ViewFactory,
};
use clap_as_vst3::plugin::{
    AudioPortInfo, ClapHost, ClapId, ClapPlugin, NotePortInfo, ParamInfo, PluginAsVst3,
    PluginAudioPorts, PluginFactory, PluginGui, PluginLatency, PluginNotePorts, PluginParams,
    PluginPosixFdSupport, PluginState, PluginTail, PluginTimerSupport, PosixFdFlags,
    SupportedNoteExpressions,
};
use clap_as_vst3::wrapper::vst3::busses::BusDirection;
use clap_as_vst3::wrapper::vst3::edit_queue::ParamEditSink;
use clap_as_vst3::wrapper::vst3::params::ParamTable;
use clap_as_vst3::wrapper::vst3::{AdapterSetup, ProcessAdapter, ProcessAdapterFactory, Wrapper};

pub fn audio_port(name: &str, port_type: &str, is_main: bool) -> AudioPortInfo {
    AudioPortInfo {
        id: 0,
        name: name.to_owned(),
        flags: if is_main { CLAP_AUDIO_PORT_IS_MAIN } else { 0 },
        channel_count: if port_type == "mono" { 1 } else { 2 },
        port_type: Some(port_type.to_owned()),
    }
}

pub fn midi_port(name: &str) -> NotePortInfo {
    NotePortInfo {
        id: 0,
        name: name.to_owned(),
        supported_dialects: CLAP_NOTE_DIALECT_MIDI | CLAP_NOTE_DIALECT_CLAP,
        preferred_dialect: CLAP_NOTE_DIALECT_CLAP,
    }
}

pub fn clap_note_port(name: &str) -> NotePortInfo {
    NotePortInfo {
        id: 0,
        name: name.to_owned(),
        supported_dialects: CLAP_NOTE_DIALECT_CLAP,
        preferred_dialect: CLAP_NOTE_DIALECT_CLAP,
    }
}

pub fn param(id: ClapId, name: &str, module: &str, min: f64, max: f64, default: f64) -> ParamInfo {
    ParamInfo {
        id,
        flags: CLAP_PARAM_IS_AUTOMATABLE,
        name: name.to_owned(),
        module: module.to_owned(),
        min_value: min,
        max_value: max,
        default_value: default,
    }
}

pub fn stepped_param(id: ClapId, name: &str, steps: f64) -> ParamInfo {
    ParamInfo {
        flags: CLAP_PARAM_IS_AUTOMATABLE | CLAP_PARAM_IS_STEPPED,
        ..param(id, name, "", 0.0, steps, 0.0)
    }
}

/// Everything the mock plugin exposes and records. Shared between the plugin instance owned by the
/// bridge and the test.
#[derive(Default)]
pub struct MockState {
    pub audio_inputs: Mutex<Vec<Option<AudioPortInfo>>>,
    pub audio_outputs: Mutex<Vec<Option<AudioPortInfo>>>,
    pub note_inputs: Mutex<Vec<Option<NotePortInfo>>>,
    pub has_params: AtomicBool,
    pub params: Mutex<Vec<Option<ParamInfo>>>,
    pub values: Mutex<HashMap<ClapId, f64>>,
    pub hints: Mutex<Option<(u32, SupportedNoteExpressions)>>,
    /// Per note port channel counts that take precedence over the count in `hints`.
    pub port_midi_channels: Mutex<HashMap<u32, u32>>,
    pub latency: AtomicU32,
    pub tail: Mutex<Option<u32>>,
    pub has_gui: AtomicBool,
    pub has_state: AtomicBool,
    pub state: Mutex<Vec<u8>>,
    pub fail_init: AtomicBool,
    pub fail_activate: AtomicBool,
    pub fail_start_processing: AtomicBool,

    /// Lifecycle calls in the order they happened.
    pub calls: Mutex<Vec<String>>,
    pub timers_fired: Mutex<Vec<ClapId>>,
    pub fds_fired: Mutex<Vec<(i32, PosixFdFlags)>>,
    pub main_thread_callbacks: AtomicUsize,
    pub host: Mutex<Option<Weak<dyn ClapHost>>>,
}

impl MockState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A stereo effect with four parameters, two of which live in nested units.
    pub fn stereo_effect() -> Arc<Self> {
        let state = Self::new();
        state.set_audio_ports(
            vec![audio_port("Input", "stereo", true)],
            vec![audio_port("Output", "stereo", true)],
        );
        state.set_params(vec![
            param(1, "Gain", "/", -60.0, 12.0, 0.0),
            param(2, "Cutoff", "/Filter", 20.0, 20000.0, 1000.0),
            param(3, "Resonance", "/Filter", 0.0, 1.0, 0.5),
            param(4, "Fine", "/Filter/Cutoff", 0.0, 1.0, 0.5),
        ]);

        state
    }

    /// A synth with a MIDI input and a stereo output.
    pub fn midi_synth() -> Arc<Self> {
        let state = Self::new();
        state.set_audio_ports(Vec::new(), vec![audio_port("Output", "stereo", true)]);
        *state.note_inputs.lock() = vec![Some(midi_port("MIDI In"))];
        state.set_params(vec![param(1, "Volume", "", 0.0, 1.0, 0.8)]);

        state
    }

    pub fn set_audio_ports(&self, inputs: Vec<AudioPortInfo>, outputs: Vec<AudioPortInfo>) {
        *self.audio_inputs.lock() = inputs.into_iter().map(Some).collect();
        *self.audio_outputs.lock() = outputs.into_iter().map(Some).collect();
    }

    pub fn set_params(&self, params: Vec<ParamInfo>) {
        self.has_params.store(true, Ordering::SeqCst);
        *self.params.lock() = params.into_iter().map(Some).collect();
    }

    pub fn host(&self) -> Arc<dyn ClapHost> {
        self.host
            .lock()
            .as_ref()
            .and_then(Weak::upgrade)
            .expect("The plugin has no host")
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count_calls(&self, name: &str) -> usize {
        self.calls.lock().iter().filter(|call| call.as_str() == name).count()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }
}

pub struct MockPlugin {
    state: Arc<MockState>,
}

impl ClapPlugin for MockPlugin {
    fn init(&self) -> bool {
        self.state.record("init");
        !self.state.fail_init.load(Ordering::SeqCst)
    }

    fn terminate(&self) {
        self.state.record("terminate");
    }

    fn activate(&self, sample_rate: f64, min_frames_count: u32, max_frames_count: u32) -> bool {
        self.state.record(format!(
            "activate {} {} {}",
            sample_rate, min_frames_count, max_frames_count
        ));
        !self.state.fail_activate.load(Ordering::SeqCst)
    }

    fn deactivate(&self) {
        self.state.record("deactivate");
    }

    fn start_processing(&self) -> bool {
        self.state.record("start_processing");
        !self.state.fail_start_processing.load(Ordering::SeqCst)
    }

    fn stop_processing(&self) {
        self.state.record("stop_processing");
    }

    fn on_main_thread(&self) {
        self.state.main_thread_callbacks.fetch_add(1, Ordering::SeqCst);
    }

    fn audio_ports(&self) -> Option<&dyn PluginAudioPorts> {
        let has_ports = !self.state.audio_inputs.lock().is_empty()
            || !self.state.audio_outputs.lock().is_empty();
        if has_ports {
            Some(self)
        } else {
            None
        }
    }

    fn note_ports(&self) -> Option<&dyn PluginNotePorts> {
        if self.state.note_inputs.lock().is_empty() {
            None
        } else {
            Some(self)
        }
    }

    fn params(&self) -> Option<&dyn PluginParams> {
        if self.state.has_params.load(Ordering::SeqCst) {
            Some(self)
        } else {
            None
        }
    }

    fn latency(&self) -> Option<&dyn PluginLatency> {
        Some(self)
    }

    fn tail(&self) -> Option<&dyn PluginTail> {
        if self.state.tail.lock().is_some() {
            Some(self)
        } else {
            None
        }
    }

    fn timer_support(&self) -> Option<&dyn PluginTimerSupport> {
        Some(self)
    }

    fn posix_fd_support(&self) -> Option<&dyn PluginPosixFdSupport> {
        Some(self)
    }

    fn state(&self) -> Option<&dyn PluginState> {
        if self.state.has_state.load(Ordering::SeqCst) {
            Some(self)
        } else {
            None
        }
    }

    fn gui(&self) -> Option<&dyn PluginGui> {
        if self.state.has_gui.load(Ordering::SeqCst) {
            Some(self)
        } else {
            None
        }
    }

    fn as_vst3(&self) -> Option<&dyn PluginAsVst3> {
        if self.state.hints.lock().is_some() {
            Some(self)
        } else {
            None
        }
    }
}

impl PluginAudioPorts for MockPlugin {
    fn count(&self, is_input: bool) -> u32 {
        if is_input {
            self.state.audio_inputs.lock().len() as u32
        } else {
            self.state.audio_outputs.lock().len() as u32
        }
    }

    fn get(&self, index: u32, is_input: bool) -> Option<AudioPortInfo> {
        let ports = if is_input {
            self.state.audio_inputs.lock()
        } else {
            self.state.audio_outputs.lock()
        };

        ports.get(index as usize).cloned().flatten()
    }
}

impl PluginNotePorts for MockPlugin {
    fn count(&self, is_input: bool) -> u32 {
        if is_input {
            self.state.note_inputs.lock().len() as u32
        } else {
            0
        }
    }

    fn get(&self, index: u32, is_input: bool) -> Option<NotePortInfo> {
        if is_input {
            self.state.note_inputs.lock().get(index as usize).cloned().flatten()
        } else {
            None
        }
    }
}

impl PluginParams for MockPlugin {
    fn count(&self) -> u32 {
        self.state.params.lock().len() as u32
    }

    fn get_info(&self, index: u32) -> Option<ParamInfo> {
        self.state.params.lock().get(index as usize).cloned().flatten()
    }

    fn get_value(&self, param_id: ClapId) -> Option<f64> {
        self.state.values.lock().get(&param_id).copied()
    }

    fn value_to_text(&self, param_id: ClapId, value: f64) -> Option<String> {
        // Only the first parameter has custom formatting
        if param_id == 1 {
            Some(format!("{:.1} dB", value))
        } else {
            None
        }
    }

    fn text_to_value(&self, param_id: ClapId, text: &str) -> Option<f64> {
        if param_id == 1 {
            text.trim_end_matches("dB").trim().parse().ok()
        } else {
            None
        }
    }
}

impl PluginLatency for MockPlugin {
    fn get(&self) -> u32 {
        self.state.latency.load(Ordering::SeqCst)
    }
}

impl PluginTail for MockPlugin {
    fn get(&self) -> u32 {
        self.state.tail.lock().unwrap_or(0)
    }
}

impl PluginTimerSupport for MockPlugin {
    fn on_timer(&self, timer_id: ClapId) {
        self.state.timers_fired.lock().push(timer_id);
    }
}

impl PluginPosixFdSupport for MockPlugin {
    fn on_fd(&self, fd: i32, flags: PosixFdFlags) {
        self.state.fds_fired.lock().push((fd, flags));
    }
}

impl PluginState for MockPlugin {
    fn save(&self, stream: &mut dyn Write) -> bool {
        stream.write_all(&self.state.state.lock()).is_ok()
    }

    fn load(&self, stream: &mut dyn Read) -> bool {
        let mut data = Vec::new();
        if stream.read_to_end(&mut data).is_err() || data.is_empty() {
            return false;
        }

        *self.state.state.lock() = data;
        true
    }
}

impl PluginGui for MockPlugin {
    fn get_size(&self) -> Option<(u32, u32)> {
        Some((640, 480))
    }

    fn can_resize(&self) -> bool {
        true
    }

    fn set_size(&self, _width: u32, _height: u32) -> bool {
        true
    }
}

impl PluginAsVst3 for MockPlugin {
    fn num_midi_channels(&self, note_port: u32) -> u32 {
        match self.state.port_midi_channels.lock().get(&note_port) {
            Some(channels) => *channels,
            None => self.state.hints.lock().map_or(16, |(channels, _)| channels),
        }
    }

    fn supported_note_expressions(&self) -> SupportedNoteExpressions {
        self.state
            .hints
            .lock()
            .map_or(SupportedNoteExpressions::empty(), |(_, expressions)| {
                expressions
            })
    }
}

pub struct MockFactory {
    pub state: Arc<MockState>,
    pub fail_create: bool,
}

impl PluginFactory for MockFactory {
    fn create_plugin(
        &self,
        _config: &BridgeConfig,
        host: Weak<dyn ClapHost>,
    ) -> Option<Box<dyn ClapPlugin>> {
        if self.fail_create {
            return None;
        }

        *self.state.host.lock() = Some(host);
        Some(Box::new(MockPlugin {
            state: self.state.clone(),
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HandlerEvent {
    Begin(u32),
    Perform(u32, f64),
    End(u32),
    Restart(RestartFlags),
}

#[derive(Default)]
pub struct MockComponentHandler {
    pub events: Mutex<Vec<HandlerEvent>>,
    pub supports_handler2: bool,
    pub dirty: Mutex<Vec<bool>>,
    pub open_editor_requests: AtomicUsize,
}

impl MockComponentHandler {
    pub fn new(supports_handler2: bool) -> Arc<Self> {
        Arc::new(Self {
            supports_handler2,
            ..Self::default()
        })
    }

    pub fn events(&self) -> Vec<HandlerEvent> {
        self.events.lock().clone()
    }

    pub fn restarts(&self) -> Vec<RestartFlags> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                HandlerEvent::Restart(flags) => Some(*flags),
                _ => None,
            })
            .collect()
    }
}

impl ComponentHandler for MockComponentHandler {
    fn begin_edit(&self, id: u32) -> bool {
        self.events.lock().push(HandlerEvent::Begin(id));
        true
    }

    fn perform_edit(&self, id: u32, value_normalized: f64) -> bool {
        self.events
            .lock()
            .push(HandlerEvent::Perform(id, value_normalized));
        true
    }

    fn end_edit(&self, id: u32) -> bool {
        self.events.lock().push(HandlerEvent::End(id));
        true
    }

    fn restart_component(&self, flags: RestartFlags) -> bool {
        self.events.lock().push(HandlerEvent::Restart(flags));
        true
    }

    fn handler2(&self) -> Option<&dyn ComponentHandler2> {
        if self.supports_handler2 {
            Some(self)
        } else {
            None
        }
    }
}

impl ComponentHandler2 for MockComponentHandler {
    fn set_dirty(&self, state: bool) -> bool {
        self.dirty.lock().push(state);
        true
    }

    fn request_open_editor(&self) -> bool {
        self.open_editor_requests.fetch_add(1, Ordering::SeqCst);
        true
    }
}

#[derive(Default)]
pub struct MockRunLoop {
    pub timers: Mutex<Vec<(Arc<dyn TimerHandler>, u64)>>,
    pub fds: Mutex<Vec<(Arc<dyn EventHandler>, FileDescriptor)>>,
}

impl MockRunLoop {
    pub fn fire_timers(&self) {
        let handlers: Vec<_> = self.timers.lock().iter().map(|(h, _)| h.clone()).collect();
        for handler in handlers {
            handler.on_timer();
        }
    }

    pub fn fire_fds(&self) {
        let handlers: Vec<_> = self
            .fds
            .lock()
            .iter()
            .map(|(h, fd)| (h.clone(), *fd))
            .collect();
        for (handler, fd) in handlers {
            handler.on_fd_is_set(fd);
        }
    }
}

impl RunLoop for MockRunLoop {
    fn register_event_handler(&self, handler: Arc<dyn EventHandler>, fd: FileDescriptor) -> bool {
        self.fds.lock().push((handler, fd));
        true
    }

    fn unregister_event_handler(&self, handler: &Arc<dyn EventHandler>) -> bool {
        let mut fds = self.fds.lock();
        let len = fds.len();
        fds.retain(|(h, _)| !same_handler(h, handler));
        fds.len() != len
    }

    fn register_timer(&self, handler: Arc<dyn TimerHandler>, milliseconds: u64) -> bool {
        self.timers.lock().push((handler, milliseconds));
        true
    }

    fn unregister_timer(&self, handler: &Arc<dyn TimerHandler>) -> bool {
        let mut timers = self.timers.lock();
        let len = timers.len();
        timers.retain(|(h, _)| !same_handler(h, handler));
        timers.len() != len
    }
}

#[derive(Default)]
pub struct MockView {
    pub resize_requests: Mutex<Vec<(u32, u32)>>,
}

impl PlugView for MockView {
    fn request_resize(&self, width: u32, height: u32) -> bool {
        self.resize_requests.lock().push((width, height));
        true
    }
}

#[derive(Default)]
pub struct MockViewFactory {
    pub view: Arc<MockView>,
    pub callbacks: Mutex<Option<Weak<dyn ViewCallbacks>>>,
}

impl MockViewFactory {
    pub fn callbacks(&self) -> Arc<dyn ViewCallbacks> {
        self.callbacks
            .lock()
            .as_ref()
            .and_then(Weak::upgrade)
            .expect("No view was created")
    }
}

impl ViewFactory for MockViewFactory {
    fn create_view(&self, callbacks: Weak<dyn ViewCallbacks>) -> Option<Arc<dyn PlugView>> {
        *self.callbacks.lock() = Some(callbacks);
        Some(self.view.clone())
    }
}

/// What the process adapter saw.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterEvent {
    Created {
        audio_inputs: Vec<u32>,
        audio_outputs: Vec<u32>,
        max_block_size: u32,
        num_event_inputs: usize,
        supports_note_expressions: bool,
        supports_tuning_expressions: bool,
    },
    Process,
    Flush,
    BusActivated(BusDirection, usize, bool),
    ParamsUpdated(usize),
}

/// A parameter gesture the adapter should report on behalf of the plugin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    Begin(ClapId),
    Value(ClapId, f64),
    End(ClapId),
}

/// The process data for the mock adapter: the gestures the plugin makes during this block.
#[derive(Debug, Default)]
pub struct MockProcessData {
    pub gestures: Vec<Gesture>,
}

#[derive(Default)]
pub struct MockAdapterFactory {
    pub events: Arc<Mutex<Vec<AdapterEvent>>>,
    /// Gestures the plugin makes during a flush.
    pub flush_gestures: Arc<Mutex<Vec<Gesture>>>,
}

pub struct MockAdapter {
    events: Arc<Mutex<Vec<AdapterEvent>>>,
    flush_gestures: Arc<Mutex<Vec<Gesture>>>,
    edit_sink: Arc<dyn ParamEditSink>,
}

impl MockAdapter {
    fn send_gestures(&self, gestures: &[Gesture]) {
        for gesture in gestures {
            match *gesture {
                Gesture::Begin(id) => self.edit_sink.begin_edit(id),
                Gesture::Value(id, value) => self.edit_sink.perform_edit(id, value),
                Gesture::End(id) => self.edit_sink.end_edit(id),
            }
        }
    }
}

impl ProcessAdapterFactory for MockAdapterFactory {
    type Adapter = MockAdapter;

    fn create(&self, setup: AdapterSetup) -> MockAdapter {
        self.events.lock().push(AdapterEvent::Created {
            audio_inputs: setup.audio_inputs.clone(),
            audio_outputs: setup.audio_outputs.clone(),
            max_block_size: setup.max_block_size,
            num_event_inputs: setup.num_event_inputs,
            supports_note_expressions: setup.supports_note_expressions,
            supports_tuning_expressions: setup.supports_tuning_expressions,
        });

        MockAdapter {
            events: self.events.clone(),
            flush_gestures: self.flush_gestures.clone(),
            edit_sink: setup.edit_sink,
        }
    }
}

impl ProcessAdapter for MockAdapter {
    type ProcessData = MockProcessData;

    fn process(&mut self, _plugin: &dyn ClapPlugin, data: &mut MockProcessData) -> bool {
        self.events.lock().push(AdapterEvent::Process);
        self.send_gestures(&data.gestures);

        true
    }

    fn flush(&mut self, _plugin: &dyn ClapPlugin) {
        self.events.lock().push(AdapterEvent::Flush);
        let gestures = self.flush_gestures.lock().clone();
        self.send_gestures(&gestures);
    }

    fn activate_audio_bus(&mut self, direction: BusDirection, index: usize, active: bool) {
        self.events
            .lock()
            .push(AdapterEvent::BusActivated(direction, index, active));
    }

    fn update_parameters(&mut self, params: Arc<ParamTable>) {
        self.events
            .lock()
            .push(AdapterEvent::ParamsUpdated(params.len()));
    }
}

/// A bridge around a mock plugin, plus handles to inspect both sides.
pub struct Fixture {
    pub bridge: Arc<Wrapper<MockAdapterFactory>>,
    pub plugin: Arc<MockState>,
    pub handler: Arc<MockComponentHandler>,
    pub adapter_events: Arc<Mutex<Vec<AdapterEvent>>>,
    pub flush_gestures: Arc<Mutex<Vec<Gesture>>>,
}

impl Fixture {
    /// Create a bridge around `plugin` with a component handler that supports
    /// `IComponentHandler2`. The plugin is not initialized yet.
    pub fn new(plugin: Arc<MockState>) -> Self {
        Self::with_handler(plugin, MockComponentHandler::new(true))
    }

    pub fn with_handler(plugin: Arc<MockState>, handler: Arc<MockComponentHandler>) -> Self {
        let adapter_factory = MockAdapterFactory::default();
        let adapter_events = adapter_factory.events.clone();
        let flush_gestures = adapter_factory.flush_gestures.clone();
        let bridge = Wrapper::new(
            BridgeConfig::default(),
            Arc::new(MockFactory {
                state: plugin.clone(),
                fail_create: false,
            }),
            adapter_factory,
        );
        bridge.set_component_handler(Some(handler.clone()));

        Self {
            bridge,
            plugin,
            handler,
            adapter_events,
            flush_gestures,
        }
    }

    /// Create and initialize the bridge.
    pub fn initialized(plugin: Arc<MockState>) -> Self {
        let fixture = Self::new(plugin);
        fixture.bridge.initialize().expect("Initialization failed");

        fixture
    }

    pub fn adapter_events(&self) -> Vec<AdapterEvent> {
        self.adapter_events.lock().clone()
    }
}
