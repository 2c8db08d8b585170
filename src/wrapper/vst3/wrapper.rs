use atomic_refcell::AtomicRefCell;
use crossbeam::atomic::AtomicCell;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use vst3_sys::vst::{SpeakerArrangement, SymbolicSampleSizes};

use super::busses::{self, Bus, BusDirection, BusList, MediaType};
use super::edit_queue::{EditEvent, EditQueue};
use super::error::BridgeError;
use super::note_expressions::{NoteExpressionType, NoteExpressions};
use super::param_units::ParamUnit;
use super::params::{ParamTable, ParameterInfo};
use super::process::{
    AdapterSetup, BufferConfig, ProcessAdapter, ProcessAdapterFactory, ProcessingSetup,
};
use super::run_loop::{RunLoopMultiplexer, RunLoopTarget};
use super::state;
use super::util::PARAM_ID_MASK;
use crate::config::BridgeConfig;
use crate::host::{ComponentHandler, FileDescriptor, PlugView, RestartFlags, RunLoop};
use crate::host::{ViewCallbacks, ViewFactory};
use crate::plugin::{
    ClapHost, ClapId, ClapPlugin, ParamRescanFlags, PluginFactory, PosixFdFlags,
    SupportedNoteExpressions,
};
use crate::util::tick_ms;
use crate::wrapper::util::process_wrapper;

/// `kInfiniteTail`, missing from vst3-sys.
pub const INFINITE_TAIL: u32 = u32::MAX;

/// The bridge between a VST3 host and a CLAP plugin. The VST3 host talks to this object through
/// the `IComponent`, `IAudioProcessor`, `IEditController`, `IMidiMapping`, `IUnitInfo` and
/// `INoteExpressionController` style functions below, and the CLAP plugin talks to it through
/// [`ClapHost`]. This needs to live in an `Arc` because the plugin, the run loop handlers and the
/// editor view all hold weak references back to it.
pub struct Wrapper<F: ProcessAdapterFactory> {
    /// A weak reference to ourselves, handed out to the plugin and the editor view.
    this: Weak<Self>,

    config: BridgeConfig,
    plugin_factory: Arc<dyn PluginFactory>,
    adapter_factory: F,

    /// The wrapped plugin instance. Set between `initialize()` and `terminate()`. Since the plugin
    /// may call back into the bridge while we're calling into it, this is always read using
    /// `read_recursive()`.
    plugin: RwLock<Option<Box<dyn ClapPlugin>>>,
    /// The host's `IComponentHandler` instance, if passed through
    /// `IEditController::set_component_handler`.
    component_handler: RwLock<Option<Arc<dyn ComponentHandler>>>,
    /// The editor view we handed to the host. The host owns it.
    plug_view: RwLock<Option<Weak<dyn PlugView>>>,

    /// Whether the plugin accepts raw MIDI, in which case MIDI controllers get mapped to
    /// parameters.
    wants_midi_input: AtomicBool,
    /// The number of MIDI channels mapped to controller parameters, from the first note port.
    midi_channels: AtomicCell<u16>,
    note_expression_support: AtomicCell<SupportedNoteExpressions>,

    /// Whether the plugin is currently activated. In other words, the last state
    /// `IComponent::setActive()` has been called with.
    is_active: AtomicBool,
    /// Whether the plugin is currently processing audio. This doubles as the lock that keeps
    /// parameter flushes on the main thread from overlapping with starting or stopping processing.
    is_processing: Mutex<bool>,
    /// The current buffer configuration, containing the sample rate and the maximum block size.
    /// Will be set in `IAudioProcessor::setupProcessing()`.
    current_buffer_config: AtomicCell<Option<BufferConfig>>,
    /// The largest maximum block size the host has announced so far.
    largest_block_size: AtomicU32,

    busses: RwLock<BusList>,
    /// The current generation of the parameter tree. Replaced as a whole when the plugin rescans
    /// its parameters.
    params: RwLock<Arc<ParamTable>>,
    note_expressions: RwLock<NoteExpressions>,

    /// Set while the plugin is active.
    process_adapter: Mutex<Option<F::Adapter>>,
    /// Parameter gestures made by the plugin from the audio thread, forwarded to the host during
    /// the next idle pass.
    edit_queue: Arc<EditQueue>,

    /// Set by `clap_host_params::request_flush()`.
    flush_requested: AtomicBool,
    /// Set by `clap_host::request_callback()`.
    callback_requested: AtomicBool,

    /// The plugin's timers and file descriptors. Only touched from the main thread.
    run_loop: AtomicRefCell<RunLoopMultiplexer>,
}

impl<F: ProcessAdapterFactory> Wrapper<F> {
    pub fn new(
        config: BridgeConfig,
        plugin_factory: Arc<dyn PluginFactory>,
        adapter_factory: F,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Self>| {
            let target: Weak<dyn RunLoopTarget> = this.clone();
            let run_loop = RunLoopMultiplexer::new(target, config.effective_idle_interval_ms());
            let midi_channels = config.default_midi_channels;

            Self {
                this: this.clone(),

                config,
                plugin_factory,
                adapter_factory,

                plugin: RwLock::new(None),
                component_handler: RwLock::new(None),
                plug_view: RwLock::new(None),

                wants_midi_input: AtomicBool::new(false),
                midi_channels: AtomicCell::new(midi_channels),
                note_expression_support: AtomicCell::new(SupportedNoteExpressions::empty()),

                is_active: AtomicBool::new(false),
                is_processing: Mutex::new(false),
                current_buffer_config: AtomicCell::new(None),
                largest_block_size: AtomicU32::new(0),

                busses: RwLock::new(BusList::default()),
                params: RwLock::new(Arc::new(ParamTable::default())),
                note_expressions: RwLock::new(NoteExpressions::default()),

                process_adapter: Mutex::new(None),
                edit_queue: Arc::new(EditQueue::default()),

                flush_requested: AtomicBool::new(false),
                callback_requested: AtomicBool::new(false),

                run_loop: AtomicRefCell::new(run_loop),
            }
        })
    }

    fn plugin(&self) -> RwLockReadGuard<'_, Option<Box<dyn ClapPlugin>>> {
        self.plugin.read_recursive()
    }

    /// The current parameter table.
    pub fn params(&self) -> Arc<ParamTable> {
        self.params.read().clone()
    }

    pub fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }

    pub fn is_processing(&self) -> bool {
        *self.is_processing.lock()
    }

    pub fn is_initialized(&self) -> bool {
        self.plugin().is_some()
    }

    pub fn wants_midi_input(&self) -> bool {
        self.wants_midi_input.load(Ordering::SeqCst)
    }

    /// Whether the plugin's timers are currently driven by the host's run loop.
    pub fn is_run_loop_attached(&self) -> bool {
        self.run_loop.borrow().is_attached()
    }

    /// `IPluginBase::initialize()`. Creates and initializes the plugin, and then builds the busses,
    /// units and parameters from the plugin's extensions.
    pub fn initialize(&self) -> Result<(), BridgeError> {
        if self.is_initialized() {
            bridge_warn!("The host tried to initialize the plugin twice");
            return Ok(());
        }

        let host: Weak<dyn ClapHost> = self.this.clone();
        let plugin = self
            .plugin_factory
            .create_plugin(&self.config, host)
            .ok_or(BridgeError::InitializationFailed)?;

        // The plugin may already call back into the bridge during `init()`, so it needs to be
        // stored first
        *self.plugin.write() = Some(plugin);
        let initialized = self.plugin().as_deref().map_or(false, |plugin| plugin.init());
        if !initialized {
            bridge_error!("The plugin failed to initialize");
            let plugin = self.plugin.write().take();
            if let Some(plugin) = plugin {
                plugin.terminate();
            }

            return Err(BridgeError::InitializationFailed);
        }

        {
            let plugin = self.plugin();
            let plugin = plugin.as_deref().ok_or(BridgeError::NotInitialized)?;
            let hints = plugin.as_vst3();

            // Only the first note port's channel count bounds the MIDI controller mapping. Every
            // event bus gets its own channel count
            self.midi_channels.store(busses::midi_channels_for_port(
                plugin,
                0,
                self.config.default_midi_channels,
            ));
            self.note_expression_support.store(
                hints
                    .map(|hints| hints.supported_note_expressions())
                    .unwrap_or_default(),
            );
            self.wants_midi_input
                .store(busses::wants_midi_input(plugin), Ordering::SeqCst);
        }

        self.rebuild_busses();
        let params = self.rebuild_parameters();
        bridge_log!(
            "Initialized the plugin with {} parameters in {} units",
            params.len(),
            params.units().len()
        );

        Ok(())
    }

    /// `IPluginBase::terminate()`. Stops and deactivates the plugin if the host didn't, and then
    /// releases it.
    pub fn terminate(&self) -> Result<(), BridgeError> {
        {
            let mut run_loop = self.run_loop.borrow_mut();
            run_loop.detach();
            run_loop.clear();
        }

        let is_processing = *self.is_processing.lock();
        if is_processing {
            self.set_processing(false)?;
        }
        if self.is_active() {
            self.set_active(false)?;
        }

        let plugin = self.plugin.write().take();
        if let Some(plugin) = plugin {
            plugin.terminate();
        }

        *self.busses.write() = BusList::default();
        *self.params.write() = Arc::new(ParamTable::default());
        *self.note_expressions.write() = NoteExpressions::default();
        while self.edit_queue.pop().is_some() {}

        Ok(())
    }

    /// `IEditController::setComponentHandler()`.
    pub fn set_component_handler(&self, handler: Option<Arc<dyn ComponentHandler>>) {
        *self.component_handler.write() = handler;
    }

    /// `IComponent::setActive()`. Activating twice is an error, deactivating an inactive plugin
    /// is not.
    pub fn set_active(&self, state: bool) -> Result<(), BridgeError> {
        if state {
            {
                let plugin = self.plugin();
                let plugin = plugin.as_deref().ok_or(BridgeError::NotInitialized)?;
                if self.is_active() {
                    return Err(BridgeError::AlreadyActive);
                }

                let buffer_config = self.current_buffer_config.load().unwrap_or_default();
                let max_block_size = buffer_config
                    .max_buffer_size
                    .max(self.largest_block_size.load(Ordering::SeqCst));
                if !plugin.activate(buffer_config.sample_rate, max_block_size, max_block_size) {
                    bridge_error!("The plugin failed to activate");
                    return Err(BridgeError::ActivationFailed);
                }
                self.is_active.store(true, Ordering::SeqCst);
            }

            // The plugin's ports may only change while it's inactive, so this is the last chance
            // to pick up on those changes
            self.rebuild_busses();
            let params = self.rebuild_parameters();

            let buffer_config = self.current_buffer_config.load().unwrap_or_default();
            let max_block_size = buffer_config
                .max_buffer_size
                .max(self.largest_block_size.load(Ordering::SeqCst));
            let mut adapter = self.create_adapter(max_block_size, params);
            {
                let busses = self.busses.read();
                for direction in [BusDirection::Input, BusDirection::Output] {
                    for (index, bus) in busses.list(MediaType::Audio, direction).iter().enumerate() {
                        adapter.activate_audio_bus(direction, index, bus.active);
                    }
                }
            }
            *self.process_adapter.lock() = Some(adapter);

            self.run_loop.borrow_mut().resume();
        } else {
            // A view may have attached while the plugin was inactive
            if self.is_active() {
                self.run_loop.borrow_mut().suspend();
            }

            let is_processing = *self.is_processing.lock();
            if is_processing {
                bridge_warn!("The host deactivated the plugin while it was still processing");
                self.set_processing(false)?;
            }

            if self.is_active.swap(false, Ordering::SeqCst) {
                if let Some(plugin) = self.plugin().as_deref() {
                    plugin.deactivate();
                }
            }
            *self.process_adapter.lock() = None;
        }

        Ok(())
    }

    /// `IAudioProcessor::setupProcessing()`. Only 32-bit floating point processing is supported.
    /// The sample rate and block size are used the next time the plugin gets activated.
    pub fn setup_processing(&self, setup: &ProcessingSetup) -> Result<(), BridgeError> {
        if !self.can_process_sample_size(setup.symbolic_sample_size) {
            return Err(BridgeError::UnsupportedSampleSize(
                setup.symbolic_sample_size,
            ));
        }

        self.current_buffer_config.store(Some(BufferConfig {
            sample_rate: setup.sample_rate,
            max_buffer_size: setup.max_samples_per_block,
        }));
        self.largest_block_size
            .fetch_max(setup.max_samples_per_block, Ordering::SeqCst);

        Ok(())
    }

    /// `IAudioProcessor::canProcessSampleSize()`.
    pub fn can_process_sample_size(&self, symbolic_sample_size: i32) -> bool {
        symbolic_sample_size == SymbolicSampleSizes::kSample32 as i32
    }

    /// `IAudioProcessor::setProcessing()`. Setting the current state again does nothing.
    pub fn set_processing(&self, state: bool) -> Result<(), BridgeError> {
        let mut is_processing = self.is_processing.lock();
        if *is_processing == state {
            return Ok(());
        }

        let plugin = self.plugin();
        let plugin = plugin.as_deref().ok_or(BridgeError::NotInitialized)?;
        if state {
            if !self.is_active() {
                return Err(BridgeError::NotActive);
            }
            if !plugin.start_processing() {
                return Err(BridgeError::ProcessingStartFailed);
            }

            *is_processing = true;
        } else {
            *is_processing = false;
            plugin.stop_processing();
        }

        Ok(())
    }

    /// `IAudioProcessor::process()`.
    pub fn process(
        &self,
        data: &mut <F::Adapter as ProcessAdapter>::ProcessData,
    ) -> Result<(), BridgeError> {
        process_wrapper(|| -> Result<(), BridgeError> {
            let mut adapter = self.process_adapter.lock();
            let adapter = adapter.as_mut().ok_or(BridgeError::NotActive)?;
            let plugin = self.plugin();
            let plugin = plugin.as_deref().ok_or(BridgeError::NotInitialized)?;

            if adapter.process(plugin, data) {
                Ok(())
            } else {
                Err(BridgeError::ProcessingFailed)
            }
        })
    }

    /// `IComponent::getState()`.
    pub fn get_state(&self, stream: &mut dyn Write) -> Result<(), BridgeError> {
        let plugin = self.plugin();
        let plugin = plugin.as_deref().ok_or(BridgeError::NotInitialized)?;

        state::save_state(plugin, stream)
    }

    /// `IComponent::setState()`. The host won't know about the new parameter values unless the
    /// plugin rescans them.
    pub fn set_state(&self, stream: &mut dyn Read) -> Result<(), BridgeError> {
        let plugin = self.plugin();
        let plugin = plugin.as_deref().ok_or(BridgeError::NotInitialized)?;

        state::load_state(plugin, stream)
    }

    /// `IAudioProcessor::getLatencySamples()`.
    pub fn latency_samples(&self) -> u32 {
        self.plugin()
            .as_deref()
            .and_then(|plugin| plugin.latency())
            .map_or(0, |latency| latency.get())
    }

    /// `IAudioProcessor::getTailSamples()`. Tails of `i32::MAX` samples or more are infinite.
    pub fn tail_samples(&self) -> u32 {
        match self.plugin().as_deref().and_then(|plugin| plugin.tail()) {
            Some(tail) => {
                let tail = tail.get();
                if tail >= i32::MAX as u32 {
                    INFINITE_TAIL
                } else {
                    tail
                }
            }
            None => 0,
        }
    }

    /// `IComponent::getBusCount()`.
    pub fn bus_count(&self, media_type: i32, direction: i32) -> i32 {
        match (
            MediaType::from_vst3(media_type),
            BusDirection::from_vst3(direction),
        ) {
            (Some(media_type), Some(direction)) => {
                self.busses.read().count(media_type, direction) as i32
            }
            _ => 0,
        }
    }

    /// `IComponent::getBusInfo()`.
    pub fn bus_info(&self, media_type: i32, direction: i32, index: i32) -> Result<Bus, BridgeError> {
        let (media_type, direction, index) = bus_address(media_type, direction, index)?;

        self.busses
            .read()
            .get(media_type, direction, index)
            .cloned()
            .ok_or(BridgeError::InvalidArgument)
    }

    /// `IComponent::activateBus()`. Changes to audio busses are passed on to the process adapter.
    pub fn activate_bus(
        &self,
        media_type: i32,
        direction: i32,
        index: i32,
        state: bool,
    ) -> Result<(), BridgeError> {
        let (media_type, direction, index) = bus_address(media_type, direction, index)?;
        if !self
            .busses
            .write()
            .set_active(media_type, direction, index, state)
        {
            return Err(BridgeError::InvalidArgument);
        }

        if media_type == MediaType::Audio {
            if let Some(adapter) = self.process_adapter.lock().as_mut() {
                adapter.activate_audio_bus(direction, index, state);
            }
        }

        Ok(())
    }

    /// `IAudioProcessor::getBusArrangement()`.
    pub fn bus_arrangement(
        &self,
        direction: i32,
        index: i32,
    ) -> Result<SpeakerArrangement, BridgeError> {
        let (_, direction, index) =
            bus_address(vst3_sys::vst::MediaTypes::kAudio as i32, direction, index)?;

        self.busses
            .read()
            .get(MediaType::Audio, direction, index)
            .map(|bus| bus.arrangement)
            .ok_or(BridgeError::InvalidArgument)
    }

    /// `IAudioProcessor::setBusArrangements()`. The plugin's layout is fixed, so only the layout we
    /// reported is accepted.
    pub fn set_bus_arrangements(
        &self,
        inputs: &[SpeakerArrangement],
        outputs: &[SpeakerArrangement],
    ) -> Result<(), BridgeError> {
        if self.busses.read().accepts_arrangements(inputs, outputs) {
            Ok(())
        } else {
            Err(BridgeError::Rejected)
        }
    }

    /// `IUnitInfo::getUnitCount()`.
    pub fn unit_count(&self) -> i32 {
        self.params().units().len() as i32
    }

    /// `IUnitInfo::getUnitInfo()`.
    pub fn unit_info(&self, index: i32) -> Result<ParamUnit, BridgeError> {
        let index = usize::try_from(index).map_err(|_| BridgeError::InvalidArgument)?;

        self.params()
            .units()
            .info(index)
            .cloned()
            .ok_or(BridgeError::InvalidArgument)
    }

    /// `IEditController::getParameterCount()`.
    pub fn parameter_count(&self) -> i32 {
        self.params().len() as i32
    }

    /// `IEditController::getParameterInfo()`.
    pub fn parameter_info(&self, index: i32) -> Result<ParameterInfo, BridgeError> {
        let index = usize::try_from(index).map_err(|_| BridgeError::InvalidArgument)?;

        self.params()
            .by_index(index)
            .map(|param| param.info())
            .ok_or(BridgeError::InvalidArgument)
    }

    /// `IEditController::getParamStringByValue()`. Uses the plugin's own formatting if it has any.
    pub fn param_string_by_value(
        &self,
        id: u32,
        value_normalized: f64,
    ) -> Result<String, BridgeError> {
        let params = self.params();
        let param = params.get(id).ok_or(BridgeError::UnknownParameter(id))?;
        let plain = param.normalized_to_plain(value_normalized);

        let text = param.clap_id().and_then(|clap_id| {
            self.plugin()
                .as_deref()
                .and_then(|plugin| plugin.params())
                .and_then(|plugin_params| plugin_params.value_to_text(clap_id, plain))
        });

        Ok(text.unwrap_or_else(|| {
            if param.step_count() > 0 {
                format!("{}", plain.round() as i64)
            } else {
                format!("{:.2}", plain)
            }
        }))
    }

    /// `IEditController::getParamValueByString()`. The plugin's own parameters can only be parsed
    /// by the plugin, MIDI controllers take a plain controller value.
    pub fn param_value_by_string(&self, id: u32, string: &str) -> Result<f64, BridgeError> {
        let params = self.params();
        let param = params.get(id).ok_or(BridgeError::UnknownParameter(id))?;

        let plain = match param.clap_id() {
            Some(clap_id) => self
                .plugin()
                .as_deref()
                .and_then(|plugin| plugin.params())
                .and_then(|plugin_params| plugin_params.text_to_value(clap_id, string)),
            None => string.trim().parse::<f64>().ok(),
        }
        .filter(|plain| plain.is_finite())
        .ok_or(BridgeError::InvalidArgument)?;

        Ok(param.plain_to_normalized(plain))
    }

    /// `IEditController::normalizedParamToPlain()`.
    pub fn normalized_param_to_plain(
        &self,
        id: u32,
        value_normalized: f64,
    ) -> Result<f64, BridgeError> {
        self.params()
            .get(id)
            .map(|param| param.normalized_to_plain(value_normalized))
            .ok_or(BridgeError::UnknownParameter(id))
    }

    /// `IEditController::plainParamToNormalized()`.
    pub fn plain_param_to_normalized(&self, id: u32, plain_value: f64) -> Result<f64, BridgeError> {
        self.params()
            .get(id)
            .map(|param| param.plain_to_normalized(plain_value))
            .ok_or(BridgeError::UnknownParameter(id))
    }

    /// `IEditController::getParamNormalized()`.
    pub fn param_normalized(&self, id: u32) -> Result<f64, BridgeError> {
        self.params()
            .get(id)
            .map(|param| param.normalized_value())
            .ok_or(BridgeError::UnknownParameter(id))
    }

    /// `IEditController::setParamNormalized()`. This only updates the value the host sees, the
    /// plugin receives the change through the process adapter.
    pub fn set_param_normalized(&self, id: u32, value_normalized: f64) -> Result<(), BridgeError> {
        let params = self.params();
        let param = params.get(id).ok_or(BridgeError::UnknownParameter(id))?;
        param.set_normalized_value(value_normalized);

        Ok(())
    }

    /// `IMidiMapping::getMidiControllerAssignment()`. Only the first event bus is mapped.
    pub fn midi_controller_assignment(
        &self,
        bus_index: i32,
        channel: i16,
        midi_controller_number: i16,
    ) -> Result<u32, BridgeError> {
        if !self.wants_midi_input() {
            return Err(BridgeError::Unsupported);
        }
        if bus_index != 0 || channel < 0 || midi_controller_number < 0 {
            return Err(BridgeError::InvalidArgument);
        }

        self.params()
            .midi_mapping()
            .and_then(|mapping| {
                mapping.lookup(channel as usize, midi_controller_number as usize)
            })
            .ok_or(BridgeError::InvalidArgument)
    }

    /// `INoteExpressionController::getNoteExpressionCount()`.
    pub fn note_expression_count(&self, bus_index: i32, channel: i16) -> i32 {
        self.note_expressions.read().count(bus_index, channel) as i32
    }

    /// `INoteExpressionController::getNoteExpressionInfo()`.
    pub fn note_expression_info(
        &self,
        bus_index: i32,
        channel: i16,
        index: i32,
    ) -> Result<NoteExpressionType, BridgeError> {
        let index = usize::try_from(index).map_err(|_| BridgeError::InvalidArgument)?;

        self.note_expressions
            .read()
            .info(bus_index, channel, index)
            .copied()
            .ok_or(BridgeError::InvalidArgument)
    }

    /// `INoteExpressionController::getNoteExpressionStringByValue()`.
    pub fn note_expression_string_by_value(
        &self,
        bus_index: i32,
        channel: i16,
        type_id: u32,
        value_normalized: f64,
    ) -> Result<String, BridgeError> {
        if bus_index != 0 || channel != 0 {
            return Err(BridgeError::InvalidArgument);
        }

        self.note_expressions
            .read()
            .string_by_value(type_id, value_normalized)
            .ok_or(BridgeError::InvalidArgument)
    }

    /// `INoteExpressionController::getNoteExpressionValueByString()`.
    pub fn note_expression_value_by_string(
        &self,
        bus_index: i32,
        channel: i16,
        type_id: u32,
        string: &str,
    ) -> Result<f64, BridgeError> {
        if bus_index != 0 || channel != 0 {
            return Err(BridgeError::InvalidArgument);
        }

        self.note_expressions
            .read()
            .value_by_string(type_id, string)
            .ok_or(BridgeError::InvalidArgument)
    }

    /// `IEditController::createView()`. Returns `None` if the plugin doesn't have a GUI. The host
    /// owns the returned view, we only keep a weak reference to it for resize requests.
    pub fn create_view(&self, factory: &dyn ViewFactory) -> Option<Arc<dyn PlugView>> {
        let has_gui = self
            .plugin()
            .as_deref()
            .map_or(false, |plugin| plugin.gui().is_some());
        if !has_gui {
            return None;
        }

        let callbacks: Weak<dyn ViewCallbacks> = self.this.clone();
        let view = factory.create_view(callbacks)?;
        *self.plug_view.write() = Some(Arc::downgrade(&view));

        Some(view)
    }

    /// The main thread idle pass. This runs from the run loop's idle timer when the editor is open,
    /// and otherwise the host is expected to call this periodically from its main thread. Forwards
    /// queued parameter gestures to the host, performs any requested parameter flush and main
    /// thread callback, and fires due timers if no run loop is driving them.
    pub fn on_idle(&self) {
        self.forward_edits();

        if self.flush_requested.swap(false, Ordering::SeqCst) {
            self.flush_parameters();
        }

        if self.callback_requested.swap(false, Ordering::SeqCst) {
            if let Some(plugin) = self.plugin().as_deref() {
                plugin.on_main_thread();
            }
        }

        // The borrow needs to end before firing the timers, since the plugin may register or
        // unregister timers from its timer callback
        let due_timers = self.run_loop.borrow_mut().poll_timers(tick_ms());
        for timer_id in due_timers {
            self.on_timer(timer_id);
        }
    }

    /// Send the gestures queued by the process adapter to the host. Gestures for parameters that
    /// no longer exist are dropped.
    fn forward_edits(&self) {
        let handler = self.component_handler.read().clone();
        let params = self.params();
        while let Some(event) = self.edit_queue.pop() {
            let param_id = event.param_id() & PARAM_ID_MASK;
            let param = match params.get(param_id) {
                Some(param) => param,
                None => {
                    bridge_trace!("Dropping {:?} for an unknown parameter", event);
                    continue;
                }
            };

            match event {
                EditEvent::BeginEdit { .. } => {
                    if let Some(handler) = &handler {
                        handler.begin_edit(param_id);
                    }
                }
                EditEvent::ValueChanged { value, .. } => {
                    let normalized = param.plain_to_normalized(value);
                    param.set_normalized_value(normalized);
                    if let Some(handler) = &handler {
                        handler.perform_edit(param_id, normalized);
                    }
                }
                EditEvent::EndEdit { .. } => {
                    if let Some(handler) = &handler {
                        handler.end_edit(param_id);
                    }
                }
            }
        }
    }

    /// Let the plugin flush its parameters outside of the process call. If the plugin is currently
    /// processing, the next process call takes care of this instead.
    fn flush_parameters(&self) {
        let is_processing = self.is_processing.lock();
        if *is_processing {
            return;
        }

        let plugin = self.plugin();
        let plugin = match plugin.as_deref() {
            Some(plugin) => plugin,
            None => return,
        };

        let mut adapter = self.create_adapter(0, self.params());
        adapter.flush(plugin);
    }

    fn create_adapter(&self, max_block_size: u32, params: Arc<ParamTable>) -> F::Adapter {
        let busses = self.busses.read();
        let note_expressions = self.note_expression_support.load();

        self.adapter_factory.create(AdapterSetup {
            audio_inputs: busses.audio_channel_counts(BusDirection::Input),
            audio_outputs: busses.audio_channel_counts(BusDirection::Output),
            max_block_size,
            num_event_inputs: busses.count(MediaType::Event, BusDirection::Input),
            num_event_outputs: busses.count(MediaType::Event, BusDirection::Output),
            params,
            edit_sink: self.edit_queue.clone(),
            supports_note_expressions: note_expressions
                .contains(SupportedNoteExpressions::PRESSURE),
            supports_tuning_expressions: note_expressions
                .contains(SupportedNoteExpressions::TUNING),
        })
    }

    fn rebuild_busses(&self) {
        let plugin = self.plugin();
        let plugin = match plugin.as_deref() {
            Some(plugin) => plugin,
            None => return,
        };

        let mut new_busses = BusList::build(plugin, self.config.default_midi_channels);
        let mut busses = self.busses.write();
        new_busses.carry_over_activation(&busses);
        *busses = new_busses;
    }

    /// Build a new generation of the parameter tree and the note expressions from the plugin.
    fn rebuild_parameters(&self) -> Arc<ParamTable> {
        let params = {
            let plugin = self.plugin();
            let midi_channels = if self.wants_midi_input() {
                Some(self.midi_channels.load() as usize)
            } else {
                None
            };

            Arc::new(match plugin.as_deref() {
                Some(plugin) => ParamTable::build(plugin.params(), midi_channels),
                None => ParamTable::default(),
            })
        };

        *self.params.write() = params.clone();
        *self.note_expressions.write() =
            NoteExpressions::new(self.note_expression_support.load());
        if let Some(adapter) = self.process_adapter.lock().as_mut() {
            adapter.update_parameters(params.clone());
        }

        params
    }

    /// Reread the values of the plugin's own parameters.
    fn refresh_param_values(&self) {
        let plugin = self.plugin();
        let plugin_params = match plugin.as_deref().and_then(|plugin| plugin.params()) {
            Some(plugin_params) => plugin_params,
            None => return,
        };

        for param in self.params().iter() {
            if let Some(value) = param
                .clap_id()
                .and_then(|clap_id| plugin_params.get_value(clap_id))
            {
                param.set_normalized_value(param.plain_to_normalized(value));
            }
        }
    }

    fn restart_component(&self, flags: RestartFlags) -> bool {
        let handler = self.component_handler.read().clone();
        match handler {
            Some(handler) => handler.restart_component(flags),
            None => false,
        }
    }
}

/// Convert the VST3 bus address arguments, rejecting anything out of range.
fn bus_address(
    media_type: i32,
    direction: i32,
    index: i32,
) -> Result<(MediaType, BusDirection, usize), BridgeError> {
    let media_type = MediaType::from_vst3(media_type).ok_or(BridgeError::InvalidArgument)?;
    let direction = BusDirection::from_vst3(direction).ok_or(BridgeError::InvalidArgument)?;
    let index = usize::try_from(index).map_err(|_| BridgeError::InvalidArgument)?;

    Ok((media_type, direction, index))
}

impl<F: ProcessAdapterFactory> ClapHost for Wrapper<F> {
    fn mark_dirty(&self) {
        let handler = self.component_handler.read().clone();
        if let Some(handler) = handler {
            if let Some(handler2) = handler.handler2() {
                handler2.set_dirty(true);
            }
        }
    }

    fn request_callback(&self) {
        self.callback_requested.store(true, Ordering::SeqCst);
    }

    fn request_restart(&self) {
        self.restart_component(RestartFlags::RELOAD_COMPONENT);
    }

    fn latency_changed(&self) {
        self.restart_component(RestartFlags::LATENCY_CHANGED);
    }

    fn tail_changed(&self) {
        // VST3 doesn't have a separate flag for this, hosts requery the tail on latency changes
        self.restart_component(RestartFlags::LATENCY_CHANGED);
    }

    fn gui_can_resize(&self) -> bool {
        self.component_handler
            .read()
            .as_ref()
            .map_or(false, |handler| handler.handler2().is_some())
    }

    fn gui_request_resize(&self, width: u32, height: u32) -> Result<(), BridgeError> {
        let view = self
            .plug_view
            .read()
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or(BridgeError::NoView)?;

        if view.request_resize(width, height) {
            Ok(())
        } else {
            Err(BridgeError::Rejected)
        }
    }

    fn gui_request_show(&self) -> Result<(), BridgeError> {
        let handler = self.component_handler.read().clone();
        match handler.as_ref().and_then(|handler| handler.handler2()) {
            Some(handler2) if handler2.request_open_editor() => Ok(()),
            Some(_) => Err(BridgeError::Rejected),
            None => Err(BridgeError::Unsupported),
        }
    }

    fn gui_request_hide(&self) -> Result<(), BridgeError> {
        // VST3 hosts can't be asked to close the editor
        Err(BridgeError::Unsupported)
    }

    fn param_rescan(&self, flags: ParamRescanFlags) {
        let mut restart_flags = RestartFlags::empty();
        if flags.contains(ParamRescanFlags::ALL) {
            self.rebuild_parameters();
            restart_flags |= RestartFlags::MIDI_CC_ASSIGNMENT_CHANGED;
        }
        if flags.contains(ParamRescanFlags::VALUES) {
            restart_flags |= RestartFlags::PARAM_VALUES_CHANGED;
        }
        if flags.contains(ParamRescanFlags::INFO) {
            restart_flags |= RestartFlags::PARAM_VALUES_CHANGED | RestartFlags::PARAM_TITLES_CHANGED;
        }
        if restart_flags.is_empty() {
            return;
        }

        self.refresh_param_values();
        self.restart_component(restart_flags);
    }

    fn param_clear(&self, param_id: ClapId, flags: u32) {
        // VST3 hosts don't keep per-parameter automation or modulation state we could clear
        bridge_trace!("Ignoring a clear for parameter {} with flags {:#x}", param_id, flags);
    }

    fn param_request_flush(&self) {
        self.flush_requested.store(true, Ordering::SeqCst);
    }

    fn register_timer(&self, period_ms: u32) -> Result<ClapId, BridgeError> {
        Ok(self.run_loop.borrow_mut().register_timer(period_ms, tick_ms()))
    }

    fn unregister_timer(&self, timer_id: ClapId) -> Result<(), BridgeError> {
        if self.run_loop.borrow_mut().unregister_timer(timer_id) {
            Ok(())
        } else {
            Err(BridgeError::UnknownTimer(timer_id))
        }
    }

    fn register_fd(&self, fd: i32, flags: PosixFdFlags) -> Result<(), BridgeError> {
        if self.run_loop.borrow_mut().register_fd(fd, flags) {
            Ok(())
        } else {
            Err(BridgeError::InvalidArgument)
        }
    }

    fn modify_fd(&self, fd: i32, flags: PosixFdFlags) -> Result<(), BridgeError> {
        if self.run_loop.borrow_mut().modify_fd(fd, flags) {
            Ok(())
        } else {
            Err(BridgeError::UnknownFd(fd))
        }
    }

    fn unregister_fd(&self, fd: i32) -> Result<(), BridgeError> {
        if self.run_loop.borrow_mut().unregister_fd(fd) {
            Ok(())
        } else {
            Err(BridgeError::UnknownFd(fd))
        }
    }
}

impl<F: ProcessAdapterFactory> RunLoopTarget for Wrapper<F> {
    fn on_timer(&self, timer_id: ClapId) {
        if let Some(timer_support) = self
            .plugin()
            .as_deref()
            .and_then(|plugin| plugin.timer_support())
        {
            timer_support.on_timer(timer_id);
        }
    }

    fn on_fd(&self, fd: FileDescriptor, flags: PosixFdFlags) {
        if let Some(fd_support) = self
            .plugin()
            .as_deref()
            .and_then(|plugin| plugin.posix_fd_support())
        {
            fd_support.on_fd(fd, flags);
        }
    }

    fn on_idle(&self) {
        Wrapper::on_idle(self);
    }
}

impl<F: ProcessAdapterFactory> ViewCallbacks for Wrapper<F> {
    fn view_attached(&self, run_loop: Option<Arc<dyn RunLoop>>) {
        if let Some(run_loop) = run_loop {
            self.run_loop.borrow_mut().attach(run_loop);
        }
    }

    fn view_removed(&self) {
        self.run_loop.borrow_mut().detach();
        *self.plug_view.write() = None;
    }
}

impl<F: ProcessAdapterFactory> Drop for Wrapper<F> {
    fn drop(&mut self) {
        if self.plugin.get_mut().is_some() {
            bridge_warn!("The plugin was not terminated before the bridge was dropped");
            if let Err(err) = self.terminate() {
                bridge_error!("Could not terminate the plugin: {}", err);
            }
        }
    }
}
