//! The VST3 host's side of the conversation. These are the host interfaces the bridge calls into:
//! `IComponentHandler`, `IComponentHandler2`, the Linux `IRunLoop` and the plugin view. The COM
//! glue that turns the real host pointers into these traits lives outside of this crate.

use bitflags::bitflags;
use std::sync::{Arc, Weak};
use vst3_sys::vst::RestartFlags as Vst3RestartFlags;

bitflags! {
    /// The flags passed to `IComponentHandler::restartComponent()`.
    pub struct RestartFlags: i32 {
        const RELOAD_COMPONENT = Vst3RestartFlags::kReloadComponent as i32;
        const IO_CHANGED = Vst3RestartFlags::kIoChanged as i32;
        const PARAM_VALUES_CHANGED = Vst3RestartFlags::kParamValuesChanged as i32;
        const LATENCY_CHANGED = Vst3RestartFlags::kLatencyChanged as i32;
        const PARAM_TITLES_CHANGED = Vst3RestartFlags::kParamTitlesChanged as i32;
        const MIDI_CC_ASSIGNMENT_CHANGED = Vst3RestartFlags::kMidiCCAssignmentChanged as i32;
    }
}

/// `IComponentHandler`. Parameter IDs are the VST3 parameter IDs, values are normalized.
pub trait ComponentHandler: Send + Sync {
    fn begin_edit(&self, id: u32) -> bool;
    fn perform_edit(&self, id: u32, value_normalized: f64) -> bool;
    fn end_edit(&self, id: u32) -> bool;
    fn restart_component(&self, flags: RestartFlags) -> bool;

    /// Query the handler for `IComponentHandler2`. Not every host implements it.
    fn handler2(&self) -> Option<&dyn ComponentHandler2> {
        None
    }
}

/// `IComponentHandler2`.
pub trait ComponentHandler2: Send + Sync {
    fn set_dirty(&self, state: bool) -> bool;
    fn request_open_editor(&self) -> bool;
}

/// A file descriptor as used by the Linux run loop.
pub type FileDescriptor = i32;

/// `ITimerHandler`.
pub trait TimerHandler: Send + Sync {
    fn on_timer(&self);
}

/// `IEventHandler`.
pub trait EventHandler: Send + Sync {
    fn on_fd_is_set(&self, fd: FileDescriptor);
}

/// `IRunLoop`. Handlers are unregistered using the same `Arc` they were registered with.
pub trait RunLoop: Send + Sync {
    fn register_event_handler(&self, handler: Arc<dyn EventHandler>, fd: FileDescriptor) -> bool;
    fn unregister_event_handler(&self, handler: &Arc<dyn EventHandler>) -> bool;
    fn register_timer(&self, handler: Arc<dyn TimerHandler>, milliseconds: u64) -> bool;
    fn unregister_timer(&self, handler: &Arc<dyn TimerHandler>) -> bool;
}

/// The `IPlugView` the host received from `IEditController::createView()`. The host owns it.
pub trait PlugView: Send + Sync {
    /// Ask the host's `IPlugFrame` to resize the view.
    fn request_resize(&self, width: u32, height: u32) -> bool;
}

/// Notifications a view sends back to the bridge over its lifetime.
pub trait ViewCallbacks: Send + Sync {
    /// The view got attached to a parent window. On Linux the host's run loop is passed along.
    fn view_attached(&self, run_loop: Option<Arc<dyn RunLoop>>);
    /// The view got removed from its parent window.
    fn view_removed(&self);
}

/// Creates the platform specific view embedding the plugin's GUI.
pub trait ViewFactory {
    fn create_view(&self, callbacks: Weak<dyn ViewCallbacks>) -> Option<Arc<dyn PlugView>>;
}

/// Compare two trait object `Arc`s by the address of the object they point to. Comparing the fat
/// pointers would also compare vtable addresses, and those are not guaranteed to be unique.
pub fn same_handler<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}
