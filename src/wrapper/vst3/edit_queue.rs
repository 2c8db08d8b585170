//! Parameter gestures coming from the plugin during processing need to reach the host's
//! `IComponentHandler`, but that may only be called from the main thread. The process adapter
//! pushes them onto this queue from the audio thread, and the idle handler forwards them to the
//! host.

use crossbeam::queue::ArrayQueue;

use crate::plugin::ClapId;

/// The number of gestures that can be queued between two idle passes. If this gets exceeded the
/// newest gestures are dropped.
pub const EDIT_QUEUE_CAPACITY: usize = 4096;

/// A parameter gesture made by the plugin. Parameter IDs are still the plugin's IDs, and values
/// are plain CLAP values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditEvent {
    BeginEdit { param_id: ClapId },
    ValueChanged { param_id: ClapId, value: f64 },
    EndEdit { param_id: ClapId },
}

impl EditEvent {
    pub fn param_id(&self) -> ClapId {
        match self {
            EditEvent::BeginEdit { param_id }
            | EditEvent::ValueChanged { param_id, .. }
            | EditEvent::EndEdit { param_id } => *param_id,
        }
    }
}

/// Where the process adapter sends the plugin's parameter gestures. Must be realtime-safe.
pub trait ParamEditSink: Send + Sync {
    fn begin_edit(&self, param_id: ClapId);
    fn perform_edit(&self, param_id: ClapId, value: f64);
    fn end_edit(&self, param_id: ClapId);
}

/// A bounded single producer single consumer FIFO of [`EditEvent`]s.
#[derive(Debug)]
pub struct EditQueue {
    events: ArrayQueue<EditEvent>,
}

impl Default for EditQueue {
    fn default() -> Self {
        Self::new(EDIT_QUEUE_CAPACITY)
    }
}

impl EditQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: ArrayQueue::new(capacity),
        }
    }

    /// Push an event onto the queue. Returns `false` and drops the event if the queue is full.
    /// Never blocks and never allocates.
    pub fn push(&self, event: EditEvent) -> bool {
        self.events.push(event).is_ok()
    }

    /// Pop the oldest event from the queue.
    pub fn pop(&self) -> Option<EditEvent> {
        self.events.pop()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn push_or_warn(&self, event: EditEvent) {
        let pushed = self.push(event);
        bridge_debug_assert!(pushed, "The edit queue is full, dropping {:?}", event);
    }
}

impl ParamEditSink for EditQueue {
    fn begin_edit(&self, param_id: ClapId) {
        self.push_or_warn(EditEvent::BeginEdit { param_id });
    }

    fn perform_edit(&self, param_id: ClapId, value: f64) {
        self.push_or_warn(EditEvent::ValueChanged { param_id, value });
    }

    fn end_edit(&self, param_id: ClapId) {
        self.push_or_warn(EditEvent::EndEdit { param_id });
    }
}
