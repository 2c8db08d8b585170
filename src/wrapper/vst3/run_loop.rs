//! CLAP plugins ask the host for timers and file descriptor callbacks on the main thread. On Linux
//! the only way for a VST3 plugin to get those is through the host's `IRunLoop`, and that only
//! becomes available once the editor is attached. This multiplexer keeps track of everything the
//! plugin registered, mirrors it onto the run loop while one is attached, and otherwise leaves it
//! to the idle handler to poll the timers.

use std::sync::{Arc, Weak};

use crate::host::{same_handler, EventHandler, FileDescriptor, RunLoop, TimerHandler};
use crate::plugin::{ClapId, PosixFdFlags};

/// Timers with a shorter period are raised to this period. This is also the default idle period.
pub const MIN_TIMER_PERIOD_MS: u32 = 30;
/// Timer IDs are the slot index plus this offset.
pub const TIMER_ID_OFFSET: ClapId = 1000;

/// The object that gets called back when a timer, file descriptor, or the idle handler fires. All
/// of these are called on the host's main thread.
pub trait RunLoopTarget: Send + Sync {
    fn on_timer(&self, timer_id: ClapId);
    fn on_fd(&self, fd: FileDescriptor, flags: PosixFdFlags);
    fn on_idle(&self);
}

#[derive(Clone)]
struct TimerSlot {
    timer_id: ClapId,
    /// 0 marks a free slot.
    period_ms: u32,
    next_tick: u64,
    /// Set while the timer is registered with the host's run loop.
    handler: Option<Arc<dyn TimerHandler>>,
}

#[derive(Clone)]
struct FdRegistration {
    fd: FileDescriptor,
    flags: PosixFdFlags,
    handler: Option<Arc<dyn EventHandler>>,
}

struct TimerTrampoline {
    target: Weak<dyn RunLoopTarget>,
    timer_id: ClapId,
}

struct IdleTrampoline {
    target: Weak<dyn RunLoopTarget>,
}

struct FdTrampoline {
    target: Weak<dyn RunLoopTarget>,
    flags: PosixFdFlags,
}

impl TimerHandler for TimerTrampoline {
    fn on_timer(&self) {
        if let Some(target) = self.target.upgrade() {
            target.on_timer(self.timer_id);
        }
    }
}

impl TimerHandler for IdleTrampoline {
    fn on_timer(&self) {
        if let Some(target) = self.target.upgrade() {
            target.on_idle();
        }
    }
}

impl EventHandler for FdTrampoline {
    fn on_fd_is_set(&self, fd: FileDescriptor) {
        if let Some(target) = self.target.upgrade() {
            target.on_fd(fd, self.flags);
        }
    }
}

/// Keeps the plugin's timers and file descriptors, and mirrors them onto the host's run loop.
pub struct RunLoopMultiplexer {
    target: Weak<dyn RunLoopTarget>,
    idle_interval_ms: u32,
    timers: Vec<TimerSlot>,
    fds: Vec<FdRegistration>,
    /// The last run loop the editor handed us.
    run_loop: Option<Arc<dyn RunLoop>>,
    /// Set while all registrations are live on `run_loop`.
    idle_handler: Option<Arc<dyn TimerHandler>>,
}

impl RunLoopMultiplexer {
    pub fn new(target: Weak<dyn RunLoopTarget>, idle_interval_ms: u32) -> Self {
        Self {
            target,
            idle_interval_ms: idle_interval_ms.max(MIN_TIMER_PERIOD_MS),
            timers: Vec::new(),
            fds: Vec::new(),
            run_loop: None,
            idle_handler: None,
        }
    }

    /// Whether the timers are currently driven by the host's run loop. If not, the idle handler
    /// needs to call [`poll_timers()`][Self::poll_timers()].
    pub fn is_attached(&self) -> bool {
        self.idle_handler.is_some()
    }

    pub fn has_run_loop(&self) -> bool {
        self.run_loop.is_some()
    }

    /// Attach to a run loop and register the idle handler and everything the plugin registered so
    /// far. Attaching to the same run loop again is harmless. When attaching to a different run
    /// loop, everything is moved over from the old one.
    pub fn attach(&mut self, run_loop: Arc<dyn RunLoop>) {
        if let Some(current) = &self.run_loop {
            if !same_handler(current, &run_loop) {
                self.suspend();
            }
        }

        self.run_loop = Some(run_loop);
        self.resume();
    }

    /// Unregister everything from the run loop and forget about it.
    pub fn detach(&mut self) {
        self.suspend();
        self.run_loop = None;
    }

    /// Unregister everything from the run loop, but keep the run loop around for
    /// [`resume()`][Self::resume()]. The timer and file descriptor slots are kept.
    pub fn suspend(&mut self) {
        let run_loop = self.run_loop.clone();
        let unregister_timer = |handler: Arc<dyn TimerHandler>| {
            if let Some(run_loop) = &run_loop {
                run_loop.unregister_timer(&handler);
            }
        };

        if let Some(idle_handler) = self.idle_handler.take() {
            unregister_timer(idle_handler);
        }
        for slot in &mut self.timers {
            if let Some(handler) = slot.handler.take() {
                unregister_timer(handler);
            }
        }
        for registration in &mut self.fds {
            if let (Some(handler), Some(run_loop)) = (registration.handler.take(), &run_loop) {
                run_loop.unregister_event_handler(&handler);
            }
        }
    }

    /// Unregister and forget all of the plugin's timers and file descriptors. Used when the plugin
    /// instance goes away, so the next instance starts with fresh timer IDs. The run loop itself is
    /// kept.
    pub fn clear(&mut self) {
        let was_attached = self.is_attached();
        self.suspend();
        self.timers.clear();
        self.fds.clear();
        if was_attached {
            self.resume();
        }
    }

    /// Register the idle handler and all known timers and file descriptors with the run loop we
    /// last attached to, if any.
    pub fn resume(&mut self) {
        let run_loop = match &self.run_loop {
            Some(run_loop) => run_loop.clone(),
            None => return,
        };

        if let Some(idle_handler) = self.idle_handler.take() {
            run_loop.unregister_timer(&idle_handler);
        }
        let idle_handler: Arc<dyn TimerHandler> = Arc::new(IdleTrampoline {
            target: self.target.clone(),
        });
        if !run_loop.register_timer(idle_handler.clone(), self.idle_interval_ms as u64) {
            bridge_warn!("The host's run loop rejected the idle timer");
            return;
        }
        self.idle_handler = Some(idle_handler);

        for index in 0..self.timers.len() {
            self.register_timer_handler(index);
        }
        for index in 0..self.fds.len() {
            self.register_fd_handler(index);
        }
    }

    /// Register a timer, returning its ID. Free slots are reused, so IDs of unregistered timers may
    /// be handed out again.
    pub fn register_timer(&mut self, period_ms: u32, now: u64) -> ClapId {
        let period_ms = period_ms.max(MIN_TIMER_PERIOD_MS);
        let index = match self.timers.iter().position(|slot| slot.period_ms == 0) {
            Some(index) => index,
            None => {
                self.timers.push(TimerSlot {
                    timer_id: 0,
                    period_ms: 0,
                    next_tick: 0,
                    handler: None,
                });

                self.timers.len() - 1
            }
        };

        let timer_id = index as ClapId + TIMER_ID_OFFSET;
        self.timers[index] = TimerSlot {
            timer_id,
            period_ms,
            next_tick: now + period_ms as u64,
            handler: None,
        };
        self.register_timer_handler(index);

        timer_id
    }

    /// Unregister a timer. Returns `false` if there is no active timer with this ID.
    pub fn unregister_timer(&mut self, timer_id: ClapId) -> bool {
        let slot = match timer_id
            .checked_sub(TIMER_ID_OFFSET)
            .and_then(|index| self.timers.get_mut(index as usize))
        {
            Some(slot) if slot.period_ms > 0 => slot,
            _ => return false,
        };

        slot.period_ms = 0;
        slot.next_tick = 0;
        if let (Some(handler), Some(run_loop)) = (slot.handler.take(), &self.run_loop) {
            run_loop.unregister_timer(&handler);
        }

        true
    }

    /// The number of active timers.
    pub fn num_timers(&self) -> usize {
        self.timers.iter().filter(|slot| slot.period_ms > 0).count()
    }

    /// Return the IDs of the timers that are due at `now`, and schedule their next tick. Does
    /// nothing while attached, since the run loop fires the timers then.
    pub fn poll_timers(&mut self, now: u64) -> Vec<ClapId> {
        if self.is_attached() {
            return Vec::new();
        }

        let mut due = Vec::new();
        for slot in &mut self.timers {
            if slot.period_ms > 0 && now >= slot.next_tick {
                slot.next_tick = now + slot.period_ms as u64;
                due.push(slot.timer_id);
            }
        }

        due
    }

    /// Start watching a file descriptor. Returns `false` if the descriptor is already registered.
    pub fn register_fd(&mut self, fd: FileDescriptor, flags: PosixFdFlags) -> bool {
        if self.fds.iter().any(|registration| registration.fd == fd) {
            return false;
        }

        self.fds.push(FdRegistration {
            fd,
            flags,
            handler: None,
        });
        self.register_fd_handler(self.fds.len() - 1);

        true
    }

    /// Change the flags for a file descriptor. Returns `false` if the descriptor is not registered.
    pub fn modify_fd(&mut self, fd: FileDescriptor, flags: PosixFdFlags) -> bool {
        let index = match self.fds.iter().position(|registration| registration.fd == fd) {
            Some(index) => index,
            None => return false,
        };

        self.fds[index].flags = flags;
        if let (Some(handler), Some(run_loop)) = (self.fds[index].handler.take(), &self.run_loop) {
            run_loop.unregister_event_handler(&handler);
        }
        self.register_fd_handler(index);

        true
    }

    /// Stop watching a file descriptor. Returns `false` if the descriptor is not registered.
    pub fn unregister_fd(&mut self, fd: FileDescriptor) -> bool {
        let index = match self.fds.iter().position(|registration| registration.fd == fd) {
            Some(index) => index,
            None => return false,
        };

        let registration = self.fds.swap_remove(index);
        if let (Some(handler), Some(run_loop)) = (registration.handler, &self.run_loop) {
            run_loop.unregister_event_handler(&handler);
        }

        true
    }

    pub fn num_fds(&self) -> usize {
        self.fds.len()
    }

    fn register_timer_handler(&mut self, index: usize) {
        let run_loop = match (&self.run_loop, self.is_attached()) {
            (Some(run_loop), true) => run_loop.clone(),
            _ => return,
        };

        let slot = &mut self.timers[index];
        if slot.period_ms == 0 || slot.handler.is_some() {
            return;
        }

        let handler: Arc<dyn TimerHandler> = Arc::new(TimerTrampoline {
            target: self.target.clone(),
            timer_id: slot.timer_id,
        });
        if run_loop.register_timer(handler.clone(), slot.period_ms as u64) {
            slot.handler = Some(handler);
        } else {
            bridge_warn!("The host's run loop rejected timer {}", slot.timer_id);
        }
    }

    fn register_fd_handler(&mut self, index: usize) {
        let run_loop = match (&self.run_loop, self.is_attached()) {
            (Some(run_loop), true) => run_loop.clone(),
            _ => return,
        };

        let registration = &mut self.fds[index];
        if registration.handler.is_some() {
            return;
        }

        let handler: Arc<dyn EventHandler> = Arc::new(FdTrampoline {
            target: self.target.clone(),
            flags: registration.flags,
        });
        if run_loop.register_event_handler(handler.clone(), registration.fd) {
            registration.handler = Some(handler);
        } else {
            bridge_warn!(
                "The host's run loop rejected file descriptor {}",
                registration.fd
            );
        }
    }
}

impl Drop for RunLoopMultiplexer {
    fn drop(&mut self) {
        self.detach();
    }
}
