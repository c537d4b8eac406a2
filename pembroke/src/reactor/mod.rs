//! Reactor core.
//!
//! This module implements the event loop of the crate. The reactor is
//! responsible for:
//! - owning the OS-level loop context (see the `poller` module),
//! - keeping the monotonic timer queue and the native handle table,
//! - dispatching expired timers to the object that armed them.
//!
//! Timers and the scheduler never hold the reactor itself, only a weak
//! reference to its loop context. A timer that outlives its reactor is
//! inert: it never fires and cancelling it succeeds trivially.

mod builder;
mod poller;

pub(crate) mod context;
pub(crate) mod timer;

pub use builder::{Feature, Features, ReactorBuilder, reactor};

use crate::event::Event;
use crate::scheduler::Scheduler;
use context::{LoopContext, RunMode};

use std::rc::{Rc, Weak};

/// Lifecycle of a reactor's loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Never driven, or the last drive call returned on its own.
    Idle,
    /// Inside `run_blocking`, `tick` or `tick_fast`.
    Running,
    /// The last drive call returned because of [`Reactor::stop`].
    Stopped,
}

/// The main event loop.
///
/// A `Reactor` owns exactly one loop context. It is single-threaded: it is
/// neither `Send` nor `Sync`, and every timer registered on it must be
/// driven from the thread that created it.
///
/// # Examples
///
/// ```rust,no_run
/// use pembroke::event::DelayedEvent;
/// use std::time::Duration;
///
/// let reactor = pembroke::reactor().build().expect("reactor");
/// let event = DelayedEvent::new(Duration::from_millis(5), || println!("fired"));
///
/// assert!(reactor.register(&event));
/// reactor.tick();
/// ```
pub struct Reactor {
    context: Rc<LoopContext>,
}

impl Reactor {
    /// Returns a builder with the default configuration.
    pub fn builder() -> ReactorBuilder {
        ReactorBuilder::new()
    }

    pub(crate) fn from_context(context: Rc<LoopContext>) -> Self {
        Self { context }
    }

    pub(crate) fn context(&self) -> &Rc<LoopContext> {
        &self.context
    }

    /// Runs the reactor until [`stop`](Self::stop) is called.
    ///
    /// The loop does not exit merely because nothing is armed; stopping it
    /// is normally done from inside a callback (see [`handle`](Self::handle)).
    /// It can be resumed by calling this method again.
    ///
    /// Returns `true` if the loop ran without a backend error.
    pub fn run_blocking(&self) -> bool {
        self.drive(RunMode::Blocking)
    }

    /// Runs the event loop once.
    ///
    /// If timers are already due, waits for their callbacks to run before
    /// returning. Otherwise performs a single non-blocking poll.
    ///
    /// Returns `true` if the loop ran without a backend error.
    pub fn tick(&self) -> bool {
        if self.context.has_active() {
            self.drive(RunMode::Once)
        } else {
            self.drive(RunMode::NonBlocking)
        }
    }

    /// Runs the callbacks of the timers that are ready now, never waiting.
    ///
    /// Returns `true` if the loop ran without a backend error.
    pub fn tick_fast(&self) -> bool {
        self.drive(RunMode::NonBlocking)
    }

    /// Stops the reactor, returning control to the caller of the running
    /// drive method once the current callback completes.
    ///
    /// Timers that are due but were not dispatched yet stay armed for the
    /// next drive call. If the reactor is not running this has no effect.
    pub fn stop(&self) -> bool {
        self.context.request_stop();
        true
    }

    /// Registers `event` on this reactor.
    ///
    /// Returns `false` if the event was canceled or is already registered.
    pub fn register<E: Event + ?Sized>(&self, event: &E) -> bool {
        event.register(self)
    }

    /// Returns a [`Scheduler`] submitting tasks to this reactor.
    pub fn scheduler(&self) -> Scheduler<'_> {
        Scheduler::new(self)
    }

    /// Returns a weak handle that callbacks can capture to stop the loop.
    pub fn handle(&self) -> ReactorHandle {
        ReactorHandle {
            context: Rc::downgrade(&self.context),
        }
    }

    /// Current lifecycle state of the loop.
    pub fn state(&self) -> LoopState {
        self.context.state()
    }

    /// Features negotiated with the backend when this reactor was built.
    pub fn features(&self) -> Features {
        self.context.features()
    }

    /// Number of armed timers.
    pub fn pending(&self) -> usize {
        self.context.pending()
    }

    fn drive(&self, mode: RunMode) -> bool {
        if self.context.state() == LoopState::Running {
            log::error!(target: "pembroke::reactor", "Attempting to drive the reactor ({mode:?}) from inside one of its callbacks");
            return false;
        }

        match self.context.run(mode) {
            Ok(()) => true,
            Err(err) => {
                log::error!(target: "pembroke::critical", "Reactor backend failed: {err}");
                false
            }
        }
    }
}

/// Cloneable, non-owning handle to a [`Reactor`].
///
/// Intended to be captured by callbacks. Once the reactor is dropped every
/// method is a no-op.
#[derive(Clone)]
pub struct ReactorHandle {
    context: Weak<LoopContext>,
}

impl ReactorHandle {
    /// Same as [`Reactor::stop`].
    pub fn stop(&self) -> bool {
        if let Some(context) = self.context.upgrade() {
            context.request_stop();
        }
        true
    }

    /// State of the reactor, or `None` if it has been dropped.
    pub fn state(&self) -> Option<LoopState> {
        self.context.upgrade().map(|context| context.state())
    }

    /// Returns `true` while the reactor is alive.
    pub fn is_alive(&self) -> bool {
        self.context.strong_count() > 0
    }
}
