use super::LoopState;
use super::builder::Features;
use super::poller::Poller;
use super::timer::{NativeHandle, TimerQueue};
use crate::scheduler::EventContext;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

/// Receiver of a native timer expiry.
///
/// The loop resolves an expired [`NativeHandle`] to a `Weak<dyn Trampoline>`
/// through the handle table and calls [`fire`](Trampoline::fire) on it. An
/// implementor owns the handle it was armed with and must release it
/// (through [`LoopContext::disarm`]) before or during `fire`.
pub(crate) trait Trampoline {
    fn fire(self: Rc<Self>, context: &Rc<LoopContext>, handle: NativeHandle);
}

/// How far a single drive call goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunMode {
    /// Until a stop request, even with nothing armed.
    Blocking,
    /// Until one expired batch has been dispatched.
    Once,
    /// Dispatch what is due now and return.
    NonBlocking,
}

/// The loop context owned by a [`Reactor`](super::Reactor).
///
/// Everything lives behind `Cell`/`RefCell` because callbacks re-enter the
/// context (to cancel, re-arm or stop) while it is being driven. No borrow
/// is ever held across a call into user code.
pub(crate) struct LoopContext {
    poller: RefCell<Poller>,
    timers: RefCell<TimerQueue>,

    state: Cell<LoopState>,
    break_requested: Cell<bool>,
    features: Features,

    /// Live scheduler entries, keyed by their unique key.
    schedules: RefCell<HashMap<u64, Rc<EventContext>>>,
    next_key: Cell<u64>,
}

impl LoopContext {
    pub(crate) fn new(poller: Poller, features: Features) -> Rc<Self> {
        Rc::new(Self {
            poller: RefCell::new(poller),
            timers: RefCell::new(TimerQueue::new()),
            state: Cell::new(LoopState::Idle),
            break_requested: Cell::new(false),
            features,
            schedules: RefCell::new(HashMap::new()),
            next_key: Cell::new(0),
        })
    }

    pub(crate) fn features(&self) -> Features {
        self.features
    }

    pub(crate) fn state(&self) -> LoopState {
        self.state.get()
    }

    /// Number of armed native timers.
    pub(crate) fn pending(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Arms a native timer firing `trampoline` after `delay`.
    pub(crate) fn arm(
        &self,
        delay: Duration,
        trampoline: Weak<dyn Trampoline>,
    ) -> Option<NativeHandle> {
        let handle = self.timers.borrow_mut().arm(delay, trampoline);
        if handle.is_none() {
            log::error!(target: "pembroke::reactor", "Unable to arm timer: delay of {delay:?} overflows the monotonic clock");
        }
        handle
    }

    /// Frees `handle`. Returns `false` if it was not armed.
    pub(crate) fn disarm(&self, handle: NativeHandle) -> bool {
        let released = self.timers.borrow_mut().disarm(handle);
        if !released {
            log::warn!(target: "pembroke::reactor", "Failed to disarm timer {handle:?}: handle is not armed");
        }
        released
    }

    /// Frees `handle` if it is still armed, without complaining otherwise.
    pub(crate) fn release(&self, handle: NativeHandle) {
        self.timers.borrow_mut().disarm(handle);
    }

    /// Allocates a key no other schedule of this loop has used.
    pub(crate) fn next_schedule_key(&self) -> u64 {
        let key = self.next_key.get() + 1;
        self.next_key.set(key);
        key
    }

    pub(crate) fn adopt_schedule(&self, schedule: Rc<EventContext>) {
        let key = schedule.key();
        let previous = self.schedules.borrow_mut().insert(key, schedule);
        debug_assert!(previous.is_none(), "schedule key {key} reused");
    }

    pub(crate) fn schedule(&self, key: u64) -> Option<Rc<EventContext>> {
        self.schedules.borrow().get(&key).cloned()
    }

    pub(crate) fn forget_schedule(&self, key: u64) {
        let removed = self.schedules.borrow_mut().remove(&key);
        drop(removed);
    }

    /// Requests the running drive call to return after the current callback.
    ///
    /// A no-op while the loop is not running.
    pub(crate) fn request_stop(&self) {
        if self.state.get() == LoopState::Running {
            self.break_requested.set(true);
        }
    }

    /// Drives the loop in `mode`.
    pub(crate) fn run(self: &Rc<Self>, mode: RunMode) -> io::Result<()> {
        if self.state.get() == LoopState::Running {
            return Err(io::Error::other("reactor is already running"));
        }

        self.break_requested.set(false);
        self.state.set(LoopState::Running);

        let result = self.drive(mode);

        self.state.set(if self.break_requested.replace(false) {
            LoopState::Stopped
        } else {
            LoopState::Idle
        });

        result
    }

    /// Returns `true` if a timer is due now (the "active" batch).
    pub(crate) fn has_active(&self) -> bool {
        self.timers.borrow_mut().has_expired(Instant::now())
    }

    fn drive(self: &Rc<Self>, mode: RunMode) -> io::Result<()> {
        loop {
            let timeout = match mode {
                RunMode::NonBlocking => Some(Duration::ZERO),
                RunMode::Once | RunMode::Blocking => {
                    let next = self.timers.borrow_mut().next_deadline();
                    match next {
                        Some(deadline) => Some(deadline.saturating_duration_since(Instant::now())),
                        None if mode == RunMode::Once => return Ok(()),
                        None => None,
                    }
                }
            };

            self.poller.borrow_mut().poll(timeout)?;

            let batch = self.timers.borrow_mut().expire(Instant::now());
            let fired = !batch.is_empty();
            self.dispatch(batch);

            if self.break_requested.get() {
                return Ok(());
            }

            match mode {
                RunMode::NonBlocking => return Ok(()),
                RunMode::Once if fired => return Ok(()),
                _ => {}
            }
        }
    }

    fn dispatch(self: &Rc<Self>, batch: Vec<super::timer::TimerEntry>) {
        let mut pending = batch.into_iter();

        while let Some(entry) = pending.next() {
            let trampoline = self.timers.borrow().trampoline(entry.handle);

            // Disarmed by an earlier callback of the same batch.
            let Some(trampoline) = trampoline else {
                continue;
            };

            match trampoline.upgrade() {
                Some(trampoline) => trampoline.fire(self, entry.handle),
                None => self.release(entry.handle),
            }

            if self.break_requested.get() {
                self.timers.borrow_mut().requeue(pending);
                return;
            }
        }
    }
}

/// An armed native timer owned by exactly one timer object.
///
/// The handle lives in an `Option` that is taken before it is released, so
/// releasing twice is impossible. Dropping a registration releases it.
pub(crate) struct Registration {
    context: Weak<LoopContext>,
    handle: Option<NativeHandle>,
}

impl Registration {
    /// Arms a native timer on `context` for `delay`.
    pub(crate) fn arm(
        context: &Rc<LoopContext>,
        delay: Duration,
        trampoline: Weak<dyn Trampoline>,
    ) -> Option<Self> {
        let handle = context.arm(delay, trampoline)?;

        Some(Self {
            context: Rc::downgrade(context),
            handle: Some(handle),
        })
    }

    /// Returns `true` if this registration holds `handle`.
    pub(crate) fn holds(&self, handle: NativeHandle) -> bool {
        self.handle == Some(handle)
    }

    /// Disarms and frees the native handle.
    ///
    /// Returns what the disarm reported; releasing an already released
    /// registration, or one whose reactor is gone, succeeds trivially.
    pub(crate) fn release(&mut self) -> bool {
        let Some(handle) = self.handle.take() else {
            return true;
        };

        match self.context.upgrade() {
            Some(context) => context.disarm(handle),
            None => true,
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.release();
    }
}
