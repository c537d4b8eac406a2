//! Task scheduling on top of the reactor timers.
//!
//! The [`Scheduler`] turns a [`Task`] plus timing parameters into an armed
//! schedule and hands back a [`Cancelable`]. Every public method goes through
//! one private funnel that allocates the schedule, arms it and wires the
//! returned handle to it.
//!
//! Schedules are owned by the reactor's live set, not by the handle: dropping
//! every `Cancelable` does not stop a repeating schedule.

use crate::Reactor;
use crate::event::Cancellable;
use crate::reactor::context::{LoopContext, Trampoline};
use crate::reactor::timer::NativeHandle;
use crate::task::{Task, TaskContext, contain};

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Submits tasks to a [`Reactor`].
///
/// Obtained with [`Reactor::scheduler`]. It borrows the reactor, so it cannot
/// outlive it; the [`Cancelable`] handles it returns can, and become inert
/// once the reactor is dropped.
///
/// # Examples
///
/// ```rust,no_run
/// use std::time::Duration;
///
/// let reactor = pembroke::reactor().build().expect("reactor");
/// let scheduler = reactor.scheduler();
///
/// let heartbeat = scheduler.repeat(
///     || println!("beat"),
///     Duration::ZERO,
///     Duration::from_secs(1),
/// );
///
/// let stop = reactor.handle();
/// scheduler.once(move || { stop.stop(); }, Duration::from_secs(5));
///
/// reactor.run_blocking();
/// heartbeat.cancel();
/// ```
pub struct Scheduler<'r> {
    reactor: &'r Reactor,
}

impl<'r> Scheduler<'r> {
    pub(crate) fn new(reactor: &'r Reactor) -> Self {
        Self { reactor }
    }

    /// Runs `task` once, `delay` from now.
    pub fn once(&self, task: impl Into<Task>, delay: Duration) -> Cancelable {
        self.schedule(task.into(), delay, Duration::ZERO, Repeat::Once)
    }

    /// Runs `task` after `delay`, then again `interval` after each run
    /// returns, until canceled.
    pub fn repeat(&self, task: impl Into<Task>, delay: Duration, interval: Duration) -> Cancelable {
        self.schedule(task.into(), delay, interval, Repeat::Forever)
    }

    /// Like [`repeat`](Self::repeat), but stops once `done` returns `true`.
    ///
    /// `done` is evaluated after every run of `task`, so the task always runs
    /// at least once. A panicking predicate stops the schedule.
    pub fn repeat_until<P>(
        &self,
        task: impl Into<Task>,
        delay: Duration,
        interval: Duration,
        done: P,
    ) -> Cancelable
    where
        P: FnMut() -> bool + 'static,
    {
        self.schedule(task.into(), delay, interval, Repeat::Until(Box::new(done)))
    }

    /// Like [`repeat`](Self::repeat), but runs `task` at most `times` times.
    pub fn repeat_n(
        &self,
        task: impl Into<Task>,
        delay: Duration,
        interval: Duration,
        times: u64,
    ) -> Cancelable {
        if times == 0 {
            log::debug!(target: "pembroke::scheduler", "Ignoring schedule with zero repetitions");
            return Cancelable::finished();
        }

        self.schedule(task.into(), delay, interval, Repeat::Times(times))
    }

    fn schedule(&self, task: Task, delay: Duration, interval: Duration, repeat: Repeat) -> Cancelable {
        let context = self.reactor.context();
        let key = context.next_schedule_key();

        let cleanup = {
            let context = Rc::downgrade(context);
            move || {
                if let Some(context) = context.upgrade() {
                    context.forget_schedule(key);
                }
            }
        };

        let schedule = Rc::new(EventContext::new(key, task, interval, repeat, Box::new(cleanup)));

        let trampoline: Weak<EventContext> = Rc::downgrade(&schedule);
        let Some(handle) = context.arm(delay, trampoline) else {
            log::error!(target: "pembroke::scheduler", "Unable to schedule task {key}");
            schedule.finish();
            return Cancelable::finished();
        };

        schedule.native.set(Some(handle));
        let finished = schedule.finished.clone();
        context.adopt_schedule(schedule);
        log::trace!(target: "pembroke::scheduler", "Scheduled task {key} in {delay:?}");

        let context = Rc::downgrade(context);
        Cancelable::tracking(finished, move || {
            let Some(context) = context.upgrade() else {
                return true;
            };

            let schedule = context.schedule(key);
            match schedule {
                Some(schedule) => schedule.cancel(&context),
                None => true,
            }
        })
    }
}

enum Repeat {
    Once,
    Forever,
    Times(u64),
    Until(Box<dyn FnMut() -> bool>),
}

/// A live schedule.
///
/// Owned by the reactor's live set under its unique `key` until it
/// finishes; the native timer only holds a weak reference to it.
pub(crate) struct EventContext {
    key: u64,
    task: RefCell<Option<Task>>,
    interval: Duration,
    repeat: RefCell<Repeat>,
    native: Cell<Option<NativeHandle>>,

    /// Runs exactly once, when the schedule finishes.
    cleanup: RefCell<Option<Box<dyn FnOnce()>>>,

    fired: Cell<u64>,

    /// Shared with the returned [`Cancelable`].
    finished: Rc<Cell<bool>>,
}

impl EventContext {
    fn new(
        key: u64,
        task: Task,
        interval: Duration,
        repeat: Repeat,
        cleanup: Box<dyn FnOnce()>,
    ) -> Self {
        Self {
            key,
            task: RefCell::new(Some(task)),
            interval,
            repeat: RefCell::new(repeat),
            native: Cell::new(None),
            cleanup: RefCell::new(Some(cleanup)),
            fired: Cell::new(0),
            finished: Rc::new(Cell::new(false)),
        }
    }

    pub(crate) fn key(&self) -> u64 {
        self.key
    }

    /// Disarms the pending run, if any, and finishes the schedule.
    pub(crate) fn cancel(&self, context: &LoopContext) -> bool {
        if self.finished.get() {
            return true;
        }

        let released = match self.native.take() {
            Some(handle) => context.disarm(handle),
            None => true,
        };

        log::trace!(target: "pembroke::scheduler", "Canceled task {}", self.key);
        self.finish();
        released
    }

    fn finish(&self) {
        if self.finished.replace(true) {
            return;
        }

        let task = self.task.borrow_mut().take();
        drop(task);

        let cleanup = self.cleanup.borrow_mut().take();
        if let Some(cleanup) = cleanup {
            cleanup();
        }
    }

    /// Returns `true` if no run should follow run number `iteration`.
    fn exhausted(&self, iteration: u64) -> bool {
        let mut repeat = self.repeat.replace(Repeat::Once);

        let exhausted = match &mut repeat {
            Repeat::Once => true,
            Repeat::Forever => false,
            Repeat::Times(times) => iteration >= *times,
            Repeat::Until(done) => contain("a repeat_until predicate", || done()).unwrap_or(true),
        };

        *self.repeat.borrow_mut() = repeat;
        exhausted
    }
}

impl Trampoline for EventContext {
    fn fire(self: Rc<Self>, context: &Rc<LoopContext>, handle: NativeHandle) {
        if self.native.get() != Some(handle) {
            context.release(handle);
            return;
        }

        self.native.set(None);
        context.disarm(handle);

        if self.finished.get() {
            return;
        }

        let task = self.task.borrow_mut().take();
        let Some(mut task) = task else {
            self.finish();
            return;
        };

        let iteration = self.fired.get() + 1;
        self.fired.set(iteration);

        let mut ctx = TaskContext::new(self.key, iteration);
        task.run(&mut ctx);

        // Canceled through its handle while running.
        if self.finished.get() {
            return;
        }

        if ctx.is_canceled() || self.exhausted(iteration) {
            drop(task);
            self.finish();
            return;
        }

        *self.task.borrow_mut() = Some(task);

        let trampoline: Weak<EventContext> = Rc::downgrade(&self);
        match context.arm(self.interval, trampoline) {
            Some(handle) => self.native.set(Some(handle)),
            None => {
                log::error!(target: "pembroke::scheduler", "Failed to re-arm task {}", self.key);
                self.finish();
            }
        }
    }
}

/// Shared handle canceling a piece of scheduled work.
///
/// Clones share the same cancellation: canceling through any of them cancels
/// for all, and canceling again is a no-op that reports success.
///
/// Canceling from inside the task being canceled is allowed and prevents any
/// further run.
#[derive(Clone)]
pub struct Cancelable {
    inner: Rc<CancelableInner>,
}

struct CancelableInner {
    cancel: Box<dyn Fn() -> bool>,
    canceled: Cell<bool>,
    finished: Rc<Cell<bool>>,
}

impl Cancelable {
    /// Wraps `cancel`, which is called at most once.
    ///
    /// Its return value is what the first [`cancel`](Self::cancel) reports.
    pub fn new<F>(cancel: F) -> Self
    where
        F: Fn() -> bool + 'static,
    {
        Self::tracking(Rc::new(Cell::new(false)), cancel)
    }

    /// Wraps `cancel` for work that reports its own completion in `finished`.
    pub(crate) fn tracking<F>(finished: Rc<Cell<bool>>, cancel: F) -> Self
    where
        F: Fn() -> bool + 'static,
    {
        Self {
            inner: Rc::new(CancelableInner {
                cancel: Box::new(cancel),
                canceled: Cell::new(false),
                finished,
            }),
        }
    }

    /// A handle for work that will never run.
    pub(crate) fn finished() -> Self {
        Self::tracking(Rc::new(Cell::new(true)), || true)
    }

    /// Cancels the work.
    ///
    /// Returns `true` if the work will not run again. Returns `false` only if
    /// disarming the pending run failed.
    pub fn cancel(&self) -> bool {
        if self.inner.canceled.replace(true) {
            return true;
        }

        (self.inner.cancel)()
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called, or once
    /// the scheduled work finished on its own and will not run again.
    pub fn canceled(&self) -> bool {
        self.inner.canceled.get() || self.inner.finished.get()
    }
}

impl Cancellable for Cancelable {
    fn cancel(&self) -> bool {
        Cancelable::cancel(self)
    }

    fn canceled(&self) -> bool {
        Cancelable::canceled(self)
    }
}

impl fmt::Debug for Cancelable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancelable")
            .field("canceled", &self.canceled())
            .finish_non_exhaustive()
    }
}
