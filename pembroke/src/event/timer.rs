use super::{Cancellable, Event, EventCore};
use crate::Reactor;
use crate::reactor::context::{LoopContext, Trampoline};
use crate::reactor::timer::NativeHandle;
use crate::task::contain;

use std::cell::Cell;
use std::rc::{Rc, Weak};
use std::time::Duration;

/// A timer that fires repeatedly.
///
/// The first run happens `initial_delay` after registration, every later
/// run `interval` after the previous callback **returned**: runs never
/// overlap, and a callback taking 1s with an interval of 2s starts every
/// 3s.
///
/// The timer keeps re-arming itself until it is canceled. Canceling from
/// inside its own callback is allowed and prevents the next run.
#[derive(Clone)]
pub struct TimerEvent {
    inner: Rc<TimerInner>,
}

struct TimerInner {
    initial_delay: Duration,
    interval: Duration,
    first_run: Cell<bool>,
    core: EventCore<Box<dyn FnMut()>>,
}

impl TimerEvent {
    /// Creates a timer whose first run also waits `interval`.
    pub fn new<F>(interval: Duration, callback: F) -> Self
    where
        F: FnMut() + 'static,
    {
        Self::with_initial_delay(interval, interval, callback)
    }

    /// Creates a timer whose first run waits `initial_delay`.
    pub fn with_initial_delay<F>(initial_delay: Duration, interval: Duration, callback: F) -> Self
    where
        F: FnMut() + 'static,
    {
        Self {
            inner: Rc::new(TimerInner {
                initial_delay,
                interval,
                first_run: Cell::new(true),
                core: EventCore::new("timer event", Box::new(callback)),
            }),
        }
    }

    pub fn initial_delay(&self) -> Duration {
        self.inner.initial_delay
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    /// Returns `true` while a native timer is armed for this event.
    pub fn is_registered(&self) -> bool {
        self.inner.core.is_registered()
    }
}

impl TimerInner {
    fn next_delay(&self) -> Duration {
        if self.first_run.get() {
            self.initial_delay
        } else {
            self.interval
        }
    }
}

impl Event for TimerEvent {
    fn register(&self, reactor: &Reactor) -> bool {
        let trampoline: Weak<TimerInner> = Rc::downgrade(&self.inner);
        self.inner
            .core
            .arm(reactor, self.inner.next_delay(), trampoline)
    }
}

impl Cancellable for TimerEvent {
    fn cancel(&self) -> bool {
        self.inner.core.cancel()
    }

    fn canceled(&self) -> bool {
        self.inner.core.canceled()
    }
}

impl Trampoline for TimerInner {
    fn fire(self: Rc<Self>, context: &Rc<LoopContext>, handle: NativeHandle) {
        if !self.core.owns(handle) {
            context.release(handle);
            return;
        }

        if self.core.canceled() {
            self.core.close();
            return;
        }

        let Some(mut callback) = self.core.take_callback() else {
            self.core.close();
            return;
        };

        contain("a timer event", || callback());

        self.core.close();
        self.first_run.set(false);

        // Canceled from inside the callback: drop it instead of re-arming.
        if self.core.canceled() {
            return;
        }

        self.core.restore_callback(callback);

        let trampoline: Weak<TimerInner> = Rc::downgrade(&self);
        if !self.core.attach(context, self.interval, trampoline) {
            log::error!(target: "pembroke::event", "Failed to re-arm timer event on the reactor");
        }
    }
}
