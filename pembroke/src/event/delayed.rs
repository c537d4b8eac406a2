use super::{Cancellable, Event, EventCore};
use crate::Reactor;
use crate::reactor::context::{LoopContext, Trampoline};
use crate::reactor::timer::NativeHandle;
use crate::task::contain;

use std::rc::{Rc, Weak};
use std::time::Duration;

/// A timer that fires once after a delay.
///
/// Nothing is armed until the event is registered. Once fired, the event
/// behaves as if canceled: [`canceled`](Cancellable::canceled) reports
/// `true` and it cannot be registered again.
///
/// # Examples
///
/// ```rust,no_run
/// use pembroke::event::{Cancellable, DelayedEvent};
/// use std::time::Duration;
///
/// let reactor = pembroke::reactor().build().expect("reactor");
/// let event = DelayedEvent::new(Duration::from_secs(1), || println!("too late"));
///
/// assert!(reactor.register(&event));
/// assert!(event.cancel());
/// ```
#[derive(Clone)]
pub struct DelayedEvent {
    inner: Rc<DelayedInner>,
}

struct DelayedInner {
    delay: Duration,
    core: EventCore<Box<dyn FnOnce()>>,
}

impl DelayedEvent {
    /// Creates an unregistered event running `callback` after `delay`.
    pub fn new<F>(delay: Duration, callback: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self {
            inner: Rc::new(DelayedInner {
                delay,
                core: EventCore::new("delayed event", Box::new(callback)),
            }),
        }
    }

    /// Delay between registration and firing.
    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    /// Returns `true` while a native timer is armed for this event.
    pub fn is_registered(&self) -> bool {
        self.inner.core.is_registered()
    }
}

impl Event for DelayedEvent {
    fn register(&self, reactor: &Reactor) -> bool {
        let trampoline: Weak<DelayedInner> = Rc::downgrade(&self.inner);
        self.inner.core.arm(reactor, self.inner.delay, trampoline)
    }
}

impl Cancellable for DelayedEvent {
    fn cancel(&self) -> bool {
        self.inner.core.cancel()
    }

    fn canceled(&self) -> bool {
        self.inner.core.canceled()
    }
}

impl Trampoline for DelayedInner {
    fn fire(self: Rc<Self>, context: &Rc<LoopContext>, handle: NativeHandle) {
        if !self.core.owns(handle) {
            context.release(handle);
            return;
        }

        if let Some(callback) = self.core.take_callback() {
            contain("a delayed event", callback);
        }

        self.core.close();
        self.core.mark_canceled();
    }
}
