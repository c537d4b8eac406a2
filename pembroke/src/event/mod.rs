//! Timer events.
//!
//! Two kinds of timers are provided:
//! - [`DelayedEvent`] fires once after a delay,
//! - [`TimerEvent`] fires repeatedly with a fixed interval between the end
//!   of one run and the start of the next.
//!
//! Both are cheap, cloneable handles to shared state. Cloning shares the
//! timer; dropping the last handle disarms it.

mod delayed;
mod timer;

pub use delayed::DelayedEvent;
pub use timer::TimerEvent;

use crate::Reactor;
use crate::reactor::context::{LoopContext, Registration, Trampoline};
use crate::reactor::timer::NativeHandle;

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Something that can be armed on a [`Reactor`].
pub trait Event {
    /// Arms the event on `reactor`.
    ///
    /// Returns `false` (and logs why) if the event was canceled or is
    /// already registered.
    fn register(&self, reactor: &Reactor) -> bool;
}

/// Something that can be canceled.
pub trait Cancellable {
    /// Cancels the pending work.
    ///
    /// Idempotent: canceling something that already ran or was already
    /// canceled succeeds without side effects. Returns `false` only if
    /// disarming failed.
    fn cancel(&self) -> bool;

    /// Returns `true` once canceled (or, for one-shot events, fired).
    fn canceled(&self) -> bool;
}

/// State shared by every timer kind.
///
/// `C` is the boxed callback type. The callback is moved out of its cell
/// while it runs, so the callback itself may cancel, re-register or drop
/// the timer it belongs to.
pub(crate) struct EventCore<C> {
    kind: &'static str,
    callback: RefCell<Option<C>>,
    registration: RefCell<Option<Registration>>,
    canceled: Cell<bool>,
}

impl<C> EventCore<C> {
    pub(crate) fn new(kind: &'static str, callback: C) -> Self {
        Self {
            kind,
            callback: RefCell::new(Some(callback)),
            registration: RefCell::new(None),
            canceled: Cell::new(false),
        }
    }

    /// Arms a native timer for `delay`, unless canceled or already armed.
    pub(crate) fn arm(
        &self,
        reactor: &Reactor,
        delay: Duration,
        trampoline: Weak<dyn Trampoline>,
    ) -> bool {
        if self.canceled.get() {
            log::warn!(target: "pembroke::event", "Attempting to register canceled {}", self.kind);
            return false;
        }

        if self.registration.borrow().is_some() {
            log::error!(
                target: "pembroke::event",
                "Attempting to register {} twice. Create a new event or use the scheduler",
                self.kind
            );
            return false;
        }

        self.attach(reactor.context(), delay, trampoline)
    }

    /// Arms on `context` without the checks of [`arm`](Self::arm).
    ///
    /// Used to re-arm from inside a dispatch, where only the loop context
    /// is at hand.
    pub(crate) fn attach(
        &self,
        context: &Rc<LoopContext>,
        delay: Duration,
        trampoline: Weak<dyn Trampoline>,
    ) -> bool {
        match Registration::arm(context, delay, trampoline) {
            Some(registration) => {
                *self.registration.borrow_mut() = Some(registration);
                true
            }
            None => false,
        }
    }

    /// Returns `true` if the live registration holds `handle`.
    pub(crate) fn owns(&self, handle: NativeHandle) -> bool {
        self.registration
            .borrow()
            .as_ref()
            .is_some_and(|registration| registration.holds(handle))
    }

    /// Releases the live registration, if any.
    pub(crate) fn close(&self) -> bool {
        let registration = self.registration.borrow_mut().take();
        match registration {
            Some(mut registration) => registration.release(),
            None => true,
        }
    }

    /// Cancels the timer: terminal, and the callback is dropped.
    pub(crate) fn cancel(&self) -> bool {
        self.canceled.set(true);
        let released = self.close();

        let callback = self.callback.borrow_mut().take();
        drop(callback);

        released
    }

    pub(crate) fn canceled(&self) -> bool {
        self.canceled.get()
    }

    pub(crate) fn mark_canceled(&self) {
        self.canceled.set(true);
    }

    pub(crate) fn take_callback(&self) -> Option<C> {
        self.callback.borrow_mut().take()
    }

    pub(crate) fn restore_callback(&self, callback: C) {
        *self.callback.borrow_mut() = Some(callback);
    }

    pub(crate) fn is_registered(&self) -> bool {
        self.registration.borrow().is_some()
    }
}
