//! # Pembroke
//!
//! **Pembroke** is a small, embeddable, single-threaded event loop built for
//! timer-based scheduling with explicit cancellation.
//!
//! It provides:
//!
//! - A [`Reactor`] driving a monotonic timer queue on top of `epoll` and `timerfd`
//! - **One-shot** ([`DelayedEvent`]) and **repeating** ([`TimerEvent`]) timers
//! - A [`Scheduler`] turning a [`Task`] into a schedule behind a [`Cancelable`]
//! - A process-wide [`logging`] sink for the crate's diagnostics
//!
//! Every operation on a built reactor reports failure as `false` and logs the
//! reason; only building the reactor returns a [`Result`]. A panic escaping a
//! callback is caught and logged, and the loop keeps running.
//!
//! Cancellation is idempotent and reentrant: a timer may cancel itself from
//! inside its own callback, which prevents any further run.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pembroke::event::{Cancellable, TimerEvent};
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use std::time::Duration;
//!
//! let reactor = pembroke::reactor().build().expect("reactor");
//! let stop = reactor.handle();
//!
//! let count = Rc::new(Cell::new(0));
//! let timer = TimerEvent::new(Duration::from_millis(100), {
//!     let count = count.clone();
//!     move || {
//!         count.set(count.get() + 1);
//!         if count.get() == 5 {
//!             stop.stop();
//!         }
//!     }
//! });
//!
//! reactor.register(&timer);
//! reactor.run_blocking();
//! timer.cancel();
//! ```
//!
//! ## Modules
//!
//! - [`event`]: timer events and the `Event`/`Cancellable` traits
//! - [`scheduler`]: task scheduling and cancellation handles
//! - [`task`]: the unit of work run by the scheduler
//! - [`logging`]: the diagnostics sink

#[cfg(not(target_os = "linux"))]
compile_error!("pembroke currently only supports Linux (epoll + timerfd)");

mod error;
mod reactor;
mod utils;

pub mod event;
pub mod logging;
pub mod scheduler;
pub mod task;

pub use error::{ConfigurationError, LoggingError};
pub use event::{Cancellable, DelayedEvent, Event, TimerEvent};
pub use reactor::{Feature, Features, LoopState, Reactor, ReactorBuilder, ReactorHandle, reactor};
pub use scheduler::{Cancelable, Scheduler};
pub use task::{Task, TaskContext};
