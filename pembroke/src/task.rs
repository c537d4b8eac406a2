//! Units of work run by the [`Scheduler`](crate::Scheduler).
//!
//! A [`Task`] wraps either a zero-argument closure or a closure taking a
//! [`TaskContext`]. It does not decide when or how often it runs; that is
//! up to whoever owns it.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Context handed to a task on every run.
///
/// Tasks created with [`Task::with_context`] can read which schedule and
/// iteration they belong to, and stop their own schedule.
#[derive(Debug, Default)]
pub struct TaskContext {
    key: u64,
    iteration: u64,
    canceled: bool,
}

impl TaskContext {
    /// Creates a context for run number `iteration` of schedule `key`.
    pub fn new(key: u64, iteration: u64) -> Self {
        Self {
            key,
            iteration,
            canceled: false,
        }
    }

    /// Key of the schedule running the task (`0` outside a scheduler).
    pub fn key(&self) -> u64 {
        self.key
    }

    /// 1-based number of the current run.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Requests that the task is not run again.
    ///
    /// The request is honoured once the task returns.
    pub fn cancel(&mut self) {
        self.canceled = true;
    }

    /// Returns `true` if [`cancel`](Self::cancel) was called.
    pub fn is_canceled(&self) -> bool {
        self.canceled
    }
}

enum TaskFn {
    Plain(Box<dyn FnMut()>),
    WithContext(Box<dyn FnMut(&mut TaskContext)>),
}

/// A unit of work.
///
/// # Examples
///
/// ```rust
/// use pembroke::{Task, TaskContext};
///
/// let mut plain = Task::new(|| println!("plain"));
/// let mut counted = Task::with_context(|ctx: &mut TaskContext| {
///     if ctx.iteration() == 3 {
///         ctx.cancel();
///     }
/// });
///
/// plain.run(&mut TaskContext::default());
/// counted.run(&mut TaskContext::new(1, 3));
/// ```
pub struct Task {
    function: TaskFn,
}

impl Task {
    /// Creates a task from a zero-argument closure.
    pub fn new<F>(f: F) -> Self
    where
        F: FnMut() + 'static,
    {
        Self {
            function: TaskFn::Plain(Box::new(f)),
        }
    }

    /// Creates a task from a closure receiving the [`TaskContext`].
    pub fn with_context<F>(f: F) -> Self
    where
        F: FnMut(&mut TaskContext) + 'static,
    {
        Self {
            function: TaskFn::WithContext(Box::new(f)),
        }
    }

    /// Runs the wrapped closure.
    ///
    /// A panic raised by the closure is caught and logged; it never reaches
    /// the caller. Returns `false` if the closure panicked.
    pub fn run(&mut self, ctx: &mut TaskContext) -> bool {
        let function = &mut self.function;

        contain("a task", || match function {
            TaskFn::Plain(f) => f(),
            TaskFn::WithContext(f) => f(ctx),
        })
        .is_some()
    }
}

impl Default for Task {
    /// A task that does nothing.
    fn default() -> Self {
        Self::new(|| {})
    }
}

impl<F> From<F> for Task
where
    F: FnMut() + 'static,
{
    fn from(f: F) -> Self {
        Self::new(f)
    }
}

/// Runs `f`, catching and logging a panic instead of unwinding.
///
/// `what` names the callback in the log message.
pub(crate) fn contain<R>(what: &str, f: impl FnOnce() -> R) -> Option<R> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            match panic_message(payload.as_ref()) {
                Some(message) => log::error!(
                    target: "pembroke::task",
                    "Unexpected panic occurred when executing {what}: {message}"
                ),
                None => log::error!(
                    target: "pembroke::task",
                    "Unexpected panic of unknown type when executing {what}. \
                     Detailed error information is not available"
                ),
            }
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> Option<&str> {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
}
