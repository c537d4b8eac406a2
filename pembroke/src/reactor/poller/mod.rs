//! Platform-specific readiness substrate.
//!
//! The poller is the lowest layer of the reactor. It is used to:
//! - create the OS-level loop context,
//! - negotiate the backend features requested by the builder,
//! - block until the next timer deadline.
//!
//! The concrete implementation is selected at compile time
//! depending on the target operating system.

#[cfg(target_os = "linux")]
mod epoll;

#[cfg(target_os = "linux")]
pub(crate) type Poller = epoll::EpollPoller;

#[cfg(target_os = "linux")]
pub(crate) mod unix;

#[cfg(target_os = "linux")]
pub(crate) use unix as platform;
