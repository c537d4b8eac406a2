//! Linux `epoll`-based poller implementation.
//!
//! Timers are delivered through a single `timerfd` registered with the
//! epoll instance. Before blocking, the reactor arms the timerfd for the
//! earliest pending deadline, so waits have nanosecond resolution instead
//! of the millisecond resolution of the `epoll_wait` timeout.
//!
//! Responsibilities:
//! - Create the loop context (epoll instance + timerfd)
//! - Negotiate backend features requested by the builder
//! - Block waiting for the next deadline

use super::platform::{sys_close, sys_timerfd, sys_timerfd_drain, sys_timerfd_set};
use crate::reactor::builder::Feature;

use libc::{
    EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLL_CTL_MOD, EPOLLET, EPOLLIN, EPOLLRDHUP, epoll_create1,
    epoll_ctl, epoll_event, epoll_wait,
};
use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

/// Token of the timerfd inside the epoll set.
const TIMER_TOKEN: u64 = 0;

/// Linux `epoll` poller.
///
/// This poller owns:
/// - an `epoll` instance,
/// - a monotonic `timerfd` used as the timer wake-up source,
/// - a reusable event buffer.
pub(crate) struct EpollPoller {
    /// Epoll file descriptor.
    epoll: RawFd,

    /// Timer file descriptor.
    timer: RawFd,

    /// Interest flags the timerfd is currently registered with.
    interest: u32,

    /// Reusable buffer for epoll events.
    events: Vec<epoll_event>,
}

impl EpollPoller {
    /// Create a new `EpollPoller`.
    ///
    /// This:
    /// - creates the epoll instance,
    /// - creates a non-blocking `timerfd`,
    /// - registers the timerfd into epoll as the persistent timer source.
    pub(crate) fn new() -> io::Result<Self> {
        let epoll = unsafe { epoll_create1(EPOLL_CLOEXEC) };
        if epoll < 0 {
            return Err(io::Error::last_os_error());
        }

        let timer = match sys_timerfd() {
            Ok(fd) => fd,
            Err(err) => {
                sys_close(epoll);
                return Err(err);
            }
        };

        let interest = EPOLLIN as u32;
        let mut event = epoll_event {
            events: interest,
            u64: TIMER_TOKEN,
        };

        let rc = unsafe { epoll_ctl(epoll, EPOLL_CTL_ADD, timer, &mut event) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            sys_close(timer);
            sys_close(epoll);
            return Err(err);
        }

        Ok(Self {
            epoll,
            timer,
            interest,
            events: Vec::with_capacity(8),
        })
    }

    /// Asks the backend to provide `feature`.
    ///
    /// Edge triggering and early close are negotiated with the kernel by
    /// re-registering the timerfd with the matching flag; the flag is kept
    /// when the kernel accepts it.
    pub(crate) fn require(&mut self, feature: Feature) -> bool {
        match feature {
            Feature::EdgeTrigger => self.modify(EPOLLET as u32),
            Feature::EarlyClose => self.modify(EPOLLRDHUP as u32),
            // Readiness is reported through a registered descriptor, and
            // epoll dispatch does not scale with the size of the set.
            Feature::FileDescriptor | Feature::OrderOneTrigger => true,
        }
    }

    fn modify(&mut self, flag: u32) -> bool {
        let interest = self.interest | flag;
        let mut event = epoll_event {
            events: interest,
            u64: TIMER_TOKEN,
        };

        let rc = unsafe { epoll_ctl(self.epoll, EPOLL_CTL_MOD, self.timer, &mut event) };
        if rc < 0 {
            return false;
        }

        self.interest = interest;
        true
    }

    /// Wait for the timer source.
    ///
    /// - `Some(Duration::ZERO)` polls without blocking,
    /// - `Some(delay)` blocks until `delay` elapsed,
    /// - `None` blocks indefinitely.
    ///
    /// Returns the number of readiness events reported.
    pub(crate) fn poll(&mut self, timeout: Option<Duration>) -> io::Result<usize> {
        let timeout_ms = match timeout {
            Some(delay) if delay.is_zero() => 0,
            other => {
                sys_timerfd_drain(self.timer);
                sys_timerfd_set(self.timer, other)?;
                -1
            }
        };

        unsafe {
            self.events.set_len(0);
        }

        let n = unsafe {
            epoll_wait(
                self.epoll,
                self.events.as_mut_ptr(),
                self.events.capacity() as i32,
                timeout_ms,
            )
        };

        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(0);
            }
            return Err(err);
        }

        unsafe {
            self.events.set_len(n as usize);
        }

        if self.events.iter().any(|ev| ev.u64 == TIMER_TOKEN) {
            sys_timerfd_drain(self.timer);
        }

        Ok(n as usize)
    }
}

impl Drop for EpollPoller {
    fn drop(&mut self) {
        sys_close(self.timer);
        sys_close(self.epoll);
    }
}
