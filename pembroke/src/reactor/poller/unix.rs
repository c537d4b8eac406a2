use libc::{
    CLOCK_MONOTONIC, TFD_CLOEXEC, TFD_NONBLOCK, c_void, close, itimerspec, read, timerfd_create,
    timerfd_settime, timespec,
};
use std::os::fd::RawFd;
use std::time::Duration;
use std::{io, mem, ptr};

/// Closes a file descriptor.
pub(crate) fn sys_close(fd: RawFd) {
    unsafe { close(fd) };
}

/// Creates a non-blocking monotonic `timerfd`.
pub(crate) fn sys_timerfd() -> io::Result<RawFd> {
    let fd = unsafe { timerfd_create(CLOCK_MONOTONIC, TFD_NONBLOCK | TFD_CLOEXEC) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(fd)
}

/// Arms `fd` to expire once after `delay`, or disarms it on `None`.
///
/// A zero `it_value` disarms a timerfd, so a zero delay is rounded up to
/// one nanosecond.
pub(crate) fn sys_timerfd_set(fd: RawFd, delay: Option<Duration>) -> io::Result<()> {
    let mut spec: itimerspec = unsafe { mem::zeroed() };

    if let Some(delay) = delay {
        spec.it_value = to_timespec(delay.max(Duration::from_nanos(1)));
    }

    let rc = unsafe { timerfd_settime(fd, 0, &spec, ptr::null_mut()) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}

/// Consumes the expiration counter of a timerfd.
///
/// The descriptor is non-blocking; an empty counter is not an error.
pub(crate) fn sys_timerfd_drain(fd: RawFd) {
    let mut expirations = 0u64;
    unsafe {
        read(fd, &mut expirations as *mut u64 as *mut c_void, 8);
    }
}

/// Converts a `Duration` into a `timespec`, saturating on overflow.
fn to_timespec(duration: Duration) -> timespec {
    let mut ts: timespec = unsafe { mem::zeroed() };
    ts.tv_sec = duration.as_secs().try_into().unwrap_or(libc::time_t::MAX);
    ts.tv_nsec = duration.subsec_nanos() as _;
    ts
}
