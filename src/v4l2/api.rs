use std::ffi::CString;
use std::os::raw::{c_int, c_void};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::RawFd;
use std::{io, path::Path};

use crate::v4l2::vidioc;

#[cfg(not(test))]
mod detail {
    use std::os::raw::{c_char, c_int, c_void};

    use crate::v4l2::vidioc::_IOC_TYPE;

    pub unsafe fn open(path: *const c_char, flags: i32) -> c_int {
        libc::open(path, flags)
    }

    pub unsafe fn close(fd: c_int) -> c_int {
        libc::close(fd)
    }

    pub unsafe fn ioctl(fd: c_int, request: _IOC_TYPE, argp: *mut c_void) -> c_int {
        // libc declares ioctl() with a different request type per platform, the raw syscall
        // takes the same arguments everywhere.
        libc::syscall(libc::SYS_ioctl, fd, request, argp) as c_int
    }

    pub unsafe fn mmap(
        start: *mut c_void,
        length: usize,
        prot: c_int,
        flags: c_int,
        fd: c_int,
        offset: libc::off_t,
    ) -> *mut c_void {
        libc::mmap(start, length, prot, flags, fd, offset)
    }

    pub unsafe fn munmap(start: *mut c_void, length: usize) -> c_int {
        libc::munmap(start, length)
    }
}

// Unit tests talk to an in-process driver instead of the kernel.
#[cfg(test)]
use crate::v4l2::fake as detail;

/// Maps the C convention of returning -1 and setting errno
fn check(ret: c_int) -> io::Result<c_int> {
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

/// Opens a device node and returns its file descriptor.
///
/// The descriptor is always opened close-on-exec. Failures carry the OS error (errno).
///
/// # Example
///
/// ```
/// use v4l_capture::v4l2;
///
/// let fd = v4l2::open("/dev/video0", libc::O_RDWR | libc::O_NONBLOCK);
/// ```
pub fn open<P: AsRef<Path>>(path: P, flags: i32) -> io::Result<RawFd> {
    let c_path = CString::new(path.as_ref().as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    check(unsafe { detail::open(c_path.as_ptr(), flags | libc::O_CLOEXEC) })
}

/// Closes a file descriptor previously returned by [`open`].
pub fn close(fd: RawFd) -> io::Result<()> {
    check(unsafe { detail::close(fd) }).map(drop)
}

/// Issues `request` (see [`vidioc`]) on `fd`.
///
/// # Safety
///
/// `argp` must point to a live, properly initialized instance of the struct that `request`
/// encodes. The kernel reads and writes through it.
pub unsafe fn ioctl(fd: RawFd, request: vidioc::_IOC_TYPE, argp: *mut c_void) -> io::Result<()> {
    check(detail::ioctl(fd, request, argp)).map(drop)
}

/// Maps `length` bytes of device memory at `offset`, as reported by `VIDIOC_QUERYBUF`.
///
/// # Safety
///
/// `start` is passed to the kernel as a placement hint and must be null or a valid address.
pub unsafe fn mmap(
    start: *mut c_void,
    length: usize,
    prot: c_int,
    flags: c_int,
    fd: RawFd,
    offset: libc::off_t,
) -> io::Result<*mut c_void> {
    let addr = detail::mmap(start, length, prot, flags, fd, offset);
    if addr == libc::MAP_FAILED {
        Err(io::Error::last_os_error())
    } else {
        Ok(addr)
    }
}

/// # Safety
///
/// `start` and `length` must describe a mapping previously returned by [`mmap`] that has not
/// been unmapped yet.
pub unsafe fn munmap(start: *mut c_void, length: usize) -> io::Result<()> {
    check(detail::munmap(start, length)).map(drop)
}

/// Waits for `events` on a single descriptor.
///
/// Returns the number of ready descriptors, so zero means the timeout expired.
/// A negative `timeout` waits forever.
pub fn poll(fd: RawFd, events: i16, timeout: i32) -> io::Result<i32> {
    let mut pollfd = libc::pollfd {
        fd,
        events,
        revents: 0,
    };
    check(unsafe { libc::poll(&mut pollfd, 1, timeout) })
}
