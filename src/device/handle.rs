use std::fmt;
use std::os::raw::c_void;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::buffer;
use crate::error::{Error, Result};
use crate::v4l2;
use crate::v4l2::vidioc::_IOC_TYPE;

/// Owner of the file descriptor of an opened device node
///
/// Sessions, pools and streams share the handle through an `Arc`. Closing it invalidates the
/// handle for all of them at once: every later ioctl fails with [`Error::Closed`]. The
/// descriptor itself is released when the last reference goes away, so its number cannot be
/// reused by another file while anything here still holds it.
pub struct Handle {
    fd: RawFd,
    closed: AtomicBool,
    // one bit per buffer type with streaming switched on
    streaming: AtomicU32,
}

impl Handle {
    pub(crate) fn new(fd: RawFd) -> Self {
        Handle {
            fd,
            closed: AtomicBool::new(false),
            streaming: AtomicU32::new(0),
        }
    }

    /// Returns the raw file descriptor, or -1 once the handle has been closed
    pub fn fd(&self) -> RawFd {
        if self.is_closed() {
            -1
        } else {
            self.fd
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Whether streaming was switched on for `typ` and not switched off since
    pub fn is_streaming(&self, typ: buffer::Type) -> bool {
        self.streaming.load(Ordering::Acquire) & (1 << typ as u32) != 0
    }

    pub(crate) fn set_streaming(&self, typ: buffer::Type, on: bool) {
        let bit = 1 << typ as u32;
        if on {
            self.streaming.fetch_or(bit, Ordering::AcqRel);
        } else {
            self.streaming.fetch_and(!bit, Ordering::AcqRel);
        }
    }

    /// Issues `request` on the device, retrying when interrupted by a signal
    ///
    /// # Safety
    ///
    /// `T` must be the argument type `request` encodes.
    pub(crate) unsafe fn ioctl<T>(&self, request: _IOC_TYPE, arg: &mut T) -> Result<()> {
        loop {
            if self.is_closed() {
                return Err(Error::Closed);
            }

            match v4l2::ioctl(self.fd, request, arg as *mut T as *mut c_void) {
                Ok(()) => return Ok(()),
                Err(e) if e.raw_os_error() == Some(libc::EINTR) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Waits up to `timeout` milliseconds (forever if negative) for `events`
    ///
    /// Returns whether the descriptor became ready.
    pub fn poll(&self, events: i16, timeout: i32) -> Result<bool> {
        loop {
            if self.is_closed() {
                return Err(Error::Closed);
            }

            match v4l2::poll(self.fd, events, timeout) {
                Ok(ready) => return Ok(ready > 0),
                Err(e) if e.raw_os_error() == Some(libc::EINTR) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Blocks the calling thread until a dequeue would not block
    pub fn wait_readable(&self) -> Result<()> {
        while !self.poll(libc::POLLIN, -1)? {}
        Ok(())
    }

    /// Marks the handle closed
    ///
    /// Closing an already closed handle does nothing.
    pub fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            log::debug!("device fd {} closed", self.fd);
        }
        Ok(())
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        match v4l2::close(self.fd) {
            Ok(()) => log::trace!("released fd {}", self.fd),
            // the descriptor is gone either way, see close(2)
            Err(e) if e.raw_os_error() == Some(libc::EINTR) => {}
            Err(e) => log::warn!("failed to close fd {}: {}", self.fd, e),
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("fd", &self.fd)
            .field("closed", &self.is_closed())
            .finish()
    }
}
