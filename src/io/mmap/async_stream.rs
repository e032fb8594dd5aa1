use std::os::unix::io::{BorrowedFd, OwnedFd};

use tokio::io::unix::AsyncFd;
use tokio::io::Interest;

use crate::error::{Error, Result};
use crate::io::mmap::{Config, Stream};
use crate::io::Frame;
use crate::video::Capture;

/// Stream whose reads suspend the calling task instead of blocking the thread
///
/// A duplicate of the device descriptor is registered with the tokio reactor for as long as
/// the stream exists, so closing the device never leaves the reactor watching a reused number.
/// Dropping the stream, which includes cancelling a task that owns it, switches streaming off
/// and removes the registration.
///
/// # Example
///
/// ```no_run
/// use v4l_capture::Device;
/// use v4l_capture::io::mmap::AsyncStream;
///
/// # async fn capture() -> v4l_capture::Result<()> {
/// let dev = Device::new(0)?;
/// if let Some(session) = dev.capture() {
///     let mut stream = AsyncStream::new(&session)?;
///     let frame = stream.next().await?;
///     println!("{}", frame);
/// }
/// # Ok(())
/// # }
/// ```
pub struct AsyncStream {
    stream: Stream,
    // duplicate of the device descriptor, owned by the reactor registration
    fd: Option<AsyncFd<OwnedFd>>,
}

impl AsyncStream {
    /// Allocates four buffers, registers the device and starts streaming
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(session: &Capture) -> Result<Self> {
        Self::with_config(session, Config::default())
    }

    pub fn with_config(session: &Capture, config: Config) -> Result<Self> {
        Self::from_stream(Stream::with_config(session, config)?)
    }

    /// Registers the device of `stream` and starts it
    pub fn from_stream(mut stream: Stream) -> Result<Self> {
        let raw = stream.session().handle().fd();
        if raw < 0 {
            return Err(Error::Closed);
        }

        // the stream keeps the device handle, and with it `raw`, alive for this call
        let dup = unsafe { BorrowedFd::borrow_raw(raw) }
            .try_clone_to_owned()
            .map_err(Error::Io)?;
        let fd = AsyncFd::with_interest(dup, Interest::READABLE).map_err(Error::Io)?;
        stream.start()?;
        log::debug!("registered a duplicate of fd {} with the reactor", raw);

        Ok(AsyncStream {
            stream,
            fd: Some(fd),
        })
    }

    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    /// Waits until a frame is ready without blocking the thread, then returns a copy of it
    ///
    /// Cancel safe: a frame is only taken from the driver once the future is about to complete.
    pub async fn next(&mut self) -> Result<Frame> {
        let fd = self.fd.as_ref().ok_or(Error::Closed)?;

        loop {
            let mut guard = fd.readable().await.map_err(Error::Io)?;
            match self.stream.try_read()? {
                Some(frame) => return Ok(frame),
                None => guard.clear_ready(),
            }
        }
    }

    /// Switches streaming off and deregisters the device
    ///
    /// Later calls to [`AsyncStream::next`] fail with [`Error::Closed`].
    pub fn stop(&mut self) -> Result<()> {
        if self.fd.take().is_some() {
            log::debug!("deregistered device from the reactor");
        }
        self.stream.stop()
    }
}

impl Drop for AsyncStream {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("failed to stop stream: {}", e);
        }
    }
}
