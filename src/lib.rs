//! This crate provides safe video4linux (v4l2) capture with memory-mapped buffer streaming.
//!
//! Opening a [`Device`] queries its capabilities, formats, frame sizes and controls once. A
//! capture session ([`video::Capture`]) configures format, frame rate and cropping. Frames are
//! read through a buffer pool of driver memory mapped into the process
//! ([`io::mmap::Pool`]), wrapped in a stream that switches capturing on and off
//! ([`io::mmap::Stream`]). With the `tokio` feature, [`io::mmap::AsyncStream`] suspends a task
//! until a frame is ready instead of blocking the thread.
//!
//! Every ioctl failure is reported as [`Error::Device`] with the errno the driver returned.
//! Logging goes through the `log` facade; install any logger to see device and stream events.
//!
//! # Example
//!
//! ```no_run
//! use v4l_capture::io::mmap::Stream;
//! use v4l_capture::{Device, Format, FourCC};
//!
//! # fn main() -> v4l_capture::Result<()> {
//! let dev = Device::new(0)?;
//! let session = dev.capture().expect("not a capture device");
//! session.set_format(&Format::new(640, 480, FourCC::new(b"MJPG")))?;
//!
//! let mut stream = Stream::with_buffers(&session, 4)?;
//! for frame in stream.frames()?.take(10) {
//!     let frame = frame?;
//!     println!("{} bytes, {}", frame.data.len(), frame.meta);
//! }
//! # Ok(())
//! # }
//! ```

pub use v4l2_sys as v4l_sys;

pub mod v4l2;

pub mod buffer;
pub mod capability;
pub mod context;
pub mod control;
pub mod device;
pub mod error;
pub mod format;
pub mod fraction;
pub mod frameinterval;
pub mod framesize;
pub mod io;
pub mod memory;
pub mod parameters;
pub mod selection;
pub mod timestamp;
pub mod video;

pub use {
    capability::Capabilities,
    device::Device,
    error::{Error, OpenErrorKind, Owner, Result},
    format::{Format, FourCC},
    fraction::Fraction,
    io::Frame,
    memory::Memory,
    selection::{Rect, Selection},
    timestamp::Timestamp,
    video::Capture,
};
