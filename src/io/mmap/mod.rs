//! Memory-mapped buffer streaming
//!
//! A [`Pool`] requests buffers from the driver and maps each of them into a [`Slot`]. A
//! [`Stream`] brackets the pool with stream on / stream off and hands out frames, either
//! blocking the calling thread or, with the `tokio` feature, suspending a task in
//! [`AsyncStream`].

mod pool;
pub use pool::Pool;

mod slot;
pub use slot::Slot;

mod stream;
pub use stream::{Frames, State, Stream};

#[cfg(feature = "tokio")]
mod async_stream;
#[cfg(feature = "tokio")]
pub use async_stream::AsyncStream;

use crate::memory::Memory;

/// Buffer pool settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Number of buffers to request, the driver may grant fewer
    pub count: u32,
    /// Memory kind, only [`Memory::Mmap`] is implemented
    pub memory: Memory,
    /// Hand every buffer to the driver right after allocation and right after it was read
    pub auto_queue: bool,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_buffers(count: u32) -> Self {
        Config {
            count,
            ..Self::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            count: 4,
            memory: Memory::Mmap,
            auto_queue: true,
        }
    }
}
