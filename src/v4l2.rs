//! Thin wrappers around the kernel interface.
//!
//! Everything in here works on raw file descriptors and raw pointers. The safe abstractions
//! ([`crate::device::Device`], [`crate::io::mmap::Pool`], ...) are built on top.

mod api;
pub use api::*;

pub mod videodev;
pub mod vidioc;

#[cfg(test)]
pub(crate) mod fake;
