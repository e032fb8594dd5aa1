//! Buffer exchange with the driver

pub mod mmap;
pub mod traits;

use std::fmt;

use crate::buffer::Metadata;

/// Copy of one captured frame
///
/// The bytes are a snapshot taken before the buffer went back to the driver, so they stay valid
/// for as long as the caller keeps them.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Index of the buffer slot the frame was captured into
    pub index: usize,
    /// Valid bytes of the buffer, `meta.bytesused` long
    pub data: Vec<u8>,
    pub meta: Metadata,
}

impl Frame {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer {} | {}", self.index, self.meta)
    }
}
