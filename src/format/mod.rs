use std::{convert::TryFrom, fmt, mem};

use crate::v4l_sys::*;

pub mod description;
pub use description::Description;

pub mod field;
pub use field::FieldOrder;

pub mod fourcc;
pub use fourcc::FourCC;

bitflags::bitflags! {
    #[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
    pub struct Flags : u32 {
        const PREMUL_ALPHA  = 0x00000001;
        const SET_CSC       = 0x00000002;
    }
}

impl From<u32> for Flags {
    fn from(flags: u32) -> Self {
        Self::from_bits_retain(flags)
    }
}

impl From<Flags> for u32 {
    fn from(flags: Flags) -> Self {
        flags.bits()
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Single-planar image format negotiated with `VIDIOC_G_FMT` / `VIDIOC_S_FMT`
///
/// Width, height and fourcc are requests; the driver may adjust any of them and fills in
/// stride and size.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Format {
    pub width: u32,
    pub height: u32,
    pub fourcc: FourCC,
    pub field_order: FieldOrder,

    /// Bytes per image row, including padding
    pub stride: u32,
    /// Bytes a buffer needs to hold one image
    pub size: u32,

    pub flags: Flags,
}

impl Format {
    /// Format request with driver-chosen field order, stride and size
    ///
    /// # Example
    ///
    /// ```
    /// use v4l_capture::{Format, FourCC};
    /// let fmt = Format::new(640, 480, FourCC::new(b"MJPG"));
    /// ```
    pub const fn new(width: u32, height: u32, fourcc: FourCC) -> Self {
        Format {
            width,
            height,
            fourcc,
            field_order: FieldOrder::Any,
            stride: 0,
            size: 0,
            flags: Flags::empty(),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "width          : {}", self.width)?;
        writeln!(f, "height         : {}", self.height)?;
        writeln!(f, "fourcc         : {}", self.fourcc)?;
        writeln!(f, "field          : {}", self.field_order)?;
        writeln!(f, "stride         : {}", self.stride)?;
        writeln!(f, "size           : {}", self.size)?;
        Ok(())
    }
}

impl From<v4l2_pix_format> for Format {
    fn from(fmt: v4l2_pix_format) -> Self {
        Self {
            width: fmt.width,
            height: fmt.height,
            fourcc: FourCC::from(fmt.pixelformat),
            // drivers are not supposed to report anything else, but some do
            field_order: FieldOrder::try_from(fmt.field).unwrap_or(FieldOrder::Any),
            stride: fmt.bytesperline,
            size: fmt.sizeimage,
            flags: Flags::from(fmt.flags),
        }
    }
}

impl From<Format> for v4l2_pix_format {
    fn from(format: Format) -> Self {
        Self {
            width: format.width,
            height: format.height,
            pixelformat: format.fourcc.into(),
            field: format.field_order as u32,
            bytesperline: format.stride,
            sizeimage: format.size,
            flags: format.flags.into(),
            ..unsafe { mem::zeroed() }
        }
    }
}
