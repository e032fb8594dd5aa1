use std::convert::TryFrom;
use std::fmt;

use crate::capability;
use crate::format::FieldOrder;
use crate::timestamp::Timestamp;

/// Buffer type
///
/// Specific types of devices require buffers of corresponding types.
#[allow(clippy::unreadable_literal)]
#[rustfmt::skip]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    VideoCapture        = 1,
    VideoOutput         = 2,
    VideoOverlay        = 3,
    VbiCapture          = 4,
    VbiOutput           = 5,
    SlicedVbiCapture    = 6,
    SlicedVbiOutput     = 7,
    VideoOutputOverlay  = 8,
    VideoCaptureMplane  = 9,
    VideoOutputMplane   = 10,
    SdrCapture          = 11,
    SdrOutput           = 12,
    MetaCapture         = 13,
    MetaOutput          = 14,
}

impl Type {
    /// All buffer types a device with the given capabilities can stream
    pub fn from_capabilities(caps: capability::Flags) -> Vec<Type> {
        use capability::Flags;

        let table = [
            (Flags::VIDEO_CAPTURE, Type::VideoCapture),
            (Flags::VIDEO_OUTPUT, Type::VideoOutput),
            (Flags::VIDEO_OVERLAY, Type::VideoOverlay),
            (Flags::VBI_CAPTURE, Type::VbiCapture),
            (Flags::VBI_OUTPUT, Type::VbiOutput),
            (Flags::SLICED_VBI_CAPTURE, Type::SlicedVbiCapture),
            (Flags::SLICED_VBI_OUTPUT, Type::SlicedVbiOutput),
            (Flags::VIDEO_OUTPUT_OVERLAY, Type::VideoOutputOverlay),
            (Flags::VIDEO_CAPTURE_MPLANE, Type::VideoCaptureMplane),
            (Flags::VIDEO_OUTPUT_MPLANE, Type::VideoOutputMplane),
            (Flags::SDR_CAPTURE, Type::SdrCapture),
            (Flags::SDR_OUTPUT, Type::SdrOutput),
            (Flags::META_CAPTURE, Type::MetaCapture),
            (Flags::META_OUTPUT, Type::MetaOutput),
        ];

        table
            .iter()
            .filter(|(flag, _)| caps.contains(*flag))
            .map(|(_, typ)| *typ)
            .collect()
    }

    /// Whether buffers of this type carry images (and thus have pixel formats)
    pub fn is_image(&self) -> bool {
        matches!(
            self,
            Type::VideoCapture
                | Type::VideoCaptureMplane
                | Type::VideoOutput
                | Type::VideoOutputMplane
                | Type::VideoOverlay
        )
    }

    /// Whether buffers of this type use the multi-planar API
    pub fn is_multiplanar(&self) -> bool {
        matches!(self, Type::VideoCaptureMplane | Type::VideoOutputMplane)
    }
}

impl TryFrom<u32> for Type {
    type Error = ();

    fn try_from(repr: u32) -> Result<Self, Self::Error> {
        match repr {
            1 => Ok(Type::VideoCapture),
            2 => Ok(Type::VideoOutput),
            3 => Ok(Type::VideoOverlay),
            4 => Ok(Type::VbiCapture),
            5 => Ok(Type::VbiOutput),
            6 => Ok(Type::SlicedVbiCapture),
            7 => Ok(Type::SlicedVbiOutput),
            8 => Ok(Type::VideoOutputOverlay),
            9 => Ok(Type::VideoCaptureMplane),
            10 => Ok(Type::VideoOutputMplane),
            11 => Ok(Type::SdrCapture),
            12 => Ok(Type::SdrOutput),
            13 => Ok(Type::MetaCapture),
            14 => Ok(Type::MetaOutput),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::VideoCapture => write!(f, "Video Capture"),
            Type::VideoOutput => write!(f, "Video Output"),
            Type::VideoOverlay => write!(f, "Video Overlay"),
            Type::VbiCapture => write!(f, "VBI Capture"),
            Type::VbiOutput => write!(f, "VBI Output"),
            Type::SlicedVbiCapture => write!(f, "Sliced VBI Capture"),
            Type::SlicedVbiOutput => write!(f, "Sliced VBI Output"),
            Type::VideoOutputOverlay => write!(f, "Video Output Overlay"),
            Type::VideoCaptureMplane => write!(f, "Video Capture Multiplanar"),
            Type::VideoOutputMplane => write!(f, "Video Output Multiplanar"),
            Type::SdrCapture => write!(f, "SDR Capture"),
            Type::SdrOutput => write!(f, "SDR Output"),
            Type::MetaCapture => write!(f, "Metadata Capture"),
            Type::MetaOutput => write!(f, "Metadata Output"),
        }
    }
}

bitflags::bitflags! {
    #[allow(clippy::unreadable_literal)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Flags: u32 {
        /// Buffer is mapped
        const MAPPED                = 0x00000001;
        /// Buffer is queued for processing
        const QUEUED                = 0x00000002;
        /// Buffer is ready
        const DONE                  = 0x00000004;
        /// Image is a keyframe (I-frame)
        const KEYFRAME              = 0x00000008;
        /// Image is a P-frame
        const PFRAME                = 0x00000010;
        /// Image is a B-frame
        const BFRAME                = 0x00000020;
        /// Buffer is ready, but the data contained within is corrupted
        const ERROR                 = 0x00000040;
        /// Buffer is added to an unqueued request
        const IN_REQUEST            = 0x00000080;
        /// Timecode field is valid
        const TIMECODE              = 0x00000100;
        /// Buffer is prepared for queuing
        const PREPARED              = 0x00000400;
        /// Cache handling flags
        const NO_CACHE_INVALIDATE   = 0x00000800;
        const NO_CACHE_CLEAN        = 0x00001000;
        /// Timestamp type
        const TIMESTAMP_MASK        = 0x0000e000;
        const TIMESTAMP_MONOTONIC   = 0x00002000;
        const TIMESTAMP_COPY        = 0x00004000;
        /// Timestamp sources
        const TSTAMP_SRC_MASK       = 0x00070000;
        const TSTAMP_SRC_SOE        = 0x00010000;
        /// mem2mem encoder/decoder
        const LAST                  = 0x00100000;
        /// request_fd is valid
        const REQUEST_FD            = 0x00800000;
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

/// Buffer metadata, mostly used not to convolute the main buffer structs
#[derive(Debug, Copy, Clone)]
pub struct Metadata {
    /// Number of bytes occupied by the data in the buffer
    pub bytesused: u32,
    /// Buffer flags
    pub flags: Flags,
    /// Field order of the image in the buffer
    pub field: Option<FieldOrder>,
    /// Time of capture (usually set by the driver)
    pub timestamp: Timestamp,
    /// Sequence number, counting the frames
    pub sequence: u32,
}

impl Default for Metadata {
    fn default() -> Self {
        Metadata {
            bytesused: 0,
            flags: Flags::empty(),
            field: None,
            timestamp: Timestamp::default(),
            sequence: 0,
        }
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "seq {} | {} bytes | {} | {}",
            self.sequence, self.bytesused, self.timestamp, self.flags
        )
    }
}
