use std::convert::TryFrom;
use std::fmt;

use crate::error::Error;
use crate::format::FourCC;
use crate::v4l_sys;
use crate::v4l_sys::*;

/// One entry of `VIDIOC_ENUM_FRAMESIZES` for a pixel format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSize {
    pub index: u32,
    pub fourcc: FourCC,
    pub size: FrameSizeEnum,
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.size.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameSizeEnum {
    Discrete(Discrete),
    Stepwise(Stepwise),
}

impl FrameSizeEnum {
    /// Returns the discrete size, if the driver reported exactly one
    pub fn discrete(&self) -> Option<Discrete> {
        match self {
            Self::Discrete(discrete) => Some(*discrete),
            Self::Stepwise(_) => None,
        }
    }
}

impl fmt::Display for FrameSizeEnum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discrete(size) => write!(f, "Discrete({})", size),
            Self::Stepwise(range) => write!(f, "Stepwise({})", range),
        }
    }
}

impl TryFrom<v4l2_frmsizeenum> for FrameSizeEnum {
    type Error = Error;

    fn try_from(desc: v4l2_frmsizeenum) -> Result<Self, Self::Error> {
        // the active union member is selected by `type_`
        let size = match desc.type_ {
            v4l_sys::v4l2_frmsizetypes_V4L2_FRMSIZE_TYPE_DISCRETE => {
                let discrete = unsafe { desc.__bindgen_anon_1.discrete };
                Self::Discrete(Discrete {
                    width: discrete.width,
                    height: discrete.height,
                })
            }
            v4l_sys::v4l2_frmsizetypes_V4L2_FRMSIZE_TYPE_STEPWISE
            | v4l_sys::v4l2_frmsizetypes_V4L2_FRMSIZE_TYPE_CONTINUOUS => {
                let range = unsafe { desc.__bindgen_anon_1.stepwise };
                Self::Stepwise(Stepwise {
                    min_width: range.min_width,
                    max_width: range.max_width,
                    step_width: range.step_width,
                    min_height: range.min_height,
                    max_height: range.max_height,
                    step_height: range.step_height,
                })
            }
            typ => {
                return Err(Error::Unsupported(format!(
                    "frame size type {} of {}",
                    typ,
                    FourCC::from(desc.pixel_format)
                )))
            }
        };
        Ok(size)
    }
}

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Discrete {
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for Discrete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Range of sizes in pixels; continuous ranges report a step of 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stepwise {
    pub min_width: u32,
    pub max_width: u32,
    pub step_width: u32,
    pub min_height: u32,
    pub max_height: u32,
    pub step_height: u32,
}

impl fmt::Display for Stepwise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} - {}x{} with step {}/{}",
            self.min_width,
            self.min_height,
            self.max_width,
            self.max_height,
            self.step_width,
            self.step_height,
        )
    }
}

impl TryFrom<v4l2_frmsizeenum> for FrameSize {
    type Error = Error;

    fn try_from(desc: v4l2_frmsizeenum) -> Result<Self, Self::Error> {
        Ok(FrameSize {
            index: desc.index,
            fourcc: FourCC::from(desc.pixel_format),
            size: FrameSizeEnum::try_from(desc)?,
        })
    }
}
