use std::convert::TryFrom;
use std::fmt;

use crate::error::Error;
use crate::{format::FourCC, fraction::Fraction};
use crate::{v4l_sys, v4l_sys::*};

/// One entry of `VIDIOC_ENUM_FRAMEINTERVALS` for a pixel format and frame size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInterval {
    pub index: u32,
    pub fourcc: FourCC,
    pub width: u32,
    pub height: u32,
    pub interval: FrameIntervalEnum,
}

impl fmt::Display for FrameInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.interval.fmt(f)
    }
}

/// Time between two frames, in seconds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameIntervalEnum {
    Discrete(Fraction),
    Stepwise(Stepwise),
}

impl fmt::Display for FrameIntervalEnum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discrete(interval) => write!(f, "Discrete({})", interval),
            Self::Stepwise(range) => write!(f, "Stepwise({})", range),
        }
    }
}

impl TryFrom<v4l2_frmivalenum> for FrameIntervalEnum {
    type Error = Error;

    fn try_from(desc: v4l2_frmivalenum) -> Result<Self, Self::Error> {
        match desc.type_ {
            v4l_sys::v4l2_frmivaltypes_V4L2_FRMIVAL_TYPE_DISCRETE => {
                let discrete = unsafe { desc.__bindgen_anon_1.discrete };
                Ok(Self::Discrete(Fraction::from(discrete)))
            }
            v4l_sys::v4l2_frmivaltypes_V4L2_FRMIVAL_TYPE_CONTINUOUS
            | v4l_sys::v4l2_frmivaltypes_V4L2_FRMIVAL_TYPE_STEPWISE => {
                let range = unsafe { desc.__bindgen_anon_1.stepwise };
                Ok(Self::Stepwise(Stepwise {
                    min: Fraction::from(range.min),
                    max: Fraction::from(range.max),
                    step: Fraction::from(range.step),
                }))
            }
            typ => Err(Error::Unsupported(format!(
                "frame interval type {} at {}x{}",
                typ, desc.width, desc.height
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stepwise {
    pub min: Fraction,
    pub max: Fraction,
    pub step: Fraction,
}

impl fmt::Display for Stepwise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} with step {}", self.min, self.max, self.step)
    }
}

impl TryFrom<v4l2_frmivalenum> for FrameInterval {
    type Error = Error;

    fn try_from(desc: v4l2_frmivalenum) -> Result<Self, Self::Error> {
        Ok(FrameInterval {
            index: desc.index,
            fourcc: FourCC::from(desc.pixel_format),
            width: desc.width,
            height: desc.height,
            interval: FrameIntervalEnum::try_from(desc)?,
        })
    }
}
