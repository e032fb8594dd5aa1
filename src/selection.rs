use std::fmt;

use crate::fraction::Fraction;
use crate::v4l_sys::*;

/// Rectangle on the sensor or in the image, in pixels
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Rect {
            left,
            top,
            width,
            height,
        }
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} at ({}, {})",
            self.width, self.height, self.left, self.top
        )
    }
}

impl From<v4l2_rect> for Rect {
    fn from(rect: v4l2_rect) -> Self {
        Rect {
            left: rect.left,
            top: rect.top,
            width: rect.width,
            height: rect.height,
        }
    }
}

impl From<Rect> for v4l2_rect {
    fn from(rect: Rect) -> Self {
        v4l2_rect {
            left: rect.left,
            top: rect.top,
            width: rect.width,
            height: rect.height,
        }
    }
}

/// Cropping limits as reported by `VIDIOC_CROPCAP`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropCapability {
    /// Area that can be captured at all
    pub bounds: Rect,
    /// Default cropping rectangle, usually the whole picture
    pub default: Rect,
    /// Pixel aspect (y / x) when no scaling is applied
    pub pixel_aspect: Fraction,
}

impl From<v4l2_cropcap> for CropCapability {
    fn from(cap: v4l2_cropcap) -> Self {
        CropCapability {
            bounds: cap.bounds.into(),
            default: cap.defrect.into(),
            pixel_aspect: cap.pixelaspect.into(),
        }
    }
}

impl fmt::Display for CropCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "bounds       : {}", self.bounds)?;
        writeln!(f, "default      : {}", self.default)?;
        writeln!(f, "pixel aspect : {}", self.pixel_aspect)?;
        Ok(())
    }
}

/// Current cropping selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Single(Rect),
    /// Several rectangles, for devices implementing the multi-rectangle extension
    Multiple(Vec<Rect>),
}

impl Selection {
    /// All rectangles of the selection, in the order the driver reported them
    pub fn rects(&self) -> &[Rect] {
        match self {
            Selection::Single(rect) => std::slice::from_ref(rect),
            Selection::Multiple(rects) => rects,
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut prefix = "";
        for rect in self.rects() {
            write!(f, "{}{}", prefix, rect)?;
            prefix = ", ";
        }
        Ok(())
    }
}
