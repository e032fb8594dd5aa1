use std::sync::Arc;
use std::{mem, ptr};

use crate::buffer;
use crate::device::Handle;
use crate::error::{Error, Result};
use crate::format::Format;
use crate::fraction::Fraction;
use crate::parameters::Parameters;
use crate::selection::{Rect, Selection};
use crate::v4l2;
use crate::v4l2::videodev::{v4l2_ext_rect, v4l2_selection};
use crate::v4l_sys::*;

/// `V4L2_SEL_TGT_CROP`
const SEL_TGT_CROP: u32 = 0x0000;

/// One capturable stream of a device, identified by its buffer type
///
/// Every method is a single request/response exchange with the driver. Nothing is cached: the
/// session only remembers which buffer type it talks about.
#[derive(Debug, Clone)]
pub struct Capture {
    handle: Arc<Handle>,
    typ: buffer::Type,
}

impl Capture {
    /// Upper bound for the rectangles of a multi-rectangle selection
    pub const MAX_SELECTION_RECTS: usize = 8;

    pub(crate) fn new(handle: Arc<Handle>, typ: buffer::Type) -> Self {
        Capture { handle, typ }
    }

    /// Returns the raw device handle
    pub fn handle(&self) -> Arc<Handle> {
        self.handle.clone()
    }

    /// Buffer type of this session
    pub fn typ(&self) -> buffer::Type {
        self.typ
    }

    fn single_planar(&self, what: &str) -> Result<()> {
        if self.typ.is_multiplanar() {
            return Err(Error::Unsupported(format!("{} for {} buffers", what, self.typ)));
        }
        Ok(())
    }

    /// Returns the format currently in use
    pub fn format(&self) -> Result<Format> {
        self.single_planar("format query")?;

        unsafe {
            let mut v4l2_fmt = v4l2_format {
                type_: self.typ as u32,
                ..mem::zeroed()
            };
            self.handle.ioctl(v4l2::vidioc::VIDIOC_G_FMT, &mut v4l2_fmt)?;

            Ok(Format::from(v4l2_fmt.fmt.pix))
        }
    }

    /// Modifies the capture format and returns the actual format
    ///
    /// The driver tries to match the format parameters on a best effort basis.
    /// Thus, if the combination of format properties cannot be achieved, the closest possible
    /// settings are used and reported back.
    ///
    /// # Arguments
    ///
    /// * `fmt` - Desired format
    ///
    /// # Example
    ///
    /// ```
    /// use v4l_capture::{Device, Format, FourCC};
    ///
    /// if let Ok(dev) = Device::new(0) {
    ///     if let Some(session) = dev.capture() {
    ///         let fmt = session.set_format(&Format::new(640, 480, FourCC::new(b"MJPG")));
    ///     }
    /// }
    /// ```
    pub fn set_format(&self, fmt: &Format) -> Result<Format> {
        self.single_planar("setting a format")?;

        unsafe {
            let mut v4l2_fmt = v4l2_format {
                type_: self.typ as u32,
                fmt: v4l2_format__bindgen_ty_1 { pix: (*fmt).into() },
            };
            self.handle.ioctl(v4l2::vidioc::VIDIOC_S_FMT, &mut v4l2_fmt)?;

            let actual = Format::from(v4l2_fmt.fmt.pix);
            log::debug!("format set to {} (requested {})", actual.fourcc, fmt.fourcc);
            Ok(actual)
        }
    }

    /// Returns the streaming parameters currently in use
    pub fn params(&self) -> Result<Parameters> {
        unsafe {
            let mut v4l2_params = v4l2_streamparm {
                type_: self.typ as u32,
                ..mem::zeroed()
            };
            self.handle.ioctl(v4l2::vidioc::VIDIOC_G_PARM, &mut v4l2_params)?;

            Ok(Parameters::from(v4l2_params.parm.capture))
        }
    }

    /// Modifies the streaming parameters and returns the actual parameters
    ///
    /// # Arguments
    ///
    /// * `params` - Desired parameters
    pub fn set_params(&self, params: &Parameters) -> Result<Parameters> {
        unsafe {
            let mut v4l2_params = v4l2_streamparm {
                type_: self.typ as u32,
                parm: v4l2_streamparm__bindgen_ty_1 {
                    capture: (*params).into(),
                },
            };
            self.handle.ioctl(v4l2::vidioc::VIDIOC_S_PARM, &mut v4l2_params)?;
        }

        self.params()
    }

    /// Returns the current frame rate in frames per second
    pub fn frame_rate(&self) -> Result<f64> {
        let interval = self.params()?.interval;
        if interval.numerator == 0 {
            return Err(Error::Validation(format!(
                "driver reported a frame interval of {}",
                interval
            )));
        }

        Ok(interval.denominator as f64 / interval.numerator as f64)
    }

    /// Requests a frame rate and returns the one the driver settled on
    ///
    /// `fps` is approximated by the closest fraction whose terms both fit into 32 bits, then
    /// stored inverted, as time per frame.
    ///
    /// # Example
    ///
    /// ```
    /// use v4l_capture::Device;
    ///
    /// if let Ok(dev) = Device::new(0) {
    ///     if let Some(session) = dev.capture() {
    ///         let fps = session.set_frame_rate(29.97);
    ///     }
    /// }
    /// ```
    pub fn set_frame_rate(&self, fps: f64) -> Result<f64> {
        let max = u32::MAX as f64;
        if !fps.is_finite() || fps < 1.0 / max || fps > max {
            return Err(Error::Validation(format!("invalid frame rate {}", fps)));
        }

        // numerator p = fps * q must fit as well
        let max_denominator = (max / fps).min(max) as u32;
        let rate = Fraction::from_f64(fps, max_denominator.max(1))
            .ok_or_else(|| Error::Validation(format!("invalid frame rate {}", fps)))?;

        let mut params = self.params()?;
        params.interval = Fraction::new(rate.denominator, rate.numerator);
        log::debug!("requesting a frame interval of {} s", params.interval);
        self.set_params(&params)?;

        self.frame_rate()
    }

    /// Returns the current cropping rectangle
    pub fn crop(&self) -> Result<Rect> {
        unsafe {
            let mut v4l2_crop = v4l2_crop {
                type_: self.typ as u32,
                ..mem::zeroed()
            };
            self.handle.ioctl(v4l2::vidioc::VIDIOC_G_CROP, &mut v4l2_crop)?;

            Ok(Rect::from(v4l2_crop.c))
        }
    }

    /// Sets the cropping rectangle
    ///
    /// Drivers round the rectangle to what the hardware supports; read it back with
    /// [`Capture::crop`] to see the result.
    pub fn set_crop(&self, rect: Rect) -> Result<()> {
        let mut v4l2_crop = v4l2_crop {
            type_: self.typ as u32,
            c: rect.into(),
        };

        unsafe { self.handle.ioctl(v4l2::vidioc::VIDIOC_S_CROP, &mut v4l2_crop) }
    }

    /// Returns the current crop selection
    ///
    /// Devices implementing the multi-rectangle extension may report up to
    /// [`Capture::MAX_SELECTION_RECTS`] rectangles; all others report exactly one.
    pub fn selection(&self) -> Result<Selection> {
        let mut rects: [v4l2_ext_rect; Self::MAX_SELECTION_RECTS] = unsafe { mem::zeroed() };
        let mut v4l2_sel = self.selection_arg();
        v4l2_sel.rectangles = rects.len() as u32;
        v4l2_sel.pr = rects.as_mut_ptr();

        unsafe {
            self.handle.ioctl(v4l2::vidioc::VIDIOC_G_SELECTION, &mut v4l2_sel)?;
        }

        let count = v4l2_sel.rectangles as usize;
        if count == 0 || v4l2_sel.pr.is_null() {
            return Ok(Selection::Single(v4l2_sel.r.into()));
        }

        Ok(Selection::Multiple(
            rects[..count.min(rects.len())]
                .iter()
                .map(|ext| Rect::from(ext.r))
                .collect(),
        ))
    }

    /// Sets the crop selection
    ///
    /// A single rectangle uses the plain selection call. Several rectangles need a device with
    /// the multi-rectangle extension; the first one is also passed as the plain rectangle so
    /// other devices still apply it.
    pub fn set_selection(&self, rects: &[Rect]) -> Result<Selection> {
        if rects.is_empty() {
            return Err(Error::Validation("empty selection".to_string()));
        }
        if rects.len() > Self::MAX_SELECTION_RECTS {
            return Err(Error::Validation(format!(
                "{} selection rectangles, at most {} are supported",
                rects.len(),
                Self::MAX_SELECTION_RECTS
            )));
        }

        let mut ext: Vec<v4l2_ext_rect> = rects
            .iter()
            .map(|rect| v4l2_ext_rect {
                r: (*rect).into(),
                reserved: [0; 4],
            })
            .collect();

        let mut v4l2_sel = self.selection_arg();
        v4l2_sel.r = rects[0].into();
        if rects.len() > 1 {
            v4l2_sel.rectangles = ext.len() as u32;
            v4l2_sel.pr = ext.as_mut_ptr();
        }

        unsafe {
            self.handle.ioctl(v4l2::vidioc::VIDIOC_S_SELECTION, &mut v4l2_sel)?;
        }

        self.selection()
    }

    fn selection_arg(&self) -> v4l2_selection {
        v4l2_selection {
            type_: self.typ as u32,
            target: SEL_TGT_CROP,
            flags: 0,
            r: Rect::default().into(),
            rectangles: 0,
            pr: ptr::null_mut(),
            reserved: Default::default(),
        }
    }

    /// Switches streaming on
    ///
    /// Most drivers refuse unless at least one buffer is queued.
    pub fn start(&self) -> Result<()> {
        let mut typ = self.typ as u32;
        unsafe {
            self.handle.ioctl(v4l2::vidioc::VIDIOC_STREAMON, &mut typ)?;
        }
        self.handle.set_streaming(self.typ, true);

        log::debug!("stream on ({})", self.typ);
        Ok(())
    }

    /// Switches streaming off
    ///
    /// All buffers return to user space. Nothing happens if the device is already closed or
    /// gone.
    pub fn stop(&self) -> Result<()> {
        if self.handle.is_closed() {
            log::debug!("stream off skipped, device closed");
            self.handle.set_streaming(self.typ, false);
            return Ok(());
        }

        let mut typ = self.typ as u32;
        match unsafe { self.handle.ioctl(v4l2::vidioc::VIDIOC_STREAMOFF, &mut typ) } {
            Ok(()) => log::debug!("stream off ({})", self.typ),
            Err(Error::Closed) => {}
            Err(Error::Device { errno }) if errno == libc::ENODEV => {
                log::warn!("stream off on a vanished device");
            }
            Err(e) => return Err(e),
        }
        self.handle.set_streaming(self.typ, false);
        Ok(())
    }
}
