use std::convert::TryFrom;
use std::{fmt, mem};

use crate::buffer;
use crate::capability::Capabilities;
use crate::control;
use crate::device::Handle;
use crate::error::{Error, Result};
use crate::format::{Description as FormatDescription, FourCC};
use crate::frameinterval::FrameInterval;
use crate::framesize::FrameSize;
use crate::selection::CropCapability;
use crate::v4l2;
use crate::v4l_sys::*;

/// Upper bound for every index based enumeration, some drivers never report the end
const MAX_ENTRIES: u32 = 128;
const MAX_CONTROLS: usize = 1024;

const CTRL_FLAG_NEXT_CTRL: u32 = 0x8000_0000;
const CTRL_FLAG_NEXT_COMPOUND: u32 = 0x4000_0000;

/// Static description of a device, queried once when it is opened
#[derive(Debug, Clone)]
pub struct Info {
    /// Driver, card, bus and capability flags
    pub capabilities: Capabilities,
    /// Buffer types the device node can stream
    pub buffers: Vec<buffer::Type>,
    /// Pixel formats per image buffer type
    pub formats: Vec<(buffer::Type, Vec<FormatDescription>)>,
    /// Frame sizes of every enumerated pixel format
    pub frame_sizes: Vec<FrameSize>,
    /// Frame intervals of every discrete frame size
    pub frame_intervals: Vec<FrameInterval>,
    /// Cropping limits per buffer type, for the types that report them
    pub crop_capabilities: Vec<(buffer::Type, CropCapability)>,
    /// User visible controls, without disabled ones and class headers
    pub controls: Vec<control::Description>,
}

impl Info {
    pub(crate) fn query(handle: &Handle, capabilities: Capabilities) -> Result<Self> {
        let buffers = buffer::Type::from_capabilities(capabilities.device_caps);

        let mut formats = Vec::new();
        for typ in buffers.iter().filter(|typ| typ.is_image()) {
            formats.push((*typ, enum_formats(handle, *typ)?));
        }

        let mut fourccs: Vec<FourCC> = Vec::new();
        for desc in formats.iter().flat_map(|(_, descs)| descs.iter()) {
            if !fourccs.contains(&desc.fourcc) {
                fourccs.push(desc.fourcc);
            }
        }

        let mut frame_sizes = Vec::new();
        let mut frame_intervals = Vec::new();
        for fourcc in fourccs {
            let sizes = enum_framesizes(handle, fourcc)?;
            for size in sizes.iter().filter_map(|size| size.size.discrete()) {
                frame_intervals.extend(enum_frameintervals(
                    handle,
                    fourcc,
                    size.width,
                    size.height,
                )?);
            }
            frame_sizes.extend(sizes);
        }

        let crop_capabilities = buffers
            .iter()
            .filter(|typ| {
                matches!(
                    typ,
                    buffer::Type::VideoCapture
                        | buffer::Type::VideoOutput
                        | buffer::Type::VideoOverlay
                )
            })
            .filter_map(|typ| match crop_capability(handle, *typ) {
                Ok(cap) => Some((*typ, cap)),
                Err(e) => {
                    log::debug!("no crop capabilities for {}: {}", typ, e);
                    None
                }
            })
            .collect();

        let controls = query_controls(handle)?;

        Ok(Info {
            capabilities,
            buffers,
            formats,
            frame_sizes,
            frame_intervals,
            crop_capabilities,
            controls,
        })
    }

    /// Pixel formats of buffer type `typ`, empty if the type is not supported
    pub fn formats(&self, typ: buffer::Type) -> &[FormatDescription] {
        self.formats
            .iter()
            .find(|(t, _)| *t == typ)
            .map(|(_, descs)| descs.as_slice())
            .unwrap_or(&[])
    }

    /// Frame sizes reported for `fourcc`
    pub fn frame_sizes(&self, fourcc: FourCC) -> impl Iterator<Item = &FrameSize> {
        self.frame_sizes
            .iter()
            .filter(move |size| size.fourcc == fourcc)
    }
}

impl fmt::Display for Info {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.capabilities)?;
        for (typ, descs) in &self.formats {
            writeln!(f, "{} formats:", typ)?;
            for desc in descs {
                writeln!(f, "  {} ({})", desc.fourcc, desc.description)?;
                for size in self.frame_sizes(desc.fourcc) {
                    writeln!(f, "    {}", size)?;
                }
            }
        }
        for (typ, cap) in &self.crop_capabilities {
            writeln!(f, "{} crop bounds: {}", typ, cap.bounds)?;
        }
        writeln!(f, "Controls:")?;
        for ctrl in &self.controls {
            writeln!(f, "  {} ({})", ctrl.name, ctrl.typ)?;
        }
        Ok(())
    }
}

/// Calls `query` with increasing indices until the driver reports the end of the list.
///
/// `EINVAL` marks the end. With `missing_ok`, a driver that does not implement the request at all
/// (`ENOTTY`) yields an empty list.
fn enumerate<T>(missing_ok: bool, mut query: impl FnMut(u32) -> Result<T>) -> Result<Vec<T>> {
    let mut entries = Vec::new();
    for index in 0..MAX_ENTRIES {
        match query(index) {
            Ok(entry) => entries.push(entry),
            Err(Error::Device { errno }) if errno == libc::EINVAL => return Ok(entries),
            Err(Error::Device { errno }) if errno == libc::ENOTTY && missing_ok => {
                return Ok(entries)
            }
            Err(e) => return Err(e),
        }
    }

    log::warn!("enumeration stopped after {} entries", MAX_ENTRIES);
    Ok(entries)
}

pub(crate) fn query_caps(handle: &Handle) -> Result<Capabilities> {
    unsafe {
        let mut v4l2_caps: v4l2_capability = mem::zeroed();
        handle.ioctl(v4l2::vidioc::VIDIOC_QUERYCAP, &mut v4l2_caps)?;
        Ok(Capabilities::from(v4l2_caps))
    }
}

pub(crate) fn enum_formats(handle: &Handle, typ: buffer::Type) -> Result<Vec<FormatDescription>> {
    enumerate(false, |index| unsafe {
        let mut v4l2_fmt = v4l2_fmtdesc {
            index,
            type_: typ as u32,
            ..mem::zeroed()
        };
        handle.ioctl(v4l2::vidioc::VIDIOC_ENUM_FMT, &mut v4l2_fmt)?;
        Ok(FormatDescription::from(v4l2_fmt))
    })
}

pub(crate) fn enum_framesizes(handle: &Handle, fourcc: FourCC) -> Result<Vec<FrameSize>> {
    let sizes = enumerate(true, |index| unsafe {
        let mut v4l2_struct = v4l2_frmsizeenum {
            index,
            pixel_format: fourcc.into(),
            ..mem::zeroed()
        };
        handle.ioctl(v4l2::vidioc::VIDIOC_ENUM_FRAMESIZES, &mut v4l2_struct)?;
        Ok(FrameSize::try_from(v4l2_struct))
    })?;

    Ok(sizes
        .into_iter()
        .filter_map(|size| size.map_err(|e| log::warn!("{}", e)).ok())
        .collect())
}

pub(crate) fn enum_frameintervals(
    handle: &Handle,
    fourcc: FourCC,
    width: u32,
    height: u32,
) -> Result<Vec<FrameInterval>> {
    let intervals = enumerate(true, |index| unsafe {
        let mut v4l2_struct = v4l2_frmivalenum {
            index,
            pixel_format: fourcc.into(),
            width,
            height,
            ..mem::zeroed()
        };
        handle.ioctl(v4l2::vidioc::VIDIOC_ENUM_FRAMEINTERVALS, &mut v4l2_struct)?;
        Ok(FrameInterval::try_from(v4l2_struct))
    })?;

    Ok(intervals
        .into_iter()
        .filter_map(|interval| interval.map_err(|e| log::warn!("{}", e)).ok())
        .collect())
}

pub(crate) fn crop_capability(handle: &Handle, typ: buffer::Type) -> Result<CropCapability> {
    unsafe {
        let mut v4l2_cropcap = v4l2_cropcap {
            type_: typ as u32,
            ..mem::zeroed()
        };
        handle.ioctl(v4l2::vidioc::VIDIOC_CROPCAP, &mut v4l2_cropcap)?;
        Ok(CropCapability::from(v4l2_cropcap))
    }
}

fn query_menu(handle: &Handle, ctrl: &control::Description) -> Vec<(u32, control::MenuItem)> {
    let step = ctrl.step.max(1) as usize;
    let mut items = Vec::new();

    for index in (ctrl.minimum..=ctrl.maximum)
        .step_by(step)
        .take(MAX_ENTRIES as usize)
    {
        let mut v4l2_menu: v4l2_querymenu = unsafe { mem::zeroed() };
        v4l2_menu.id = ctrl.id;
        v4l2_menu.index = index as u32;

        // VIDIOC_QUERYMENU may fail for some indices between minimum and maximum when a driver
        // does not support that particular item. Skip those.
        if unsafe { handle.ioctl(v4l2::vidioc::VIDIOC_QUERYMENU, &mut v4l2_menu) }.is_err() {
            continue;
        }

        if let Ok(item) = control::MenuItem::try_from((ctrl.typ, v4l2_menu)) {
            items.push((index as u32, item));
        }
    }

    items
}

pub(crate) fn query_controls(handle: &Handle) -> Result<Vec<control::Description>> {
    let mut controls = Vec::new();
    let mut id = 0;

    for _ in 0..MAX_CONTROLS {
        let mut v4l2_ctrl: v4l2_query_ext_ctrl = unsafe { mem::zeroed() };
        v4l2_ctrl.id = id | CTRL_FLAG_NEXT_CTRL | CTRL_FLAG_NEXT_COMPOUND;

        match unsafe { handle.ioctl(v4l2::vidioc::VIDIOC_QUERY_EXT_CTRL, &mut v4l2_ctrl) } {
            Ok(()) => {}
            Err(Error::Device { errno }) if errno == libc::EINVAL || errno == libc::ENOTTY => {
                return Ok(controls)
            }
            Err(e) => return Err(e),
        }
        id = v4l2_ctrl.id;

        let mut ctrl = control::Description::from(v4l2_ctrl);
        if ctrl.flags.contains(control::Flags::DISABLED) || ctrl.typ == control::Type::CtrlClass {
            continue;
        }
        if ctrl.typ == control::Type::Menu || ctrl.typ == control::Type::IntegerMenu {
            ctrl.items = Some(query_menu(handle, &ctrl));
        }

        log::trace!("control {:#x} '{}' ({})", ctrl.id, ctrl.name, ctrl.typ);
        controls.push(ctrl);
    }

    log::warn!("control enumeration stopped after {} entries", MAX_CONTROLS);
    Ok(controls)
}
