use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::{fs, io};

use crate::buffer;
use crate::capability;
use crate::capability::c_field;
use crate::control;
use crate::error::{Error, OpenErrorKind, Result};
use crate::v4l2;
use crate::v4l2::videodev::{v4l2_ext_control, v4l2_ext_control_value, v4l2_ext_controls};
use crate::v4l_sys::*;
use crate::video::Capture;

mod handle;
pub use handle::Handle;

mod info;
pub(crate) use info::query_caps;
pub use info::Info;

const CTRL_WHICH_CUR_VAL: u32 = 0;

/// Linux capture device abstraction
///
/// Opening a device queries its capabilities, formats, frame sizes and controls once. The
/// snapshot is available through [`Device::info`] and never refreshed; reopen the device to see
/// changes.
pub struct Device {
    /// Raw handle
    handle: Arc<Handle>,
    /// Device node path
    path: PathBuf,
    /// Snapshot taken at open time
    info: Info,
}

impl Device {
    /// Returns a capture device by index
    ///
    /// Devices are usually enumerated by the system.
    /// An index of zero thus represents the first device the system got to know about.
    ///
    /// # Arguments
    ///
    /// * `index` - Index (0: first, 1: second, ..)
    ///
    /// # Example
    ///
    /// ```
    /// use v4l_capture::Device;
    /// let dev = Device::new(0);
    /// ```
    pub fn new(index: usize) -> Result<Self> {
        Self::with_path(format!("/dev/video{}", index))
    }

    /// Returns a capture device by path
    ///
    /// Linux device nodes are usually found in /dev/videoX or /sys/class/video4linux/videoX.
    ///
    /// # Arguments
    ///
    /// * `path` - Path (e.g. "/dev/video0")
    ///
    /// # Example
    ///
    /// ```
    /// use v4l_capture::Device;
    /// let dev = Device::with_path("/dev/video0");
    /// ```
    pub fn with_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let meta = fs::metadata(path).map_err(|e| open_error(path, e))?;
        if !meta.file_type().is_char_device() {
            return Err(Error::Open {
                path: path.to_path_buf(),
                kind: OpenErrorKind::NotCharDevice,
            });
        }

        let fd = v4l2::open(path, libc::O_RDWR | libc::O_NONBLOCK)
            .map_err(|e| open_error(path, e))?;
        let handle = Arc::new(Handle::new(fd));

        let caps = match info::query_caps(&handle) {
            Ok(caps) => caps,
            Err(Error::Device { errno }) if errno == libc::ENOTTY || errno == libc::EINVAL => {
                return Err(Error::Open {
                    path: path.to_path_buf(),
                    kind: OpenErrorKind::NotVideoDevice,
                })
            }
            Err(e) => return Err(e),
        };
        let info = Info::query(&handle, caps)?;

        log::debug!(
            "opened {} ({}, driver {} {}.{}.{}): {} formats, {} controls",
            path.display(),
            info.capabilities.card,
            info.capabilities.driver,
            info.capabilities.version.0,
            info.capabilities.version.1,
            info.capabilities.version.2,
            info.formats.iter().map(|(_, descs)| descs.len()).sum::<usize>(),
            info.controls.len(),
        );

        Ok(Device {
            handle,
            path: path.to_path_buf(),
            info,
        })
    }

    /// Returns the raw device handle
    pub fn handle(&self) -> Arc<Handle> {
        self.handle.clone()
    }

    /// Returns the path the device was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the snapshot taken when the device was opened
    pub fn info(&self) -> &Info {
        &self.info
    }

    /// Returns the video capture session, if the device can capture video
    pub fn capture(&self) -> Option<Capture> {
        self.session(buffer::Type::VideoCapture)
    }

    /// Returns a session for buffer type `typ`, if the device supports it
    pub fn session(&self, typ: buffer::Type) -> Option<Capture> {
        if self.info.buffers.contains(&typ) {
            Some(Capture::new(self.handle.clone(), typ))
        } else {
            None
        }
    }

    /// Whether the capability flags report single-planar video capture
    pub fn can_capture(&self) -> bool {
        self.info
            .capabilities
            .device_caps
            .contains(capability::Flags::VIDEO_CAPTURE)
    }

    /// Closes the device node
    ///
    /// Sessions, pools and streams created from this device fail with [`Error::Closed`]
    /// afterwards. The descriptor is released once the last of them is dropped. Closing twice
    /// does nothing.
    pub fn close(&self) -> Result<()> {
        self.handle.close()
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    /// Names of all controls, in driver order
    pub fn control_names(&self) -> impl Iterator<Item = &str> {
        self.info.controls.iter().map(|ctrl| ctrl.name.as_str())
    }

    /// Looks up a control description by name, ignoring case
    pub fn control(&self, name: &str) -> Option<&control::Description> {
        self.info
            .controls
            .iter()
            .find(|ctrl| ctrl.name.eq_ignore_ascii_case(name))
    }

    fn lookup(&self, name: &str) -> Result<&control::Description> {
        self.control(name)
            .ok_or_else(|| Error::Validation(format!("unknown control '{}'", name)))
    }

    /// Reads the current value of a control
    ///
    /// # Arguments
    ///
    /// * `name` - Control name as reported by the driver, matched case-insensitively
    ///
    /// # Example
    ///
    /// ```
    /// use v4l_capture::Device;
    ///
    /// if let Ok(dev) = Device::new(0) {
    ///     let brightness = dev.get_control("brightness");
    /// }
    /// ```
    pub fn get_control(&self, name: &str) -> Result<control::Value> {
        let desc = self.lookup(name)?;

        if desc.has_payload() {
            let mut size = desc.payload_size();
            if desc.typ == control::Type::String {
                size += 1;
            }
            let mut data = vec![0u8; size];
            let mut ctrl = v4l2_ext_control {
                id: desc.id,
                size: size as u32,
                reserved2: [0],
                value: v4l2_ext_control_value {
                    ptr: data.as_mut_ptr() as *mut std::os::raw::c_void,
                },
            };
            self.ext_control(v4l2::vidioc::VIDIOC_G_EXT_CTRLS, &mut ctrl)?;

            let value = match (desc.typ, desc.elem_size) {
                (control::Type::String, _) => control::Value::String(c_field(&data)),
                (_, 1) => control::Value::CompoundU8(data),
                (_, 2) => control::Value::CompoundU16(
                    data.chunks_exact(2)
                        .map(|b| u16::from_ne_bytes([b[0], b[1]]))
                        .collect(),
                ),
                (_, 4) => control::Value::CompoundU32(
                    data.chunks_exact(4)
                        .map(|b| u32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
                        .collect(),
                ),
                _ => control::Value::CompoundPtr(data),
            };
            return Ok(value);
        }

        if desc.typ == control::Type::Integer64 {
            let mut ctrl = v4l2_ext_control {
                id: desc.id,
                size: 0,
                reserved2: [0],
                value: v4l2_ext_control_value { value64: 0 },
            };
            self.ext_control(v4l2::vidioc::VIDIOC_G_EXT_CTRLS, &mut ctrl)?;
            return Ok(control::Value::Integer(unsafe { ctrl.value.value64 }));
        }

        let mut v4l2_ctrl = v4l2_control {
            id: desc.id,
            value: 0,
        };
        unsafe {
            self.handle.ioctl(v4l2::vidioc::VIDIOC_G_CTRL, &mut v4l2_ctrl)?;
        }

        Ok(match desc.typ {
            control::Type::Boolean => control::Value::Boolean(v4l2_ctrl.value != 0),
            control::Type::Button => control::Value::None,
            _ => control::Value::Integer(v4l2_ctrl.value as i64),
        })
    }

    /// Modifies the value of a control
    ///
    /// The value is checked against the range and element count the driver reported before it
    /// is handed to the kernel. String controls cannot be written.
    ///
    /// # Arguments
    ///
    /// * `name` - Control name as reported by the driver, matched case-insensitively
    /// * `value` - New value
    pub fn set_control(&self, name: &str, value: control::Value) -> Result<()> {
        let desc = self.lookup(name)?;
        desc.validate(&value)?;

        if desc.has_payload() {
            let mut data: Vec<u8> = match value {
                control::Value::CompoundU8(v) | control::Value::CompoundPtr(v) => v,
                control::Value::CompoundU16(v) => v.iter().flat_map(|e| e.to_ne_bytes()).collect(),
                control::Value::CompoundU32(v) => v.iter().flat_map(|e| e.to_ne_bytes()).collect(),
                other => {
                    return Err(Error::Validation(format!(
                        "control '{}' takes an array, got {:?}",
                        desc.name, other
                    )))
                }
            };
            data.resize(desc.payload_size(), 0);
            let mut ctrl = v4l2_ext_control {
                id: desc.id,
                size: data.len() as u32,
                reserved2: [0],
                value: v4l2_ext_control_value {
                    ptr: data.as_mut_ptr() as *mut std::os::raw::c_void,
                },
            };
            return self.ext_control(v4l2::vidioc::VIDIOC_S_EXT_CTRLS, &mut ctrl);
        }

        let raw = match value {
            control::Value::None => 0,
            control::Value::Integer(v) => v,
            control::Value::Boolean(v) => v as i64,
            other => {
                return Err(Error::Validation(format!(
                    "control '{}' takes a single value, got {:?}",
                    desc.name, other
                )))
            }
        };

        if desc.typ == control::Type::Integer64 {
            let mut ctrl = v4l2_ext_control {
                id: desc.id,
                size: 0,
                reserved2: [0],
                value: v4l2_ext_control_value { value64: raw },
            };
            return self.ext_control(v4l2::vidioc::VIDIOC_S_EXT_CTRLS, &mut ctrl);
        }

        let mut v4l2_ctrl = v4l2_control {
            id: desc.id,
            value: raw as i32,
        };
        unsafe {
            self.handle.ioctl(v4l2::vidioc::VIDIOC_S_CTRL, &mut v4l2_ctrl)
        }
    }

    fn ext_control(
        &self,
        request: v4l2::vidioc::_IOC_TYPE,
        ctrl: &mut v4l2_ext_control,
    ) -> Result<()> {
        let mut ctrls = v4l2_ext_controls {
            which: CTRL_WHICH_CUR_VAL,
            count: 1,
            error_idx: 0,
            request_fd: 0,
            reserved: 0,
            controls: ctrl as *mut v4l2_ext_control,
        };

        unsafe { self.handle.ioctl(request, &mut ctrls) }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if let Err(e) = self.handle.close() {
            log::warn!("failed to close {}: {}", self.path.display(), e);
        }
    }
}

fn open_error(path: &Path, e: io::Error) -> Error {
    let kind = match e.raw_os_error() {
        Some(libc::ENOENT) | Some(libc::ENOTDIR) => OpenErrorKind::NotFound,
        Some(libc::EACCES) | Some(libc::EPERM) => OpenErrorKind::PermissionDenied,
        Some(errno) => OpenErrorKind::Other(errno),
        None => return Error::Io(e),
    };

    Error::Open {
        path: path.to_path_buf(),
        kind,
    }
}
