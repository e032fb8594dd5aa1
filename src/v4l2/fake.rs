//! In-process V4L2 capture driver used by the unit tests.
//!
//! Every opened "device" is backed by a real, non-blocking semaphore `eventfd`. Completed buffers
//! bump the counter and dequeues drain it, so `poll(2)` and the tokio reactor observe the same
//! readiness a real driver would report. State is thread local; each test runs on its own thread.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::os::raw::{c_char, c_int, c_void};
use std::{mem, ptr, slice};

use crate::v4l2::videodev::{v4l2_ext_controls, v4l2_ext_rect, v4l2_selection};
use crate::v4l2::vidioc::{self, _IOC_TYPE};
use crate::v4l_sys::*;

pub const CID_BRIGHTNESS: u32 = 0x0098_0900;
pub const CID_CONTRAST: u32 = 0x0098_0901;
pub const CID_POWER_LINE: u32 = 0x0098_0918;
pub const CID_LABEL: u32 = 0x0098_1000;
pub const CID_LUT: u32 = 0x0098_1001;
pub const CID_PIXEL_RATE: u32 = 0x0098_1002;
pub const CID_GAIN_MAP: u32 = 0x0098_1003;

const CAP_VIDEO_CAPTURE: u32 = 0x0000_0001;
const CAP_STREAMING: u32 = 0x0400_0000;
const CAP_DEVICE_CAPS: u32 = 0x8000_0000;

const FLAG_NEXT_CTRL: u32 = 0x8000_0000;
const FLAG_NEXT_COMPOUND: u32 = 0x4000_0000;

const BUF_FLAG_MAPPED: u32 = 0x0001;
const BUF_FLAG_QUEUED: u32 = 0x0002;
const BUF_FLAG_DONE: u32 = 0x0004;
const BUF_FLAG_TIMESTAMP_MONOTONIC: u32 = 0x2000;

const OFFSET_STRIDE: u32 = 0x0010_0000;

const MJPG: u32 = u32::from_le_bytes(*b"MJPG");
const YUYV: u32 = u32::from_le_bytes(*b"YUYV");
const SIZES: [(u32, u32); 2] = [(640, 480), (1280, 720)];
const INTERVALS: [(u32, u32); 2] = [(1, 30), (1, 15)];

/// Knobs of the next device opened on this thread
#[derive(Debug, Clone)]
pub struct Config {
    /// Answer `VIDIOC_QUERYCAP` at all
    pub video: bool,
    /// Device capability flags
    pub capabilities: u32,
    /// Upper bound for `VIDIOC_REQBUFS`
    pub max_buffers: u32,
    /// Length of each buffer as reported by `VIDIOC_QUERYBUF`
    pub buffer_len: u32,
    /// Bytes the driver claims to have written per frame
    pub frame_len: u32,
    /// Make `mmap` fail for this buffer index
    pub fail_mmap_at: Option<u32>,
    /// Understand the multi-rectangle selection extension
    pub multi_selection: bool,
    /// Never end `VIDIOC_ENUM_FMT` with `EINVAL`
    pub endless_formats: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            video: true,
            capabilities: CAP_VIDEO_CAPTURE | CAP_STREAMING,
            max_buffers: 8,
            buffer_len: 640 * 480 * 2,
            frame_len: 4096,
            fail_mmap_at: None,
            multi_selection: false,
            endless_formats: false,
        }
    }
}

struct Control {
    id: u32,
    typ: u32,
    name: &'static str,
    minimum: i64,
    maximum: i64,
    step: u64,
    default: i64,
    flags: u32,
    elem_size: u32,
    elems: u32,
    value: i64,
    payload: Vec<u8>,
}

impl Control {
    fn simple(id: u32, typ: u32, name: &'static str, range: (i64, i64), default: i64) -> Self {
        Control {
            id,
            typ,
            name,
            minimum: range.0,
            maximum: range.1,
            step: 1,
            default,
            flags: 0,
            elem_size: if typ == 5 { 8 } else { 4 },
            elems: 1,
            value: default,
            payload: Vec::new(),
        }
    }

    fn has_payload(&self) -> bool {
        self.flags & 0x0100 != 0
    }
}

fn controls() -> Vec<Control> {
    let class = Control {
        elem_size: 0,
        flags: 0x0001 | 0x0004,
        ..Control::simple(0x0098_0001, 6, "User Controls", (0, 0), 0)
    };
    let contrast = Control {
        flags: 0x0001,
        ..Control::simple(CID_CONTRAST, 1, "Contrast", (0, 100), 50)
    };
    let label = Control {
        flags: 0x0100,
        elem_size: 17,
        payload: b"camera".to_vec(),
        ..Control::simple(CID_LABEL, 7, "Label", (0, 16), 0)
    };
    let lut = Control {
        flags: 0x0100,
        elem_size: 1,
        elems: 4,
        payload: vec![0, 85, 170, 255],
        ..Control::simple(CID_LUT, 0x0100, "Lens Shading LUT", (0, 255), 0)
    };
    let gain_map = Control {
        flags: 0x0100,
        elem_size: 3,
        elems: 2,
        payload: vec![10, 20, 30, 40, 50, 60],
        ..Control::simple(CID_GAIN_MAP, 0x0190, "Gain Map", (0, 100), 0)
    };
    let pixel_rate = Control {
        flags: 0x0004,
        value: 48_000_000_000,
        ..Control::simple(CID_PIXEL_RATE, 5, "Pixel Rate", (0, i64::MAX), 0)
    };

    vec![
        class,
        Control::simple(CID_BRIGHTNESS, 1, "Brightness", (0, 255), 128),
        contrast,
        Control::simple(CID_POWER_LINE, 3, "Power Line Frequency", (0, 2), 1),
        label,
        lut,
        gain_map,
        pixel_rate,
    ]
}

struct Buffer {
    length: u32,
    queued: bool,
    mapping: Option<usize>,
    bytesused: u32,
    sequence: u32,
}

struct Device {
    config: Config,
    calls: Vec<_IOC_TYPE>,
    format: v4l2_pix_format,
    interval: v4l2_fract,
    crop: v4l2_rect,
    selection: Vec<v4l2_rect>,
    controls: Vec<Control>,
    buffers: Vec<Buffer>,
    incoming: VecDeque<u32>,
    done: VecDeque<u32>,
    streaming: bool,
    sequence: u32,
}

fn rect(left: i32, top: i32, width: u32, height: u32) -> v4l2_rect {
    v4l2_rect {
        left,
        top,
        width,
        height,
    }
}

impl Device {
    fn new(config: Config) -> Self {
        let mut format: v4l2_pix_format = unsafe { mem::zeroed() };
        format.width = 640;
        format.height = 480;
        format.pixelformat = YUYV;
        format.field = 1;
        format.bytesperline = 640 * 2;
        format.sizeimage = 640 * 480 * 2;

        Device {
            config,
            calls: Vec::new(),
            format,
            interval: v4l2_fract {
                numerator: 1,
                denominator: 30,
            },
            crop: rect(0, 0, 1280, 720),
            selection: vec![rect(0, 0, 1280, 720)],
            controls: controls(),
            buffers: Vec::new(),
            incoming: VecDeque::new(),
            done: VecDeque::new(),
            streaming: false,
            sequence: 0,
        }
    }
}

thread_local! {
    static NEXT: RefCell<Config> = RefCell::new(Config::default());
    static DEVICES: RefCell<HashMap<c_int, Device>> = RefCell::new(HashMap::new());
    static MAPPINGS: RefCell<HashMap<usize, (c_int, usize)>> = RefCell::new(HashMap::new());
}

/// Sets the configuration used by the next `open` on this thread.
pub fn configure(config: Config) {
    NEXT.with(|next| *next.borrow_mut() = config);
}

/// Request codes received by `fd`, in order.
pub fn calls(fd: c_int) -> Vec<_IOC_TYPE> {
    DEVICES.with(|devices| {
        devices
            .borrow()
            .get(&fd)
            .map(|dev| dev.calls.clone())
            .unwrap_or_default()
    })
}

/// Number of times `fd` received `request`.
pub fn count(fd: c_int, request: _IOC_TYPE) -> usize {
    calls(fd).into_iter().filter(|&r| r == request).count()
}

/// Forgets the recorded calls of `fd`.
pub fn clear_calls(fd: c_int) {
    DEVICES.with(|devices| {
        if let Some(dev) = devices.borrow_mut().get_mut(&fd) {
            dev.calls.clear();
        }
    });
}

/// Number of buffer mappings on this thread that were never unmapped.
pub fn live_mappings() -> usize {
    MAPPINGS.with(|maps| maps.borrow().len())
}

pub fn is_open(fd: c_int) -> bool {
    DEVICES.with(|devices| devices.borrow().contains_key(&fd))
}

pub fn is_streaming(fd: c_int) -> bool {
    DEVICES.with(|devices| devices.borrow().get(&fd).map_or(false, |dev| dev.streaming))
}

/// Number of buffers currently owned by the driver.
pub fn queued(fd: c_int) -> usize {
    DEVICES.with(|devices| {
        devices
            .borrow()
            .get(&fd)
            .map_or(0, |dev| dev.buffers.iter().filter(|b| b.queued).count())
    })
}

fn fail<T>(errno: c_int, ret: T) -> T {
    unsafe { *libc::__errno_location() = errno };
    ret
}

fn signal(fd: c_int) {
    let one: u64 = 1;
    unsafe { libc::write(fd, &one as *const u64 as *const c_void, 8) };
}

fn drain(fd: c_int) {
    let mut value: u64 = 0;
    while unsafe { libc::read(fd, &mut value as *mut u64 as *mut c_void, 8) } == 8 {}
}

pub unsafe fn open(_path: *const c_char, _flags: i32) -> c_int {
    let fd = libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_SEMAPHORE | libc::EFD_CLOEXEC);
    if fd == -1 {
        return -1;
    }

    let config = NEXT.with(|next| next.borrow().clone());
    DEVICES.with(|devices| devices.borrow_mut().insert(fd, Device::new(config)));
    fd
}

pub unsafe fn close(fd: c_int) -> c_int {
    let known = DEVICES.with(|devices| devices.borrow_mut().remove(&fd).is_some());
    if !known {
        return fail(libc::EBADF, -1);
    }
    libc::close(fd)
}

pub unsafe fn mmap(
    _start: *mut c_void,
    length: usize,
    _prot: c_int,
    _flags: c_int,
    fd: c_int,
    offset: libc::off_t,
) -> *mut c_void {
    let index = (offset as u64 / OFFSET_STRIDE as u64) as u32;
    let result = DEVICES.with(|devices| {
        let mut devices = devices.borrow_mut();
        let dev = match devices.get_mut(&fd) {
            Some(dev) => dev,
            None => return Err(libc::EBADF),
        };
        if dev.config.fail_mmap_at == Some(index) {
            return Err(libc::ENOMEM);
        }
        let buf = match dev.buffers.get_mut(index as usize) {
            Some(buf) if buf.length as usize == length => buf,
            _ => return Err(libc::EINVAL),
        };

        let memory = Box::into_raw(vec![0u8; length].into_boxed_slice()) as *mut u8 as usize;
        buf.mapping = Some(memory);
        Ok(memory)
    });

    match result {
        Ok(addr) => {
            MAPPINGS.with(|maps| maps.borrow_mut().insert(addr, (fd, length)));
            addr as *mut c_void
        }
        Err(errno) => fail(errno, libc::MAP_FAILED),
    }
}

pub unsafe fn munmap(start: *mut c_void, length: usize) -> c_int {
    let addr = start as usize;
    let entry = MAPPINGS.with(|maps| maps.borrow_mut().remove(&addr));
    let (fd, len) = match entry {
        Some(entry) if entry.1 == length => entry,
        Some(entry) => {
            MAPPINGS.with(|maps| maps.borrow_mut().insert(addr, entry));
            return fail(libc::EINVAL, -1);
        }
        None => return fail(libc::EINVAL, -1),
    };

    drop(Box::from_raw(ptr::slice_from_raw_parts_mut(addr as *mut u8, len)));
    DEVICES.with(|devices| {
        if let Some(dev) = devices.borrow_mut().get_mut(&fd) {
            for buf in dev.buffers.iter_mut() {
                if buf.mapping == Some(addr) {
                    buf.mapping = None;
                }
            }
        }
    });
    0
}

pub unsafe fn ioctl(fd: c_int, request: _IOC_TYPE, argp: *mut c_void) -> c_int {
    let result = DEVICES.with(|devices| {
        let mut devices = devices.borrow_mut();
        match devices.get_mut(&fd) {
            Some(dev) => {
                dev.calls.push(request);
                dispatch(dev, fd, request, argp)
            }
            None => Err(libc::EBADF),
        }
    });

    match result {
        Ok(()) => 0,
        Err(errno) => fail(errno, -1),
    }
}

fn copy_str(dst: &mut [u8], src: &str) {
    let n = src.len().min(dst.len() - 1);
    dst[..n].copy_from_slice(&src.as_bytes()[..n]);
}

fn complete(dev: &mut Device, fd: c_int, index: u32) {
    let frame_len = dev.config.frame_len;
    dev.sequence += 1;
    let sequence = dev.sequence;

    let buf = &mut dev.buffers[index as usize];
    buf.bytesused = frame_len.min(buf.length);
    buf.sequence = sequence;
    if let Some(addr) = buf.mapping {
        let data = unsafe { slice::from_raw_parts_mut(addr as *mut u8, buf.length as usize) };
        data[..buf.bytesused as usize].fill((sequence % 251) as u8);
    }

    dev.done.push_back(index);
    signal(fd);
}

unsafe fn dispatch(
    dev: &mut Device,
    fd: c_int,
    request: _IOC_TYPE,
    argp: *mut c_void,
) -> Result<(), c_int> {
    match request {
        vidioc::VIDIOC_QUERYCAP => {
            if !dev.config.video {
                return Err(libc::ENOTTY);
            }
            let cap = &mut *(argp as *mut v4l2_capability);
            copy_str(&mut cap.driver, "fake");
            copy_str(&mut cap.card, "Fake Camera");
            copy_str(&mut cap.bus_info, "platform:fake");
            cap.version = (6 << 16) | (1 << 8) | 7;
            cap.capabilities = dev.config.capabilities | CAP_DEVICE_CAPS;
            cap.device_caps = dev.config.capabilities;
            Ok(())
        }
        vidioc::VIDIOC_ENUM_FMT => {
            let desc = &mut *(argp as *mut v4l2_fmtdesc);
            if desc.type_ != 1 {
                return Err(libc::EINVAL);
            }
            match desc.index {
                0 => {
                    desc.pixelformat = MJPG;
                    desc.flags = 0x0001;
                    copy_str(&mut desc.description, "Motion-JPEG");
                }
                1 => {
                    desc.pixelformat = YUYV;
                    desc.flags = 0;
                    copy_str(&mut desc.description, "YUYV 4:2:2");
                }
                _ if dev.config.endless_formats => {
                    desc.pixelformat = YUYV;
                    desc.flags = 0;
                    copy_str(&mut desc.description, "YUYV 4:2:2 (again)");
                }
                _ => return Err(libc::EINVAL),
            }
            Ok(())
        }
        vidioc::VIDIOC_ENUM_FRAMESIZES => {
            let desc = &mut *(argp as *mut v4l2_frmsizeenum);
            if desc.pixel_format != MJPG && desc.pixel_format != YUYV {
                return Err(libc::EINVAL);
            }
            let (width, height) = *SIZES.get(desc.index as usize).ok_or(libc::EINVAL)?;
            desc.type_ = v4l2_frmsizetypes_V4L2_FRMSIZE_TYPE_DISCRETE;
            desc.__bindgen_anon_1.discrete.width = width;
            desc.__bindgen_anon_1.discrete.height = height;
            Ok(())
        }
        vidioc::VIDIOC_ENUM_FRAMEINTERVALS => {
            let desc = &mut *(argp as *mut v4l2_frmivalenum);
            if !SIZES.contains(&(desc.width, desc.height)) {
                return Err(libc::EINVAL);
            }
            let (numerator, denominator) =
                *INTERVALS.get(desc.index as usize).ok_or(libc::EINVAL)?;
            desc.type_ = v4l2_frmivaltypes_V4L2_FRMIVAL_TYPE_DISCRETE;
            desc.__bindgen_anon_1.discrete = v4l2_fract {
                numerator,
                denominator,
            };
            Ok(())
        }
        vidioc::VIDIOC_CROPCAP => {
            let cap = &mut *(argp as *mut v4l2_cropcap);
            if cap.type_ != 1 {
                return Err(libc::EINVAL);
            }
            cap.bounds = rect(0, 0, 1280, 720);
            cap.defrect = rect(0, 0, 1280, 720);
            cap.pixelaspect = v4l2_fract {
                numerator: 1,
                denominator: 1,
            };
            Ok(())
        }
        vidioc::VIDIOC_QUERY_EXT_CTRL => {
            let query = &mut *(argp as *mut v4l2_query_ext_ctrl);
            let next = query.id & (FLAG_NEXT_CTRL | FLAG_NEXT_COMPOUND) != 0;
            let id = query.id & !(FLAG_NEXT_CTRL | FLAG_NEXT_COMPOUND);
            let ctrl = if next {
                dev.controls.iter().find(|c| c.id > id)
            } else {
                dev.controls.iter().find(|c| c.id == id)
            }
            .ok_or(libc::EINVAL)?;

            *query = mem::zeroed();
            query.id = ctrl.id;
            query.type_ = ctrl.typ;
            for (dst, src) in query.name.iter_mut().zip(ctrl.name.bytes()) {
                *dst = src as c_char;
            }
            query.minimum = ctrl.minimum;
            query.maximum = ctrl.maximum;
            query.step = ctrl.step;
            query.default_value = ctrl.default;
            query.flags = ctrl.flags;
            query.elem_size = ctrl.elem_size;
            query.elems = ctrl.elems;
            if ctrl.elems > 1 {
                query.nr_of_dims = 1;
                query.dims[0] = ctrl.elems;
            }
            Ok(())
        }
        vidioc::VIDIOC_QUERYMENU => {
            let menu = &mut *(argp as *mut v4l2_querymenu);
            if menu.id != CID_POWER_LINE {
                return Err(libc::EINVAL);
            }
            let name: &str = match menu.index {
                0 => "Disabled",
                2 => "60 Hz",
                _ => return Err(libc::EINVAL),
            };
            let mut buf = [0u8; 32];
            copy_str(&mut buf, name);
            menu.__bindgen_anon_1.name = buf;
            Ok(())
        }
        vidioc::VIDIOC_G_CTRL | vidioc::VIDIOC_S_CTRL => {
            let control = &mut *(argp as *mut v4l2_control);
            let ctrl = dev
                .controls
                .iter_mut()
                .find(|c| c.id == control.id && !c.has_payload() && c.typ != 6)
                .ok_or(libc::EINVAL)?;
            if request == vidioc::VIDIOC_G_CTRL {
                control.value = ctrl.value as i32;
            } else {
                let value = control.value as i64;
                if value < ctrl.minimum || value > ctrl.maximum {
                    return Err(libc::ERANGE);
                }
                ctrl.value = value;
            }
            Ok(())
        }
        vidioc::VIDIOC_G_EXT_CTRLS | vidioc::VIDIOC_S_EXT_CTRLS => {
            let ext = &mut *(argp as *mut v4l2_ext_controls);
            let list = slice::from_raw_parts_mut(ext.controls, ext.count as usize);
            for (i, item) in list.iter_mut().enumerate() {
                let id = item.id;
                let size = item.size;
                let ctrl = match dev.controls.iter_mut().find(|c| c.id == id) {
                    Some(ctrl) => ctrl,
                    None => {
                        ext.error_idx = i as u32;
                        return Err(libc::EINVAL);
                    }
                };

                if ctrl.has_payload() {
                    let needed = ctrl.elem_size * ctrl.elems;
                    if size < needed {
                        item.size = needed;
                        return Err(libc::ENOSPC);
                    }
                    let data = slice::from_raw_parts_mut(item.value.ptr as *mut u8, size as usize);
                    if request == vidioc::VIDIOC_G_EXT_CTRLS {
                        data.fill(0);
                        data[..ctrl.payload.len()].copy_from_slice(&ctrl.payload);
                    } else if ctrl.typ == 7 {
                        let len = data.iter().position(|&b| b == 0).unwrap_or(data.len());
                        ctrl.payload = data[..len].to_vec();
                    } else {
                        ctrl.payload = data[..needed as usize].to_vec();
                    }
                } else if request == vidioc::VIDIOC_G_EXT_CTRLS {
                    item.value.value64 = ctrl.value;
                } else {
                    ctrl.value = item.value.value64;
                }
            }
            Ok(())
        }
        vidioc::VIDIOC_G_FMT | vidioc::VIDIOC_S_FMT | vidioc::VIDIOC_TRY_FMT => {
            let format = &mut *(argp as *mut v4l2_format);
            if format.type_ != 1 {
                return Err(libc::EINVAL);
            }
            if request == vidioc::VIDIOC_G_FMT {
                format.fmt.pix = dev.format;
                return Ok(());
            }
            if request == vidioc::VIDIOC_S_FMT && (dev.streaming || !dev.buffers.is_empty()) {
                return Err(libc::EBUSY);
            }

            let mut pix = format.fmt.pix;
            if pix.pixelformat != MJPG && pix.pixelformat != YUYV {
                pix.pixelformat = YUYV;
            }
            if !SIZES.contains(&(pix.width, pix.height)) {
                pix.width = 640;
                pix.height = 480;
            }
            pix.field = 1;
            pix.bytesperline = if pix.pixelformat == YUYV {
                pix.width * 2
            } else {
                0
            };
            pix.sizeimage = pix.width * pix.height * 2;
            format.fmt.pix = pix;
            if request == vidioc::VIDIOC_S_FMT {
                dev.format = pix;
            }
            Ok(())
        }
        vidioc::VIDIOC_G_PARM | vidioc::VIDIOC_S_PARM => {
            let params = &mut *(argp as *mut v4l2_streamparm);
            if params.type_ != 1 {
                return Err(libc::EINVAL);
            }
            if request == vidioc::VIDIOC_S_PARM {
                let frac = params.parm.capture.timeperframe;
                if frac.numerator != 0 && frac.denominator != 0 {
                    dev.interval = frac;
                }
            }
            params.parm.capture = mem::zeroed();
            params.parm.capture.capability = 0x1000;
            params.parm.capture.timeperframe = dev.interval;
            params.parm.capture.readbuffers = 0;
            Ok(())
        }
        vidioc::VIDIOC_G_CROP | vidioc::VIDIOC_S_CROP => {
            let crop = &mut *(argp as *mut v4l2_crop);
            if crop.type_ != 1 {
                return Err(libc::EINVAL);
            }
            if request == vidioc::VIDIOC_S_CROP {
                dev.crop = crop.c;
            } else {
                crop.c = dev.crop;
            }
            Ok(())
        }
        vidioc::VIDIOC_G_SELECTION | vidioc::VIDIOC_S_SELECTION => {
            let sel = &mut *(argp as *mut v4l2_selection);
            if sel.type_ != 1 {
                return Err(libc::EINVAL);
            }
            let multi = dev.config.multi_selection;
            if request == vidioc::VIDIOC_S_SELECTION {
                if multi && sel.rectangles > 0 && !sel.pr.is_null() {
                    let rects = slice::from_raw_parts(sel.pr, sel.rectangles as usize);
                    dev.selection = rects.iter().map(|ext| ext.r).collect();
                } else {
                    dev.selection = vec![sel.r];
                }
            }

            sel.r = dev.selection[0];
            if multi && dev.selection.len() > 1 && !sel.pr.is_null() {
                let n = dev.selection.len().min(sel.rectangles as usize);
                let out = slice::from_raw_parts_mut(sel.pr, n);
                for (dst, src) in out.iter_mut().zip(dev.selection.iter()) {
                    *dst = v4l2_ext_rect {
                        r: *src,
                        reserved: [0; 4],
                    };
                }
                sel.rectangles = n as u32;
            } else {
                sel.rectangles = 0;
                sel.pr = ptr::null_mut();
                sel.reserved.fill(0);
            }
            Ok(())
        }
        vidioc::VIDIOC_REQBUFS => {
            let req = &mut *(argp as *mut v4l2_requestbuffers);
            if req.type_ != 1 || req.memory != 1 {
                return Err(libc::EINVAL);
            }
            if dev.streaming {
                return Err(libc::EBUSY);
            }
            if dev.buffers.iter().any(|b| b.mapping.is_some()) {
                return Err(libc::EBUSY);
            }

            dev.buffers.clear();
            dev.incoming.clear();
            dev.done.clear();
            let count = req.count.min(dev.config.max_buffers);
            for _ in 0..count {
                dev.buffers.push(Buffer {
                    length: dev.config.buffer_len,
                    queued: false,
                    mapping: None,
                    bytesused: 0,
                    sequence: 0,
                });
            }
            req.count = count;
            Ok(())
        }
        vidioc::VIDIOC_QUERYBUF => {
            let buf = &mut *(argp as *mut v4l2_buffer);
            let state = dev.buffers.get(buf.index as usize).ok_or(libc::EINVAL)?;
            buf.length = state.length;
            buf.m.offset = buf.index * OFFSET_STRIDE;
            buf.flags = 0;
            if state.queued {
                buf.flags |= BUF_FLAG_QUEUED;
            }
            if state.mapping.is_some() {
                buf.flags |= BUF_FLAG_MAPPED;
            }
            Ok(())
        }
        vidioc::VIDIOC_QBUF => {
            let buf = &mut *(argp as *mut v4l2_buffer);
            let index = buf.index;
            let state = dev.buffers.get_mut(index as usize).ok_or(libc::EINVAL)?;
            if state.queued || buf.memory != 1 {
                return Err(libc::EINVAL);
            }
            state.queued = true;
            buf.flags = BUF_FLAG_QUEUED;
            if dev.streaming {
                complete(dev, fd, index);
            } else {
                dev.incoming.push_back(index);
            }
            Ok(())
        }
        vidioc::VIDIOC_DQBUF => {
            let buf = &mut *(argp as *mut v4l2_buffer);
            if !dev.streaming {
                return Err(libc::EINVAL);
            }
            let index = dev.done.pop_front().ok_or(libc::EAGAIN)?;
            let mut value: u64 = 0;
            libc::read(fd, &mut value as *mut u64 as *mut c_void, 8);

            let state = &mut dev.buffers[index as usize];
            state.queued = false;
            buf.index = index;
            buf.bytesused = state.bytesused;
            buf.length = state.length;
            buf.sequence = state.sequence;
            buf.field = 1;
            buf.flags = BUF_FLAG_DONE | BUF_FLAG_TIMESTAMP_MONOTONIC | BUF_FLAG_MAPPED;
            buf.timestamp.tv_sec = state.sequence as _;
            buf.timestamp.tv_usec = 500 as _;
            buf.m.offset = index * OFFSET_STRIDE;
            Ok(())
        }
        vidioc::VIDIOC_STREAMON => {
            let typ = *(argp as *const u32);
            if typ != 1 {
                return Err(libc::EINVAL);
            }
            if dev.streaming {
                return Ok(());
            }
            if dev.incoming.is_empty() {
                return Err(libc::EINVAL);
            }
            dev.streaming = true;
            while let Some(index) = dev.incoming.pop_front() {
                complete(dev, fd, index);
            }
            Ok(())
        }
        vidioc::VIDIOC_STREAMOFF => {
            let typ = *(argp as *const u32);
            if typ != 1 {
                return Err(libc::EINVAL);
            }
            dev.streaming = false;
            dev.incoming.clear();
            dev.done.clear();
            for buf in dev.buffers.iter_mut() {
                buf.queued = false;
            }
            drain(fd);
            Ok(())
        }
        _ => Err(libc::ENOTTY),
    }
}
