use std::mem;
use std::os::raw::c_void;

use crate::v4l_sys::v4l2_rect;

// We need to carry our own copy of this struct, because the `which` field used to be called
// `ctrl_class` and Linux now has both fields in a union. While the change is transparent as far as
// C (and thus Linux) is concerned, it causes us trouble with bindgen since we cannot directly
// access union members.
//
// See https://github.com/raymanfx/libv4l-rs/pull/40#issuecomment-885169894 for additional details.
#[repr(C)]
pub(crate) struct v4l2_ext_controls {
    pub which: u32,
    pub count: u32,
    pub error_idx: u32,
    pub request_fd: i32,
    pub reserved: u32,
    pub controls: *mut v4l2_ext_control,
}

/// Value part of [`v4l2_ext_control`].
///
/// The kernel header declares one pointer member per compound element type. They all alias the
/// same address, so a single untyped pointer covers them.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub(crate) union v4l2_ext_control_value {
    pub value: i32,
    pub value64: i64,
    pub ptr: *mut c_void,
}

#[repr(C, packed)]
pub(crate) struct v4l2_ext_control {
    pub id: u32,
    pub size: u32,
    pub reserved2: [u32; 1],
    pub value: v4l2_ext_control_value,
}

/// One entry of a multi-rectangle selection.
#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct v4l2_ext_rect {
    pub r: v4l2_rect,
    pub reserved: [u32; 4],
}

/// Selection argument with the multi-rectangle extension.
///
/// Mainline kernels only know about `type_`, `target`, `flags` and `r` and zero the remaining
/// bytes on return, which reads back as a selection without extra rectangles.
#[repr(C)]
pub(crate) struct v4l2_selection {
    pub type_: u32,
    pub target: u32,
    pub flags: u32,
    pub r: v4l2_rect,
    pub rectangles: u32,
    pub pr: *mut v4l2_ext_rect,
    pub reserved: [u32; (64 - 32 - mem::size_of::<usize>()) / 4],
}

const _: () = assert!(mem::size_of::<v4l2_ext_control>() == 12 + mem::size_of::<i64>());
const _: () = assert!(mem::size_of::<v4l2_ext_rect>() == 32);
const _: () = assert!(mem::size_of::<v4l2_selection>() == 64);
