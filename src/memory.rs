use std::{convert::TryFrom, fmt, io, ops::Deref, os::unix::io::RawFd, ptr, slice};

use crate::v4l2;

/// Memory used for buffer exchange
#[allow(clippy::unreadable_literal)]
#[rustfmt::skip]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Memory {
    #[default]
    Mmap        = 1,
    UserPtr     = 2,
    Overlay     = 3,
    DmaBuf      = 4,
}

impl TryFrom<u32> for Memory {
    type Error = ();

    fn try_from(repr: u32) -> Result<Self, Self::Error> {
        match repr {
            1 => Ok(Memory::Mmap),
            2 => Ok(Memory::UserPtr),
            3 => Ok(Memory::Overlay),
            4 => Ok(Memory::DmaBuf),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Memory::Mmap => write!(f, "memory-mapped"),
            Memory::UserPtr => write!(f, "user pointer"),
            Memory::Overlay => write!(f, "overlay"),
            Memory::DmaBuf => write!(f, "DMA buffered"),
        }
    }
}

/// Memory-mapped region
///
/// The backing memory is usually located somewhere on the camera hardware itself. It is mapped
/// into RAM so data can be copied. In case of capture devices, the (virtual) memory can be read.
///
/// The destructor automatically unmaps the memory.
pub struct Mapping {
    ptr: *mut u8,
    len: usize,
}

// The region is plain memory; access is serialized through the owning slot.
unsafe impl Send for Mapping {}

impl Mapping {
    /// Maps `len` bytes of device memory at `offset`, as reported by `VIDIOC_QUERYBUF`.
    ///
    /// # Safety
    ///
    /// `fd` must be an open device node and `offset`/`len` must describe one of its buffers.
    pub(crate) unsafe fn new(fd: RawFd, len: usize, offset: u32) -> io::Result<Self> {
        let ptr = v4l2::mmap(
            ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            fd,
            offset as libc::off_t,
        )?;

        Ok(Mapping {
            ptr: ptr as *mut u8,
            len,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Deref for Mapping {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        unsafe { slice::from_raw_parts(self.ptr, self.len) }
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        let res = unsafe { v4l2::munmap(self.ptr as *mut std::os::raw::c_void, self.len) };
        match res {
            Ok(()) => log::trace!("unmapped {} bytes at {:p}", self.len, self.ptr),
            Err(e) => log::warn!("failed to unmap {} bytes at {:p}: {}", self.len, self.ptr, e),
        }
    }
}

impl fmt::Debug for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapping")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_mmap() {
        assert_eq!(Memory::default(), Memory::Mmap);
        assert_eq!(Memory::try_from(4), Ok(Memory::DmaBuf));
        assert_eq!(Memory::try_from(0), Err(()));
        assert_eq!(Memory::UserPtr.to_string(), "user pointer");
    }
}
