use std::convert::TryFrom;
use std::sync::Arc;
use std::{fmt, mem};

use crate::buffer::{self, Metadata};
use crate::device::Handle;
use crate::error::{Error, Owner, Result};
use crate::format::FieldOrder;
use crate::memory::{Mapping, Memory};
use crate::v4l2;
use crate::v4l_sys::*;

/// One driver buffer, mapped into the process
///
/// A slot is owned either by the driver (queued) or by the application (dequeued or never
/// queued). Every queue and dequeue checks that tag, so a slot can never be handed to the driver
/// twice or read while the driver may write into it.
pub struct Slot {
    index: usize,
    typ: buffer::Type,
    handle: Arc<Handle>,
    mapping: Mapping,
    owner: Owner,
    meta: Metadata,
}

impl Slot {
    /// Looks up buffer `index` and maps it
    pub(crate) fn map(handle: Arc<Handle>, typ: buffer::Type, index: u32) -> Result<Self> {
        let mut v4l2_buf = raw_buffer(typ);
        v4l2_buf.index = index;
        unsafe {
            handle.ioctl(v4l2::vidioc::VIDIOC_QUERYBUF, &mut v4l2_buf)?;
        }

        let offset = unsafe { v4l2_buf.m.offset };
        let mapping = unsafe { Mapping::new(handle.fd(), v4l2_buf.length as usize, offset)? };
        log::trace!(
            "mapped buffer {} ({} bytes at offset {:#x})",
            index,
            mapping.len(),
            offset
        );

        Ok(Slot {
            index: index as usize,
            typ,
            handle,
            mapping,
            owner: Owner::User,
            meta: Metadata::default(),
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Length of the mapping as reported by the driver
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    /// Metadata of the last frame captured into this slot
    pub fn meta(&self) -> &Metadata {
        &self.meta
    }

    /// Valid bytes of the last frame captured into this slot
    ///
    /// Empty while the driver owns the slot.
    pub fn data(&self) -> &[u8] {
        if self.owner == Owner::Kernel {
            return &[];
        }

        let used = (self.meta.bytesused as usize).min(self.mapping.len());
        &self.mapping[..used]
    }

    /// Hands the slot to the driver
    pub(crate) fn queue(&mut self) -> Result<()> {
        self.check_owner(Owner::User)?;

        let mut v4l2_buf = raw_buffer(self.typ);
        v4l2_buf.index = self.index as u32;
        unsafe {
            self.handle.ioctl(v4l2::vidioc::VIDIOC_QBUF, &mut v4l2_buf)?;
        }

        self.owner = Owner::Kernel;
        Ok(())
    }

    /// Takes the slot back after the driver returned it through `VIDIOC_DQBUF`
    pub(crate) fn complete(&mut self, v4l2_buf: &v4l2_buffer) -> Result<()> {
        self.check_owner(Owner::Kernel)?;

        self.owner = Owner::User;
        self.meta = Metadata {
            bytesused: v4l2_buf.bytesused,
            flags: v4l2_buf.flags.into(),
            field: FieldOrder::try_from(v4l2_buf.field).ok(),
            timestamp: v4l2_buf.timestamp.into(),
            sequence: v4l2_buf.sequence,
        };
        Ok(())
    }

    /// Records that the driver dropped the slot, as it does for all slots on stream off
    pub(crate) fn reclaim(&mut self) {
        self.owner = Owner::User;
    }

    fn check_owner(&self, expected: Owner) -> Result<()> {
        if self.owner != expected {
            return Err(Error::Ownership {
                index: self.index,
                expected,
                actual: self.owner,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("index", &self.index)
            .field("owner", &self.owner)
            .field("mapping", &self.mapping)
            .finish()
    }
}

/// Zeroed `v4l2_buffer` for memory-mapped buffers of type `typ`
pub(crate) fn raw_buffer(typ: buffer::Type) -> v4l2_buffer {
    v4l2_buffer {
        type_: typ as u32,
        memory: Memory::Mmap as u32,
        ..unsafe { mem::zeroed() }
    }
}
