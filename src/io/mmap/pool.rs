use std::mem;
use std::sync::Arc;

use crate::buffer;
use crate::device::Handle;
use crate::error::{Error, Owner, Result};
use crate::io::mmap::slot::{raw_buffer, Slot};
use crate::io::mmap::Config;
use crate::io::Frame;
use crate::memory::Memory;
use crate::v4l2;
use crate::v4l_sys::*;
use crate::video::Capture;

/// Fixed set of memory-mapped driver buffers for one capture session
///
/// The slot count is decided by the driver at construction and never changes. Closing the pool
/// (or dropping it) unmaps every slot and releases the driver allocation.
///
/// A pool has a single consumer: dequeueing from two threads at once is not supported, which the
/// `&mut self` receivers enforce.
#[derive(Debug)]
pub struct Pool {
    handle: Arc<Handle>,
    typ: buffer::Type,
    slots: Vec<Slot>,
    requested: u32,
    auto_queue: bool,
    closed: bool,
}

impl Pool {
    /// Returns a pool with the default configuration (four buffers, auto-queue)
    ///
    /// # Example
    ///
    /// ```
    /// use v4l_capture::Device;
    /// use v4l_capture::io::mmap::Pool;
    ///
    /// if let Ok(dev) = Device::new(0) {
    ///     if let Some(session) = dev.capture() {
    ///         let pool = Pool::new(&session);
    ///     }
    /// }
    /// ```
    pub fn new(session: &Capture) -> Result<Self> {
        Self::with_config(session, Config::default())
    }

    pub fn with_buffers(session: &Capture, count: u32) -> Result<Self> {
        Self::with_config(session, Config::with_buffers(count))
    }

    /// Requests `config.count` buffers and maps all of them
    ///
    /// Either every granted buffer ends up mapped, or none is and the allocation is given back.
    pub fn with_config(session: &Capture, config: Config) -> Result<Self> {
        if config.memory != Memory::Mmap {
            return Err(Error::Unsupported(format!("{} buffers", config.memory)));
        }
        let typ = session.typ();
        if typ.is_multiplanar() {
            return Err(Error::Unsupported(format!("buffer pools for {}", typ)));
        }
        if config.count == 0 {
            return Err(Error::Validation("a pool needs at least one buffer".to_string()));
        }

        let handle = session.handle();
        let granted = request(&handle, typ, config.count)?;
        log::debug!(
            "requested {} buffers, driver granted {}",
            config.count,
            granted
        );
        if granted == 0 {
            return Err(Error::Allocation("not enough buffer memory".to_string()));
        }

        let mut slots = Vec::with_capacity(granted as usize);
        for index in 0..granted {
            match Slot::map(handle.clone(), typ, index) {
                Ok(slot) => slots.push(slot),
                Err(e) => {
                    log::error!("failed to map buffer {}: {}", index, e);
                    drop(slots);
                    if let Err(e) = request(&handle, typ, 0) {
                        log::warn!("failed to release buffers: {}", e);
                    }
                    return Err(e);
                }
            }
        }

        let mut pool = Pool {
            handle,
            typ,
            slots,
            requested: config.count,
            auto_queue: config.auto_queue,
            closed: false,
        };
        if pool.auto_queue {
            pool.queue_all()?;
        }

        Ok(pool)
    }

    pub fn typ(&self) -> buffer::Type {
        self.typ
    }

    /// Number of slots, as granted by the driver
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots that were asked for
    pub fn requested(&self) -> u32 {
        self.requested
    }

    pub fn auto_queue(&self) -> bool {
        self.auto_queue
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    /// Hands slot `index` back to the driver
    ///
    /// Fails with [`Error::Ownership`] if the driver already owns it.
    pub fn queue(&mut self, index: usize) -> Result<()> {
        self.ensure_open()?;

        let len = self.slots.len();
        let slot = self.slots.get_mut(index).ok_or_else(|| {
            Error::Validation(format!("buffer {} out of range (0..{})", index, len))
        })?;
        slot.queue()
    }

    /// Queues every slot the application owns
    pub(crate) fn queue_all(&mut self) -> Result<()> {
        self.ensure_open()?;

        for slot in self.slots.iter_mut().filter(|s| s.owner() == Owner::User) {
            slot.queue()?;
        }
        Ok(())
    }

    /// Number of slots currently owned by the driver
    pub fn queued(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.owner() == Owner::Kernel)
            .count()
    }

    /// Takes the oldest filled buffer from the driver, if there is one
    ///
    /// Returns the slot index. The slot belongs to the application afterwards.
    pub fn try_dequeue(&mut self) -> Result<Option<usize>> {
        self.ensure_open()?;

        let mut v4l2_buf = raw_buffer(self.typ);
        match unsafe { self.handle.ioctl(v4l2::vidioc::VIDIOC_DQBUF, &mut v4l2_buf) } {
            Ok(()) => {}
            Err(Error::Device { errno }) if errno == libc::EAGAIN => return Ok(None),
            Err(e) => return Err(e),
        }

        let index = v4l2_buf.index as usize;
        let slot = self.slots.get_mut(index).ok_or_else(|| {
            Error::State(format!("driver returned unknown buffer {}", index))
        })?;
        slot.complete(&v4l2_buf)?;
        log::trace!(
            "dequeued buffer {} (seq {}, {} bytes)",
            index,
            v4l2_buf.sequence,
            v4l2_buf.bytesused
        );

        Ok(Some(index))
    }

    /// Blocks until the driver returns a filled buffer, then takes it
    pub fn dequeue(&mut self) -> Result<usize> {
        loop {
            if let Some(index) = self.try_dequeue()? {
                return Ok(index);
            }
            if self.queued() == 0 {
                return Err(Error::State(
                    "no buffer is queued, waiting would never end".to_string(),
                ));
            }
            self.handle.wait_readable()?;
        }
    }

    /// Blocks until a frame is captured and returns a copy of it
    ///
    /// With auto-queue the slot goes straight back to the driver after the copy.
    pub fn read(&mut self) -> Result<Frame> {
        let index = self.dequeue()?;
        self.deliver(index)
    }

    /// Returns a copy of the next frame if one is ready, without waiting
    pub fn try_read(&mut self) -> Result<Option<Frame>> {
        match self.try_dequeue()? {
            Some(index) => self.deliver(index).map(Some),
            None => Ok(None),
        }
    }

    fn deliver(&mut self, index: usize) -> Result<Frame> {
        let auto_queue = self.auto_queue;
        let slot = &mut self.slots[index];
        let frame = Frame {
            index,
            data: slot.data().to_vec(),
            meta: *slot.meta(),
        };

        if auto_queue {
            slot.queue()?;
        }
        Ok(frame)
    }

    /// Records that stream off returned every slot to the application
    pub(crate) fn reclaim_all(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.reclaim();
        }
    }

    /// Unmaps every slot and releases the driver allocation
    ///
    /// Fails with [`Error::State`] while streaming is on for the pool's buffer type, without
    /// touching any mapping. If the driver refuses the release, the pool stays open and closing
    /// can be retried. Closing twice does nothing. When the device is already closed only the
    /// mappings are released.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if !self.handle.is_closed() && self.handle.is_streaming(self.typ) {
            return Err(Error::State(
                "cannot release buffers while streaming, stop first".to_string(),
            ));
        }

        if !self.slots.is_empty() {
            let count = self.slots.len();
            self.slots.clear();
            log::debug!("unmapped {} buffers", count);
        }

        if !self.handle.is_closed() {
            match request(&self.handle, self.typ, 0) {
                Ok(_) | Err(Error::Closed) => {}
                Err(e) => return Err(e),
            }
        }
        self.closed = true;
        Ok(())
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("failed to release buffer pool: {}", e);
        }
    }
}

/// `VIDIOC_REQBUFS`, returns the granted count
fn request(handle: &Handle, typ: buffer::Type, count: u32) -> Result<u32> {
    let mut v4l2_reqbufs = v4l2_requestbuffers {
        count,
        type_: typ as u32,
        memory: Memory::Mmap as u32,
        ..unsafe { mem::zeroed() }
    };
    unsafe {
        handle.ioctl(v4l2::vidioc::VIDIOC_REQBUFS, &mut v4l2_reqbufs)?;
    }

    Ok(v4l2_reqbufs.count)
}
