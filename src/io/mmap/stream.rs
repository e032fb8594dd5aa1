use std::fmt;

use crate::buffer::Metadata;
use crate::error::{Error, Result};
use crate::io::mmap::{Config, Pool};
use crate::io::traits::{CaptureStream, Stream as StreamTrait};
use crate::io::Frame;
use crate::video::Capture;

/// Lifecycle of a [`Stream`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Buffers are allocated, the driver is not capturing
    Idle,
    /// Streaming is on
    Armed,
    /// Buffers are unmapped, the stream is unusable
    Closed,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Idle => write!(f, "idle"),
            State::Armed => write!(f, "armed"),
            State::Closed => write!(f, "closed"),
        }
    }
}

/// Stream of memory-mapped buffers
///
/// Wraps a [`Pool`] with the stream on / stream off bracket. Dropping an armed stream switches
/// streaming off.
///
/// # Example
///
/// ```
/// use v4l_capture::Device;
/// use v4l_capture::io::mmap::Stream;
///
/// if let Ok(dev) = Device::new(0) {
///     if let Some(session) = dev.capture() {
///         let mut stream = Stream::with_buffers(&session, 4).unwrap();
///         stream.start().unwrap();
///         let frame = stream.read().unwrap();
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Stream {
    session: Capture,
    pool: Pool,
    state: State,
    /// Slot lent out by the last zero-copy `next`
    lent: Option<usize>,
}

impl Stream {
    pub fn new(session: &Capture) -> Result<Self> {
        Self::with_config(session, Config::default())
    }

    pub fn with_buffers(session: &Capture, count: u32) -> Result<Self> {
        Self::with_config(session, Config::with_buffers(count))
    }

    pub fn with_config(session: &Capture, config: Config) -> Result<Self> {
        let pool = Pool::with_config(session, config)?;
        Ok(Self::from_pool(session.clone(), pool))
    }

    /// Wraps an existing pool, which must belong to `session`
    pub fn from_pool(session: Capture, pool: Pool) -> Self {
        let state = if pool.is_closed() {
            State::Closed
        } else {
            State::Idle
        };

        Stream {
            session,
            pool,
            state,
            lent: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn session(&self) -> &Capture {
        &self.session
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Switches streaming on, Idle to Armed
    ///
    /// In auto-queue mode every slot the application holds is queued first, so a stream that was
    /// stopped can simply be started again. Starting an armed stream does nothing.
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            State::Armed => return Ok(()),
            State::Closed => return Err(Error::Closed),
            State::Idle => {}
        }

        if self.pool.auto_queue() {
            self.pool.queue_all()?;
        }
        self.session.start()?;
        self.state = State::Armed;
        Ok(())
    }

    /// Switches streaming off, Armed to Idle
    ///
    /// Does nothing unless the stream is armed. A device that has already been closed is not an
    /// error.
    pub fn stop(&mut self) -> Result<()> {
        if self.state != State::Armed {
            return Ok(());
        }

        self.session.stop()?;
        self.pool.reclaim_all();
        self.lent = None;
        self.state = State::Idle;
        Ok(())
    }

    /// Unmaps all buffers, Idle to Closed
    ///
    /// An armed stream has to be stopped first.
    pub fn close(&mut self) -> Result<()> {
        match self.state {
            State::Armed => Err(Error::State(
                "cannot close an armed stream, stop it first".to_string(),
            )),
            State::Closed => Ok(()),
            State::Idle => {
                self.pool.close()?;
                self.state = State::Closed;
                Ok(())
            }
        }
    }

    fn ensure_armed(&self) -> Result<()> {
        match self.state {
            State::Armed => Ok(()),
            State::Closed => Err(Error::Closed),
            State::Idle => Err(Error::State("stream is not started".to_string())),
        }
    }

    /// Returns the slot lent out by `next` to the driver
    fn return_lent(&mut self) -> Result<()> {
        if let Some(index) = self.lent.take() {
            if self.pool.auto_queue() {
                self.pool.queue(index)?;
            }
        }
        Ok(())
    }

    /// Waits for the next frame and returns a copy of it
    pub fn read(&mut self) -> Result<Frame> {
        self.ensure_armed()?;
        self.return_lent()?;
        self.pool.read()
    }

    /// Returns a copy of the next frame if one is ready, without waiting
    pub fn try_read(&mut self) -> Result<Option<Frame>> {
        self.ensure_armed()?;
        self.return_lent()?;
        self.pool.try_read()
    }

    /// Starts streaming and returns an iterator over copied frames
    ///
    /// Streaming stops when the iterator is dropped. The iterator ends after the first error.
    pub fn frames(&mut self) -> Result<Frames<'_>> {
        self.start()?;
        Ok(Frames {
            stream: self,
            done: false,
        })
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("failed to stop stream: {}", e);
        }
    }
}

impl StreamTrait for Stream {
    fn start(&mut self) -> Result<()> {
        Stream::start(self)
    }

    fn stop(&mut self) -> Result<()> {
        Stream::stop(self)
    }
}

impl<'a> CaptureStream<'a> for Stream {
    fn queue(&mut self, index: usize) -> Result<()> {
        if self.lent == Some(index) {
            self.lent = None;
        }
        self.pool.queue(index)
    }

    fn dequeue(&mut self) -> Result<usize> {
        self.ensure_armed()?;
        self.pool.dequeue()
    }

    fn get(&self, index: usize) -> Option<&[u8]> {
        self.pool.slot(index).map(|slot| slot.data())
    }

    fn get_meta(&self, index: usize) -> Option<&Metadata> {
        self.pool.slot(index).map(|slot| slot.meta())
    }

    fn next(&'a mut self) -> Result<(&'a [u8], &'a Metadata)> {
        if self.state == State::Idle {
            Stream::start(self)?;
        }
        self.ensure_armed()?;
        self.return_lent()?;

        let index = self.pool.dequeue()?;
        self.lent = Some(index);

        let slot = self
            .pool
            .slot(index)
            .ok_or_else(|| Error::State(format!("buffer {} vanished", index)))?;
        Ok((slot.data(), slot.meta()))
    }
}

/// Iterator over the frames of a [`Stream`], see [`Stream::frames`]
pub struct Frames<'a> {
    stream: &'a mut Stream,
    done: bool,
}

impl Iterator for Frames<'_> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.stream.read() {
            Ok(frame) => Some(Ok(frame)),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl Drop for Frames<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.stream.stop() {
            log::warn!("failed to stop stream: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{Format, FourCC};
    use crate::v4l2::{fake, vidioc};
    use crate::Device;

    fn open() -> (Device, Capture) {
        let dev = Device::with_path("/dev/null").unwrap();
        let session = dev.capture().unwrap();
        (dev, session)
    }

    #[test]
    fn end_to_end() {
        let _ = env_logger::builder().is_test(true).try_init();

        let dev = Device::with_path("/dev/null").unwrap();
        assert!(dev.can_capture());
        let session = dev.capture().unwrap();
        let fmt = session
            .set_format(&Format::new(640, 480, FourCC::new(b"MJPG")))
            .unwrap();
        assert_eq!(fmt.fourcc, FourCC::new(b"MJPG"));

        let mut stream = Stream::with_buffers(&session, 4).unwrap();
        stream.start().unwrap();
        for seq in 1..=10 {
            let frame = stream.read().unwrap();
            let mapped = stream.pool().slot(frame.index).unwrap().len();
            assert!(!frame.is_empty());
            assert!(frame.len() <= mapped);
            assert_eq!(frame.meta.sequence, seq);
        }
        stream.stop().unwrap();
        stream.close().unwrap();
        dev.close().unwrap();

        assert_eq!(fake::live_mappings(), 0);
    }

    #[test]
    fn slots_are_used_round_robin() {
        let (_dev, session) = open();

        let mut stream = Stream::with_buffers(&session, 4).unwrap();
        stream.start().unwrap();
        let indices: Vec<usize> = (0..12).map(|_| stream.read().unwrap().index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 0, 1, 2, 3, 0, 1, 2, 3]);
    }

    #[test]
    fn format_survives_restart() {
        let (dev, session) = open();
        let fd = dev.handle().fd();

        let fmt = session
            .set_format(&Format::new(1280, 720, FourCC::new(b"MJPG")))
            .unwrap();
        let mut stream = Stream::new(&session).unwrap();

        stream.start().unwrap();
        stream.read().unwrap();
        stream.stop().unwrap();
        assert_eq!(stream.state(), State::Idle);
        assert!(!fake::is_streaming(fd));
        assert_eq!(fake::queued(fd), 0);

        stream.start().unwrap();
        let frame = stream.read().unwrap();
        assert_eq!(frame.index, 0);
        assert_eq!(session.format().unwrap(), fmt);
    }

    #[test]
    fn state_transitions() {
        let (_dev, session) = open();

        let mut stream = Stream::new(&session).unwrap();
        assert_eq!(stream.state(), State::Idle);
        assert!(matches!(stream.read(), Err(Error::State(_))));

        stream.start().unwrap();
        stream.start().unwrap();
        assert_eq!(stream.state(), State::Armed);
        assert!(matches!(stream.close(), Err(Error::State(_))));

        stream.stop().unwrap();
        stream.stop().unwrap();
        stream.close().unwrap();
        stream.close().unwrap();
        assert_eq!(stream.state(), State::Closed);
        assert!(matches!(stream.read(), Err(Error::Closed)));
        assert!(matches!(stream.start(), Err(Error::Closed)));
    }

    #[test]
    fn stop_after_device_close() {
        let (dev, session) = open();

        let mut stream = Stream::new(&session).unwrap();
        stream.start().unwrap();
        dev.close().unwrap();

        stream.stop().unwrap();
        assert_eq!(stream.state(), State::Idle);
        stream.close().unwrap();
    }

    #[test]
    fn drop_stops_streaming() {
        let (dev, session) = open();
        let fd = dev.handle().fd();

        {
            let mut stream = Stream::new(&session).unwrap();
            stream.start().unwrap();
            assert!(fake::is_streaming(fd));
        }
        assert!(!fake::is_streaming(fd));
        assert_eq!(fake::live_mappings(), 0);
    }

    #[test]
    fn frames_iterator_is_scoped() {
        let (dev, session) = open();
        let fd = dev.handle().fd();

        let mut stream = Stream::new(&session).unwrap();
        let sequences: Vec<u32> = stream
            .frames()
            .unwrap()
            .take(5)
            .map(|frame| frame.unwrap().meta.sequence)
            .collect();
        assert_eq!(sequences, vec![1, 2, 3, 4, 5]);
        assert!(!fake::is_streaming(fd));
        assert_eq!(stream.state(), State::Idle);
    }

    #[test]
    fn zero_copy_next_defers_requeue() {
        let (dev, session) = open();
        let fd = dev.handle().fd();

        let mut stream = Stream::with_buffers(&session, 2).unwrap();
        let (data, meta) = CaptureStream::next(&mut stream).unwrap();
        assert_eq!(meta.sequence, 1);
        assert_eq!(data.len(), 4096);
        assert!(data.iter().all(|&b| b == 1));

        // the lent slot stays with the application until the next call
        assert_eq!(fake::queued(fd), 1);
        fake::clear_calls(fd);

        let (_, meta) = CaptureStream::next(&mut stream).unwrap();
        assert_eq!(meta.sequence, 2);
        assert_eq!(
            fake::calls(fd),
            vec![vidioc::VIDIOC_QBUF, vidioc::VIDIOC_DQBUF]
        );
        assert_eq!(stream.get(1).map(|data| data.len()), Some(4096));
        assert_eq!(stream.get_meta(1).map(|meta| meta.sequence), Some(2));
    }

    #[test]
    fn manual_requeue() {
        let (dev, session) = open();
        let fd = dev.handle().fd();

        let config = Config {
            auto_queue: false,
            ..Config::default()
        };
        let mut stream = Stream::with_config(&session, config).unwrap();
        CaptureStream::queue(&mut stream, 0).unwrap();
        CaptureStream::queue(&mut stream, 1).unwrap();
        stream.start().unwrap();

        assert_eq!(stream.read().unwrap().index, 0);
        assert_eq!(fake::queued(fd), 1);
        CaptureStream::queue(&mut stream, 0).unwrap();
        assert_eq!(stream.read().unwrap().index, 1);
        assert_eq!(stream.read().unwrap().index, 0);
        assert!(matches!(stream.read(), Err(Error::State(_))));
    }

    #[test]
    fn frames_end_after_first_error() {
        let (dev, session) = open();
        let fd = dev.handle().fd();

        let config = Config {
            auto_queue: false,
            ..Config::default()
        };
        let mut stream = Stream::with_config(&session, config).unwrap();
        CaptureStream::queue(&mut stream, 0).unwrap();

        let mut frames = stream.frames().unwrap();
        assert_eq!(frames.next().unwrap().unwrap().index, 0);
        // nothing is queued any more
        assert!(matches!(frames.next(), Some(Err(Error::State(_)))));
        assert!(frames.next().is_none());
        assert!(frames.next().is_none());
        drop(frames);

        assert!(!fake::is_streaming(fd));
    }
}
