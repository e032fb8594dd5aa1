use crate::buffer::Metadata;
use crate::error::Result;

/// Streaming I/O
pub trait Stream {
    /// Start streaming, takes exclusive ownership of a device
    fn start(&mut self) -> Result<()>;

    /// Stop streaming, all buffers return to the application
    fn stop(&mut self) -> Result<()>;
}

pub trait CaptureStream<'a>: Stream {
    /// Insert a buffer into the drivers' incoming queue
    fn queue(&mut self, index: usize) -> Result<()>;

    /// Remove a buffer from the drivers' outgoing queue, waiting until one is ready
    fn dequeue(&mut self) -> Result<usize>;

    /// Get the valid bytes of the buffer at the specified index
    fn get(&self, index: usize) -> Option<&[u8]>;

    /// Get the metadata at the specified index
    fn get_meta(&self, index: usize) -> Option<&Metadata>;

    /// Fetch a new frame without copying it.
    ///
    /// The buffer handed out by the previous call goes back to the driver first.
    /// First time initialization is performed if necessary.
    fn next(&'a mut self) -> Result<(&'a [u8], &'a Metadata)>;
}
