use std::time::Instant;

use v4l_capture::io::mmap::Stream;
use v4l_capture::io::traits::CaptureStream;
use v4l_capture::{Device, Error, Format, FourCC};

fn main() -> v4l_capture::Result<()> {
    env_logger::init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/video0".to_string());
    println!("Using device: {}\n", path);

    // Capture 10 frames into 4 buffers
    let count = 10;
    let buffer_count = 4;

    let dev = Device::with_path(&path)?;
    let session = dev
        .capture()
        .ok_or_else(|| Error::Unsupported(format!("{} cannot capture video", path)))?;

    let format = session.set_format(&Format::new(640, 480, FourCC::new(b"MJPG")))?;
    let fps = session.set_frame_rate(30.0)?;
    println!("Active format:\n{}", format);
    println!("Frame rate: {:.3}\n", fps);

    let mut stream = Stream::with_buffers(&session, buffer_count)?;
    println!("Got {} of {} buffers\n", stream.pool().len(), buffer_count);

    let start = Instant::now();
    for frame in stream.frames()?.take(count) {
        let frame = frame?;
        println!("Buffer {}", frame.index);
        println!("  sequence  : {}", frame.meta.sequence);
        println!("  timestamp : {}", frame.meta.timestamp);
        println!("  flags     : {}", frame.meta.flags);
        println!("  length    : {}", frame.len());
    }
    println!();
    println!("FPS: {}", count as f64 / start.elapsed().as_secs_f64());

    // zero-copy: the buffer goes back to the driver on the next call
    let (buf, meta) = CaptureStream::next(&mut stream)?;
    println!("Peeked at {} bytes of frame {}", buf.len(), meta.sequence);

    stream.stop()?;
    stream.close()?;
    Ok(())
}
