use std::time::Duration;

use v4l_capture::io::mmap::AsyncStream;
use v4l_capture::{Device, Error};

#[tokio::main]
async fn main() -> v4l_capture::Result<()> {
    env_logger::init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/video0".to_string());
    let dev = Device::with_path(&path)?;
    let session = dev
        .capture()
        .ok_or_else(|| Error::Unsupported(format!("{} cannot capture video", path)))?;

    let mut stream = AsyncStream::new(&session)?;
    let deadline = tokio::time::sleep(Duration::from_secs(3));
    tokio::pin!(deadline);

    let mut frames = 0;
    loop {
        tokio::select! {
            frame = stream.next() => {
                let frame = frame?;
                frames += 1;
                println!("{}", frame);
            }
            _ = &mut deadline => {
                println!("Captured {} frames in 3 seconds", frames);
                break;
            }
        }
    }

    // dropping the stream switches streaming off
    drop(stream);
    Ok(())
}
