use std::fs;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};

use crate::capability;
use crate::device::{query_caps, Handle};
use crate::v4l2;

/// Video device node found in a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    path: PathBuf,
}

impl Node {
    /// Returns a device node observer
    ///
    /// # Arguments
    ///
    /// * `path` - Path (e.g. "/dev/video0")
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Node {
            path: PathBuf::from(path.as_ref()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number in the node name, e.g. 2 for `/dev/video2`
    pub fn index(&self) -> Option<usize> {
        let name = self.path.file_name()?.to_str()?;
        name.strip_prefix("video")?.parse().ok()
    }

    /// Human readable name the driver registered, from sysfs
    pub fn name(&self) -> Option<String> {
        let file_name = self.path.file_name()?;
        let path = Path::new("/sys/class/video4linux")
            .join(file_name)
            .join("name");

        fs::read_to_string(path)
            .ok()
            .map(|name| name.trim().to_string())
    }

    /// Whether the node is a character device reporting single-planar video capture
    ///
    /// Opens the node briefly; any failure counts as "no".
    pub fn is_capture(&self) -> bool {
        match fs::metadata(&self.path) {
            Ok(meta) if meta.file_type().is_char_device() => {}
            _ => return false,
        }

        let fd = match v4l2::open(&self.path, libc::O_RDWR | libc::O_NONBLOCK) {
            Ok(fd) => fd,
            Err(e) => {
                log::debug!("skipping {}: {}", self.path.display(), e);
                return false;
            }
        };
        let handle = Handle::new(fd);

        match query_caps(&handle) {
            Ok(caps) => caps
                .device_caps
                .contains(capability::Flags::VIDEO_CAPTURE),
            Err(e) => {
                log::debug!("skipping {}: {}", self.path.display(), e);
                false
            }
        }
    }
}

/// Returns a list of devices currently known to the system, ordered by index
///
/// # Example
///
/// ```
/// use v4l_capture::context;
/// for dev in context::enum_devices() {
///     println!("{:?} {:?}", dev.index(), dev.name());
/// }
/// ```
pub fn enum_devices() -> Vec<Node> {
    enum_devices_in("/dev")
}

/// Returns all `video<N>` nodes in `dir`, ordered by index
pub fn enum_devices_in<P: AsRef<Path>>(dir: P) -> Vec<Node> {
    let entries = match fs::read_dir(dir.as_ref()) {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("cannot list {}: {}", dir.as_ref().display(), e);
            return Vec::new();
        }
    };

    let mut devices: Vec<Node> = entries
        .filter_map(|dentry| dentry.ok())
        .map(|dentry| Node::new(dentry.path()))
        .filter(|node| node.index().is_some())
        .collect();

    devices.sort_by_key(|node| node.index());
    devices
}

/// Returns the devices that can capture video, ordered by index
pub fn enum_capture_devices() -> Vec<Node> {
    enum_devices()
        .into_iter()
        .filter(|node| node.is_capture())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TempDir(PathBuf);

    impl TempDir {
        fn new(name: &str) -> Self {
            let path =
                std::env::temp_dir().join(format!("v4l-capture-{}-{}", name, std::process::id()));
            fs::create_dir_all(&path).unwrap();
            TempDir(path)
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    #[test]
    fn nodes_are_sorted_by_index() {
        let dir = TempDir::new("enum");
        for name in ["video10", "video2", "video0", "videoX", "media0", "video"] {
            fs::write(dir.0.join(name), b"").unwrap();
        }

        let nodes = enum_devices_in(&dir.0);
        let indices: Vec<Option<usize>> = nodes.iter().map(|node| node.index()).collect();
        assert_eq!(indices, vec![Some(0), Some(2), Some(10)]);
        assert_eq!(nodes[1].path(), dir.0.join("video2"));

        // regular files never qualify as capture devices
        assert!(nodes.iter().all(|node| !node.is_capture()));
    }

    #[test]
    fn missing_directory_is_empty() {
        assert!(enum_devices_in("/this/does/not/exist").is_empty());
    }

    #[test]
    fn node_index() {
        assert_eq!(Node::new("/dev/video3").index(), Some(3));
        assert_eq!(Node::new("/dev/vbi0").index(), None);
    }
}
