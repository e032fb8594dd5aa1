use std::{fmt, io, path::PathBuf};

use thiserror::Error;

/// Reason a device node could not be opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenErrorKind {
    /// Nothing exists at the path
    NotFound,
    /// The caller lacks read/write access to the node
    PermissionDenied,
    /// The path exists but is not a character device
    NotCharDevice,
    /// The node is a character device, but does not speak the V4L2 protocol
    NotVideoDevice,
    /// Any other errno reported by open(2)
    Other(i32),
}

impl fmt::Display for OpenErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "no such device node"),
            Self::PermissionDenied => write!(f, "permission denied"),
            Self::NotCharDevice => write!(f, "not a character device"),
            Self::NotVideoDevice => write!(f, "not a video4linux device"),
            Self::Other(errno) => write!(f, "{}", io::Error::from_raw_os_error(*errno)),
        }
    }
}

/// Which side of the kernel hand-off currently owns a buffer slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    /// Queued on the driver, the driver may write into it at any time
    Kernel,
    /// Dequeued (or never queued), the application may read it
    User,
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kernel => write!(f, "kernel"),
            Self::User => write!(f, "user"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to open {}: {kind}", path.display())]
    Open { path: PathBuf, kind: OpenErrorKind },

    #[error("device error: {}", io::Error::from_raw_os_error(*errno))]
    Device { errno: i32 },

    #[error("allocation failed: {0}")]
    Allocation(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("invalid argument: {0}")]
    Validation(String),

    #[error("device or buffer pool is closed")]
    Closed,

    #[error("buffer {index} is owned by the {actual}, expected the {expected}")]
    Ownership {
        index: usize,
        expected: Owner,
        actual: Owner,
    },

    #[error("invalid stream state: {0}")]
    State(String),

    #[error(transparent)]
    Io(io::Error),
}

impl Error {
    /// Returns the kernel errno, if this error was reported by an ioctl
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Device { errno } => Some(*errno),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        match e.raw_os_error() {
            Some(errno) => Error::Device { errno },
            None => Error::Io(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_becomes_device_error() {
        let err = Error::from(io::Error::from_raw_os_error(libc::EBUSY));
        assert!(matches!(err, Error::Device { errno } if errno == libc::EBUSY));
        assert_eq!(err.errno(), Some(libc::EBUSY));
    }

    #[test]
    fn plain_io_error_is_kept() {
        let err = Error::from(io::Error::new(io::ErrorKind::Other, "reactor gone"));
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.errno(), None);
    }

    #[test]
    fn ownership_message_names_both_sides() {
        let err = Error::Ownership {
            index: 2,
            expected: Owner::User,
            actual: Owner::Kernel,
        };
        assert_eq!(
            err.to_string(),
            "buffer 2 is owned by the kernel, expected the user"
        );
    }
}
