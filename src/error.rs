//! Error types
//!
//! Only allocation and start-up failures are meant to reach the caller of
//! the lifecycle API. Per-frame and per-connection failures are logged and
//! contained where they happen.

use std::fmt;
use std::io;

use crate::broadcast::PublishError;

/// Result type used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Socket bind/listen or other I/O failure
    Io(io::Error),
    /// The frame slot pool could not be reserved
    Allocation {
        /// Number of slots requested
        slots: usize,
        /// Capacity of each slot in bytes
        capacity: usize,
    },
    /// Configuration values out of range
    InvalidConfig(String),
    /// A frame could not be published
    Publish(PublishError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Allocation { slots, capacity } => write!(
                f,
                "Failed to allocate {} frame slots of {} bytes",
                slots, capacity
            ),
            Error::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::Publish(e) => write!(f, "Publish failed: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Publish(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<PublishError> for Error {
    fn from(e: PublishError) -> Self {
        Error::Publish(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_allocation() {
        let err = Error::Allocation {
            slots: 20,
            capacity: 4_096_000,
        };
        assert_eq!(
            err.to_string(),
            "Failed to allocate 20 frame slots of 4096000 bytes"
        );
    }

    #[test]
    fn test_from_io_error() {
        let err: Error = io::Error::new(io::ErrorKind::AddrInUse, "in use").into();
        assert!(matches!(err, Error::Io(_)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_from_publish_error() {
        let err: Error = PublishError::FrameTooLarge {
            size: 10,
            capacity: 5,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Publish failed: Frame of 10 bytes exceeds slot capacity of 5 bytes"
        );
    }
}
