//! Publish error types

/// Error type for publish operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// Frame does not fit into a slot
    FrameTooLarge {
        /// Size of the rejected frame
        size: usize,
        /// Slot capacity
        capacity: usize,
    },
}

impl std::fmt::Display for PublishError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishError::FrameTooLarge { size, capacity } => write!(
                f,
                "Frame of {} bytes exceeds slot capacity of {} bytes",
                size, capacity
            ),
        }
    }
}

impl std::error::Error for PublishError {}
