//! Frames as delivered by the pipeline

use bytes::Bytes;

/// One encoded frame handed over by the pipeline
///
/// Cheap to clone; the payload is reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineFrame {
    /// Encoded JPEG bytes, treated as an opaque blob
    pub data: Bytes,
    /// Pipeline timestamp (nanoseconds), non-decreasing
    pub timestamp: u64,
}

impl PipelineFrame {
    /// Create a new frame
    pub fn new(data: impl Into<Bytes>, timestamp: u64) -> Self {
        Self {
            data: data.into(),
            timestamp,
        }
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
