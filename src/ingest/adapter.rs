//! Pipeline-to-broadcaster adapter
//!
//! Owns the "is this a new frame" decision. Pipelines may hand the same
//! buffer over more than once; a repeated timestamp marks such a delivery.

use std::sync::Arc;

use crate::broadcast::{FrameBroadcaster, FrameToken, PublishError};

use super::frame::PipelineFrame;

/// Result of handing a frame to the adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Frame is now the active frame
    Published(FrameToken),
    /// Same timestamp as the last published frame, not published
    Duplicate,
    /// Broadcaster refused the frame
    Rejected(PublishError),
}

impl IngestOutcome {
    /// Whether the frame reached the broadcaster's ring
    pub fn is_published(&self) -> bool {
        matches!(self, IngestOutcome::Published(_))
    }
}

/// Deduplicating front end of the broadcaster
#[derive(Debug)]
pub struct IngestAdapter {
    broadcaster: Arc<FrameBroadcaster>,
    last_timestamp: Option<u64>,
}

impl IngestAdapter {
    /// Create an adapter feeding `broadcaster`
    pub fn new(broadcaster: Arc<FrameBroadcaster>) -> Self {
        Self {
            broadcaster,
            last_timestamp: None,
        }
    }

    /// Handle one frame from the pipeline
    ///
    /// A frame whose timestamp equals that of the last published frame is
    /// dropped. Everything else is forwarded to `publish`; an oversized frame
    /// is rejected there and leaves the dedupe state untouched.
    pub fn on_frame(&mut self, data: &[u8], timestamp: u64) -> IngestOutcome {
        if self.last_timestamp == Some(timestamp) {
            self.broadcaster.metrics().record_duplicate();
            tracing::trace!(timestamp = timestamp, "Duplicate frame dropped");
            return IngestOutcome::Duplicate;
        }
        match self.broadcaster.publish(data, timestamp) {
            Ok(token) => {
                self.last_timestamp = Some(timestamp);
                IngestOutcome::Published(token)
            }
            Err(e) => IngestOutcome::Rejected(e),
        }
    }

    /// Handle a frame in its owned form
    pub fn ingest(&mut self, frame: &PipelineFrame) -> IngestOutcome {
        self.on_frame(&frame.data, frame.timestamp)
    }

    /// Timestamp of the last frame the broadcaster accepted
    pub fn last_timestamp(&self) -> Option<u64> {
        self.last_timestamp
    }

    /// The broadcaster this adapter feeds
    pub fn broadcaster(&self) -> &Arc<FrameBroadcaster> {
        &self.broadcaster
    }
}
