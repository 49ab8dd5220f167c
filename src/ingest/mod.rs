//! Frame ingestion from the upstream pipeline
//!
//! The pipeline pushes encoded JPEG buffers with their timestamps through a
//! [`FrameSink`]. A producer task hands each new frame to the
//! [`IngestAdapter`], which drops repeated deliveries and publishes the rest
//! into the [`FrameBroadcaster`](crate::broadcast::FrameBroadcaster).
//!
//! ```text
//!  pipeline thread          producer task              broadcaster
//!  sink.push(buf, ts) ──► watch ──► adapter.on_frame() ──► publish()
//! ```

pub mod adapter;
pub mod frame;
pub mod sink;

pub use adapter::{IngestAdapter, IngestOutcome};
pub use frame::PipelineFrame;
pub use sink::FrameSink;
