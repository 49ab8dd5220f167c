//! MJPEG-over-HTTP broadcast server
//!
//! Fans a live sequence of JPEG frames out to any number of HTTP clients
//! using `multipart/x-mixed-replace`. Frames come from an external pipeline
//! one at a time; every client receives the newest frame it has not seen yet
//! and slow clients simply skip frames.
//!
//! # Architecture
//!
//! ```text
//!  pipeline ──► FrameSink ──► IngestAdapter ──► FrameBroadcaster ◄── Connection ──► client
//!                              (dedupe)          (slot ring)     ◄── Connection ──► client
//!                                                                ◄── Connection ──► client
//!                                                  MjpegServer accept loop ──┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use mjpeg_rs::{MjpegServer, ServerConfig};
//!
//! # async fn example() -> mjpeg_rs::Result<()> {
//! let server = MjpegServer::new(ServerConfig::default().port(8080))?;
//! let mut handle = server.start()?;
//!
//! // From the pipeline: one call per encoded frame
//! let jpeg: Vec<u8> = std::fs::read("frame.jpg")?;
//! handle.push_frame(jpeg, 0);
//!
//! handle.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod broadcast;
pub mod error;
pub mod ingest;
pub mod protocol;
pub mod server;
pub mod session;
pub mod stats;

pub use broadcast::{BroadcastConfig, FrameBroadcaster, FrameToken, PublishError};
pub use error::{Error, Result};
pub use ingest::{FrameSink, IngestAdapter, IngestOutcome, PipelineFrame};
pub use server::{MjpegServer, ServerConfig, ServerHandle};
