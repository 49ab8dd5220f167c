//! Running server handle
//!
//! Returned by [`MjpegServer::start`]. Feeds frames into the producer task
//! and stops the server.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::task::JoinHandle;

use crate::broadcast::FrameBroadcaster;
use crate::ingest::FrameSink;
use crate::server::listener::MjpegServer;
use crate::stats::ServerStats;

/// Handle to a started server
///
/// Dropping the handle stops the listener and producer tasks as well.
pub struct ServerHandle {
    local_addr: SocketAddr,
    frame_sink: FrameSink,
    server: Arc<MjpegServer>,
    listener_task: Option<JoinHandle<()>>,
    producer_task: Option<JoinHandle<()>>,
}

impl ServerHandle {
    pub(crate) fn new(
        local_addr: SocketAddr,
        frame_sink: FrameSink,
        server: Arc<MjpegServer>,
        listener_task: JoinHandle<()>,
        producer_task: JoinHandle<()>,
    ) -> Self {
        Self {
            local_addr,
            frame_sink,
            server,
            listener_task: Some(listener_task),
            producer_task: Some(producer_task),
        }
    }

    /// Address the listener is bound to
    ///
    /// Reports the actual port when the server was configured with port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Push handle for the pipeline
    pub fn frame_sink(&self) -> FrameSink {
        self.frame_sink.clone()
    }

    /// Hand one encoded frame to the producer task
    pub fn push_frame(&self, data: impl Into<Bytes>, timestamp: u64) {
        self.frame_sink.push(data, timestamp);
    }

    /// The server's frame broadcaster
    pub fn broadcaster(&self) -> &Arc<FrameBroadcaster> {
        self.server.broadcaster()
    }

    /// Connection counters
    pub fn stats(&self) -> ServerStats {
        self.server.stats()
    }

    /// Whether `stop` has not been called yet
    pub fn is_running(&self) -> bool {
        self.listener_task.is_some()
    }

    /// Stop accepting, stop the producer and drop all open connections
    ///
    /// Waits for both tasks to finish. Calling it again is a no-op.
    pub async fn stop(&mut self) {
        let tasks = [self.listener_task.take(), self.producer_task.take()];
        if tasks.iter().all(Option::is_none) {
            return;
        }

        for task in tasks.into_iter().flatten() {
            task.abort();
            if let Err(e) = task.await {
                if e.is_panic() {
                    tracing::error!(error = %e, "Server task panicked");
                }
            }
        }

        tracing::info!(addr = %self.local_addr, "MJPEG server stopped");
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        for task in [self.listener_task.take(), self.producer_task.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
    }
}
