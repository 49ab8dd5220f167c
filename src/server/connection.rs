//! Per-client streaming connection
//!
//! Writes the response head once, then one multipart part for every frame
//! published after the client's cursor. While caught up the connection waits
//! for the next publish, the poll interval, or bytes from the client; EOF
//! from the client ends the connection.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::broadcast::{FrameBroadcaster, FrameToken};
use crate::protocol::multipart::{part_header, RESPONSE_PREAMBLE};
use crate::server::config::ServerConfig;
use crate::session::{CloseReason, SessionContext, SessionState};
use crate::stats::ConnectionStats;

/// One streaming client
pub struct Connection<S> {
    state: SessionState,
    stream: S,
    config: ServerConfig,
    broadcaster: Arc<FrameBroadcaster>,
    stats: ConnectionStats,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a connection in the greeting phase
    pub fn new(
        session_id: u64,
        stream: S,
        peer_addr: SocketAddr,
        config: ServerConfig,
        broadcaster: Arc<FrameBroadcaster>,
    ) -> Self {
        Self {
            state: SessionState::new(session_id, peer_addr),
            stream,
            config,
            broadcaster,
            stats: ConnectionStats::new(),
        }
    }

    /// Stream until the client goes away or a write fails
    ///
    /// Never returns an error: every failure is a reason to close this
    /// connection and nothing else.
    pub async fn run(&mut self) -> CloseReason {
        let reason = self.serve().await;

        self.state.close(reason);
        self.stats.duration = self.state.duration();

        tracing::debug!(
            session = %SessionContext::from(&self.state),
            reason = %reason,
            frames = self.stats.frames_sent,
            bytes = self.stats.bytes_sent,
            overtaken = self.stats.overtaken_reads,
            "Connection finished"
        );

        reason
    }

    async fn serve(&mut self) -> CloseReason {
        if let Err(e) = self.send(Bytes::from_static(RESPONSE_PREAMBLE), None).await {
            return self.write_failure(e, CloseReason::GreetingFailed);
        }
        self.state.start_streaming();

        let broadcaster = Arc::clone(&self.broadcaster);
        let mut read_buf = vec![0u8; self.config.read_buffer_size.max(1)];

        loop {
            // Register for the next publish before looking at the ring so a
            // publish landing in between still wakes us.
            let notified = broadcaster.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(token) = self.state.cursor.pending(broadcaster.latest()) {
                match broadcaster.read(token) {
                    Some(frame) => {
                        if let Err(e) = self.send_frame(token, frame).await {
                            return self.write_failure(e, CloseReason::SendFailed);
                        }
                    }
                    None => {
                        // Overwritten while copying; retry against the new latest
                        self.stats.overtaken_reads += 1;
                        tracing::trace!(
                            session_id = self.state.id,
                            token = %token,
                            "Frame overtaken during read"
                        );
                    }
                }
                continue;
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                result = self.stream.read(&mut read_buf) => match result {
                    Ok(0) => return CloseReason::PeerClosed,
                    Ok(n) => {
                        // Request bytes are not interpreted
                        tracing::trace!(
                            session_id = self.state.id,
                            bytes = n,
                            "Discarded client bytes"
                        );
                    }
                    Err(e) => {
                        tracing::debug!(
                            session_id = self.state.id,
                            error = %e,
                            "Read from client failed"
                        );
                        return CloseReason::ReadFailed;
                    }
                },
            }
        }
    }

    async fn send_frame(&mut self, token: FrameToken, frame: Bytes) -> io::Result<()> {
        let header = part_header(frame.len()).freeze();
        self.send(header, Some(frame)).await?;

        self.state.cursor.advance(token);
        self.stats.frames_sent += 1;

        tracing::trace!(
            session_id = self.state.id,
            token = %token,
            "Frame sent"
        );
        Ok(())
    }

    /// Write `head` and optional `body`, bounded by the send timeout
    async fn send(&mut self, head: Bytes, body: Option<Bytes>) -> io::Result<()> {
        let stream = &mut self.stream;
        let write = async {
            stream.write_all(&head).await?;
            if let Some(ref body) = body {
                stream.write_all(body).await?;
            }
            stream.flush().await
        };

        match tokio::time::timeout(self.config.send_timeout, write).await {
            Ok(result) => result?,
            Err(_) => return Err(io::Error::new(io::ErrorKind::TimedOut, "send timed out")),
        }

        self.stats.bytes_sent += (head.len() + body.map_or(0, |b| b.len())) as u64;
        Ok(())
    }

    fn write_failure(&self, e: io::Error, reason: CloseReason) -> CloseReason {
        let reason = if e.kind() == io::ErrorKind::TimedOut {
            CloseReason::SendTimeout
        } else {
            reason
        };
        tracing::debug!(
            session_id = self.state.id,
            reason = %reason,
            error = %e,
            "Write to client failed"
        );
        reason
    }

    /// Current session state
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Counters for this connection
    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }
}
