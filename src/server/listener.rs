//! MJPEG server listener
//!
//! Handles the TCP accept loop and spawns connection handlers.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::broadcast::{BroadcastConfig, FrameBroadcaster};
use crate::error::Result;
use crate::ingest::{sink, FrameSink, IngestAdapter};
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;
use crate::server::handle::ServerHandle;
use crate::session::SessionContext;
use crate::stats::{ServerMetrics, ServerStats};

/// Pause after a failed accept so a persistent error (e.g. out of file
/// descriptors) does not spin the loop
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// MJPEG-over-HTTP server
pub struct MjpegServer {
    config: ServerConfig,
    broadcaster: Arc<FrameBroadcaster>,
    metrics: Arc<ServerMetrics>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl MjpegServer {
    /// Create a server with the default frame ring
    ///
    /// Allocates the slot pool up front; fails if it cannot be reserved.
    pub fn new(config: ServerConfig) -> Result<Self> {
        Self::with_broadcast_config(config, BroadcastConfig::default())
    }

    /// Create a server with a custom frame ring
    pub fn with_broadcast_config(
        config: ServerConfig,
        broadcast_config: BroadcastConfig,
    ) -> Result<Self> {
        let broadcaster = FrameBroadcaster::with_config(&broadcast_config)?;
        Ok(Self::with_broadcaster(config, Arc::new(broadcaster)))
    }

    /// Create a server around an existing broadcaster
    pub fn with_broadcaster(config: ServerConfig, broadcaster: Arc<FrameBroadcaster>) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            broadcaster,
            metrics: Arc::new(ServerMetrics::default()),
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Get a reference to the frame broadcaster
    pub fn broadcaster(&self) -> &Arc<FrameBroadcaster> {
        &self.broadcaster
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Connection counters
    pub fn stats(&self) -> ServerStats {
        self.metrics.snapshot()
    }

    /// Bind and start serving in the background
    ///
    /// Spawns the listener and producer tasks and returns a handle that feeds
    /// frames and stops the server. Must be called from within a Tokio
    /// runtime. A bind failure is returned as an error and nothing is spawned.
    pub fn start(self) -> Result<ServerHandle> {
        let listener = self.bind()?;
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "MJPEG server listening");

        let (frame_sink, rx) = FrameSink::channel();
        let producer_task =
            sink::spawn_producer(rx, IngestAdapter::new(Arc::clone(&self.broadcaster)));

        let server = Arc::new(self);
        let listener_task = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.accept_loop(&listener).await })
        };

        Ok(ServerHandle::new(
            local_addr,
            frame_sink,
            server,
            listener_task,
            producer_task,
        ))
    }

    /// Run the server in the foreground until `shutdown` resolves
    ///
    /// Frames are fed by the caller, e.g. through an [`IngestAdapter`] built
    /// on [`broadcaster`](Self::broadcaster). Open connections are dropped
    /// on return.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = self.bind()?;
        tracing::info!(addr = %listener.local_addr()?, "MJPEG server listening");

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
            }
            _ = self.accept_loop(&listener) => {}
        }

        Ok(())
    }

    fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.bind_addr;
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };

        socket.set_reuseaddr(true)?;
        #[cfg(all(unix, not(target_os = "solaris"), not(target_os = "illumos")))]
        socket.set_reuseport(true)?;

        socket.bind(addr)?;
        Ok(socket.listen(self.config.backlog)?)
    }

    async fn accept_loop(&self, listener: &TcpListener) {
        // Dropping the set aborts every connection task
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                result = listener.accept() => match result {
                    Ok((socket, peer_addr)) => {
                        self.handle_connection(&mut connections, socket, peer_addr);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to accept connection");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },
                Some(result) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = result {
                        if e.is_panic() {
                            tracing::error!(error = %e, "Connection task panicked");
                        }
                    }
                }
            }
        }
    }

    fn handle_connection(
        &self,
        connections: &mut JoinSet<()>,
        socket: TcpStream,
        peer_addr: SocketAddr,
    ) {
        // Check connection limit; dropping the socket closes it
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match Arc::clone(sem).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    self.metrics.connection_rejected();
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let context = SessionContext::new(session_id, peer_addr);

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(session = %context, error = %e, "Failed to configure socket");
            return;
        }

        tracing::debug!(session = %context, "New connection");

        let config = self.config.clone();
        let broadcaster = Arc::clone(&self.broadcaster);
        let metrics = Arc::clone(&self.metrics);
        metrics.connection_opened();

        connections.spawn(async move {
            let _permit = permit;
            let mut connection = Connection::new(session_id, socket, peer_addr, config, broadcaster);

            connection.run().await;
            metrics.connection_closed(connection.stats());

            tracing::debug!(session = %context, "Connection closed");
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use crate::protocol::RESPONSE_PREAMBLE;

    use super::*;

    fn local_config() -> ServerConfig {
        ServerConfig::with_addr("127.0.0.1:0".parse().unwrap())
            .poll_interval(Duration::from_millis(5))
    }

    fn small_ring() -> BroadcastConfig {
        BroadcastConfig::default().slot_count(4).slot_capacity(1024)
    }

    async fn read_preamble(client: &mut TcpStream) {
        let mut buf = vec![0u8; RESPONSE_PREAMBLE.len()];
        tokio::time::timeout(Duration::from_secs(2), client.read_exact(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(buf, RESPONSE_PREAMBLE);
    }

    #[test]
    fn test_new_rejects_invalid_ring() {
        let result = MjpegServer::with_broadcast_config(
            ServerConfig::default(),
            BroadcastConfig::default().slot_count(0),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_start_fails_when_address_unusable() {
        // Binding a non-local address must fail at start, not later
        let config = ServerConfig::with_addr("203.0.113.1:0".parse().unwrap());
        let server = MjpegServer::with_broadcast_config(config, small_ring()).unwrap();

        assert!(server.start().is_err());
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let server =
            MjpegServer::with_broadcast_config(local_config().max_connections(1), small_ring())
                .unwrap();
        let mut handle = server.start().unwrap();

        let mut first = TcpStream::connect(handle.local_addr()).await.unwrap();
        read_preamble(&mut first).await;

        let mut second = TcpStream::connect(handle.local_addr()).await.unwrap();
        let mut buf = [0u8; 16];
        let n = tokio::time::timeout(Duration::from_secs(2), second.read(&mut buf))
            .await
            .unwrap()
            .unwrap_or(0);
        assert_eq!(n, 0, "connection over the limit should be closed");
        assert_eq!(handle.stats().rejected_connections, 1);

        // Slot frees up once the first client leaves
        drop(first);
        tokio::time::timeout(Duration::from_secs(2), async {
            while handle.stats().active_connections > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let mut third = TcpStream::connect(handle.local_addr()).await.unwrap();
        read_preamble(&mut third).await;

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let server = MjpegServer::with_broadcast_config(local_config(), small_ring()).unwrap();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let run = server.run_until(async {
            let _ = rx.await;
        });
        tx.send(()).unwrap();

        tokio_test::assert_ok!(tokio::time::timeout(Duration::from_secs(1), run).await.unwrap());
    }

    #[tokio::test]
    async fn test_many_clients_receive_same_frame() {
        let server = MjpegServer::with_broadcast_config(local_config(), small_ring()).unwrap();
        let mut handle = server.start().unwrap();

        let mut clients = Vec::new();
        for _ in 0..5 {
            let mut client = TcpStream::connect(handle.local_addr()).await.unwrap();
            client.write_all(b"GET / HTTP/1.0\r\n\r\n").await.unwrap();
            read_preamble(&mut client).await;
            clients.push(client);
        }

        handle.push_frame(&b"shared-frame"[..], 1);

        let expected =
            b"--frame\r\nContent-Type: image/jpeg\r\nContent-Length: 12\r\n\r\nshared-frame";
        for client in &mut clients {
            let mut buf = vec![0u8; expected.len()];
            tokio::time::timeout(Duration::from_secs(2), client.read_exact(&mut buf))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(&buf[..], &expected[..]);
        }
        assert_eq!(handle.stats().active_connections, 5);

        handle.stop().await;
    }
}
