//! Connection state machine
//!
//! Tracks one client from the response head to the closed socket.
//!
//! ```text
//! Greeting ──(head sent)──► Streaming ──(peer closed / send error)──► Closed
//!     └────────────(send error)──────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::time::Instant;

use crate::broadcast::FrameToken;

/// Connection lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// Response head not yet written
    Greeting,
    /// Sending one part per new frame
    Streaming,
    /// Socket released, terminal
    Closed,
}

/// Why a connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer closed its side (EOF on read)
    PeerClosed,
    /// Writing the response head failed
    GreetingFailed,
    /// Writing a frame part failed
    SendFailed,
    /// A write did not finish within the send timeout
    SendTimeout,
    /// Reading from the peer failed
    ReadFailed,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            CloseReason::PeerClosed => "peer closed",
            CloseReason::GreetingFailed => "greeting failed",
            CloseReason::SendFailed => "send failed",
            CloseReason::SendTimeout => "send timed out",
            CloseReason::ReadFailed => "read failed",
        };
        f.write_str(reason)
    }
}

/// Per-client record of what has been streamed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientCursor {
    /// Sequence of the last frame written (0 = none yet)
    pub last_seen_sequence: u64,
}

impl ClientCursor {
    /// Create a cursor that has seen nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// `latest` if it has not been streamed yet
    pub fn pending(&self, latest: Option<FrameToken>) -> Option<FrameToken> {
        latest.filter(|token| token.sequence > self.last_seen_sequence)
    }

    /// Record a frame as streamed
    pub fn advance(&mut self, token: FrameToken) {
        self.last_seen_sequence = self.last_seen_sequence.max(token.sequence);
    }
}

/// Complete connection state
#[derive(Debug)]
pub struct SessionState {
    /// Unique session ID
    pub id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Current phase
    pub phase: ConnectionPhase,

    /// Streaming position
    pub cursor: ClientCursor,

    /// Connection start time
    pub connected_at: Instant,

    /// Why the connection closed, once it has
    pub close_reason: Option<CloseReason>,
}

impl SessionState {
    /// Create a new session state
    pub fn new(id: u64, peer_addr: SocketAddr) -> Self {
        Self {
            id,
            peer_addr,
            phase: ConnectionPhase::Greeting,
            cursor: ClientCursor::new(),
            connected_at: Instant::now(),
            close_reason: None,
        }
    }

    /// Response head written
    pub fn start_streaming(&mut self) {
        if self.phase == ConnectionPhase::Greeting {
            self.phase = ConnectionPhase::Streaming;
        }
    }

    /// Enter the terminal phase; the first reason wins
    pub fn close(&mut self, reason: CloseReason) {
        if self.phase != ConnectionPhase::Closed {
            self.phase = ConnectionPhase::Closed;
            self.close_reason = Some(reason);
        }
    }

    /// Check if the connection is streaming
    pub fn is_streaming(&self) -> bool {
        self.phase == ConnectionPhase::Streaming
    }

    /// Check if the connection is closed
    pub fn is_closed(&self) -> bool {
        self.phase == ConnectionPhase::Closed
    }

    /// Get session duration
    pub fn duration(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }
}
