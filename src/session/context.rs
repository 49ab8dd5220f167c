//! Session context
//!
//! Read-only description of a connection, attached to log records and
//! handed back to callers inspecting live sessions.

use std::net::SocketAddr;

use super::state::SessionState;

/// Identifying information about one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Unique session ID
    pub session_id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,
}

impl SessionContext {
    /// Create a new context
    pub fn new(session_id: u64, peer_addr: SocketAddr) -> Self {
        Self {
            session_id,
            peer_addr,
        }
    }
}

impl From<&SessionState> for SessionContext {
    fn from(state: &SessionState) -> Self {
        Self::new(state.id, state.peer_addr)
    }
}

impl std::fmt::Display for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.session_id, self.peer_addr)
    }
}
