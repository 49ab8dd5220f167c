//! HTTP server side: accept loop, per-client connections and lifecycle

pub mod config;
pub mod connection;
pub mod handle;
pub mod listener;

pub use config::ServerConfig;
pub use connection::Connection;
pub use handle::ServerHandle;
pub use listener::MjpegServer;
