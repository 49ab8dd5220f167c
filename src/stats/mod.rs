//! Server, connection and frame statistics

pub mod metrics;

pub use metrics::{BroadcastMetrics, BroadcastStats, ConnectionStats, ServerMetrics, ServerStats};
