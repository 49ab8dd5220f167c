//! Statistics and metrics for the broadcast server

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Frame counters kept by the broadcaster
#[derive(Debug, Default)]
pub struct BroadcastMetrics {
    frames_published: AtomicU64,
    frames_rejected: AtomicU64,
    duplicates_dropped: AtomicU64,
    bytes_published: AtomicU64,
}

impl BroadcastMetrics {
    pub(crate) fn record_published(&self, size: usize) {
        self.frames_published.fetch_add(1, Ordering::Relaxed);
        self.bytes_published
            .fetch_add(size as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.frames_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_duplicate(&self) {
        self.duplicates_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> BroadcastStats {
        BroadcastStats {
            frames_published: self.frames_published.load(Ordering::Relaxed),
            frames_rejected: self.frames_rejected.load(Ordering::Relaxed),
            duplicates_dropped: self.duplicates_dropped.load(Ordering::Relaxed),
            bytes_published: self.bytes_published.load(Ordering::Relaxed),
        }
    }
}

/// Frame-level statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    /// Frames written into a slot
    pub frames_published: u64,
    /// Frames dropped for exceeding slot capacity
    pub frames_rejected: u64,
    /// Frames dropped by the ingest side as repeated timestamps
    pub duplicates_dropped: u64,
    /// Total payload bytes published
    pub bytes_published: u64,
}

/// Connection counters kept by the listener
#[derive(Debug)]
pub struct ServerMetrics {
    started_at: Instant,
    total_connections: AtomicU64,
    active_connections: AtomicU64,
    rejected_connections: AtomicU64,
    frames_sent: AtomicU64,
    bytes_sent: AtomicU64,
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self {
            started_at: Instant::now(),
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            rejected_connections: AtomicU64::new(0),
            frames_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
        }
    }
}

impl ServerMetrics {
    pub(crate) fn connection_opened(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn connection_closed(&self, stats: &ConnectionStats) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
        self.frames_sent
            .fetch_add(stats.frames_sent, Ordering::Relaxed);
        self.bytes_sent.fetch_add(stats.bytes_sent, Ordering::Relaxed);
    }

    pub(crate) fn connection_rejected(&self) {
        self.rejected_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> ServerStats {
        ServerStats {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            rejected_connections: self.rejected_connections.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

/// Server-wide statistics
///
/// `frames_sent` and `bytes_sent` are folded in when a connection closes.
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    /// Total connections ever accepted
    pub total_connections: u64,
    /// Connections currently streaming
    pub active_connections: u64,
    /// Connections refused because the limit was reached
    pub rejected_connections: u64,
    /// Frames sent by closed connections
    pub frames_sent: u64,
    /// Bytes sent by closed connections
    pub bytes_sent: u64,
    /// Uptime
    pub uptime: Duration,
}

/// Per-connection statistics
#[derive(Debug, Clone, Default)]
pub struct ConnectionStats {
    /// Multipart parts written
    pub frames_sent: u64,
    /// Bytes written, headers included
    pub bytes_sent: u64,
    /// Reads that lost the race against an overwrite and were retried
    pub overtaken_reads: u64,
    /// Connection duration
    pub duration: Duration,
}

impl ConnectionStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Average frames per second over the connection lifetime
    pub fn frame_rate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.frames_sent as f64 / secs
        } else {
            0.0
        }
    }

    /// Average bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.duration.as_secs();
        if secs > 0 {
            (self.bytes_sent * 8) / secs
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_metrics_snapshot() {
        let metrics = BroadcastMetrics::default();
        metrics.record_published(100);
        metrics.record_published(50);
        metrics.record_rejected();
        metrics.record_duplicate();

        let stats = metrics.snapshot();
        assert_eq!(stats.frames_published, 2);
        assert_eq!(stats.bytes_published, 150);
        assert_eq!(stats.frames_rejected, 1);
        assert_eq!(stats.duplicates_dropped, 1);
    }

    #[test]
    fn test_server_metrics_lifecycle() {
        let metrics = ServerMetrics::default();
        metrics.connection_opened();
        metrics.connection_opened();
        metrics.connection_rejected();

        let stats = metrics.snapshot();
        assert_eq!(stats.total_connections, 2);
        assert_eq!(stats.active_connections, 2);
        assert_eq!(stats.rejected_connections, 1);

        let closed = ConnectionStats {
            frames_sent: 3,
            bytes_sent: 300,
            ..ConnectionStats::new()
        };
        metrics.connection_closed(&closed);

        let stats = metrics.snapshot();
        assert_eq!(stats.active_connections, 1);
        assert_eq!(stats.frames_sent, 3);
        assert_eq!(stats.bytes_sent, 300);
    }

    #[test]
    fn test_connection_stats_bitrate() {
        let stats = ConnectionStats {
            bytes_sent: 1_000_000,
            duration: Duration::from_secs(10),
            ..ConnectionStats::new()
        };

        // 1,000,000 bytes * 8 bits / 10 seconds = 800,000 bps
        assert_eq!(stats.bitrate(), 800_000);
    }

    #[test]
    fn test_connection_stats_zero_duration() {
        let stats = ConnectionStats {
            frames_sent: 10,
            bytes_sent: 1_000,
            ..ConnectionStats::new()
        };

        assert_eq!(stats.bitrate(), 0);
        assert_eq!(stats.frame_rate(), 0.0);
    }

    #[test]
    fn test_connection_stats_frame_rate() {
        let stats = ConnectionStats {
            frames_sent: 300,
            duration: Duration::from_secs(10),
            ..ConnectionStats::new()
        };

        assert!((stats.frame_rate() - 30.0).abs() < f64::EPSILON);
    }
}
