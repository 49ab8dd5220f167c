//! Frame broadcaster implementation
//!
//! Single producer, many consumers. `publish` is the only writer; `latest`
//! and `read` are the only consumer operations and neither blocks on network
//! I/O or on other consumers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use bytes::Bytes;
use tokio::sync::futures::Notified;
use tokio::sync::Notify;

use crate::error::Result;
use crate::stats::{BroadcastMetrics, BroadcastStats};

use super::config::BroadcastConfig;
use super::error::PublishError;
use super::frame::FrameToken;
use super::slot::FrameSlotPool;

/// Producer-side bookkeeping, only touched inside `publish`
#[derive(Debug)]
struct ProducerState {
    next_write_index: usize,
    next_sequence: u64,
    last_published_timestamp: Option<u64>,
}

/// Shared frame ring
///
/// Create one per server and hand out `Arc` clones to the ingest side and to
/// every connection.
#[derive(Debug)]
pub struct FrameBroadcaster {
    pool: FrameSlotPool,

    /// Packed `FrameToken` of the active slot (0 = nothing published)
    latest: AtomicU64,

    producer: Mutex<ProducerState>,

    /// Woken after every successful publish
    notify: Notify,

    metrics: BroadcastMetrics,
}

impl FrameBroadcaster {
    /// Allocate a broadcaster with the default ring size
    pub fn new() -> Result<Self> {
        Self::with_config(&BroadcastConfig::default())
    }

    /// Allocate a broadcaster with a custom ring size
    pub fn with_config(config: &BroadcastConfig) -> Result<Self> {
        let pool = FrameSlotPool::from_config(config)?;

        Ok(Self {
            pool,
            latest: AtomicU64::new(0),
            producer: Mutex::new(ProducerState {
                next_write_index: 0,
                next_sequence: 1,
                last_published_timestamp: None,
            }),
            notify: Notify::new(),
            metrics: BroadcastMetrics::default(),
        })
    }

    /// Publish a frame
    ///
    /// Copies `frame` into the next slot, then makes it the active slot.
    /// Frames larger than the slot capacity are dropped and logged.
    pub fn publish(
        &self,
        frame: &[u8],
        timestamp: u64,
    ) -> std::result::Result<FrameToken, PublishError> {
        let capacity = self.pool.capacity();
        if frame.len() > capacity {
            self.metrics.record_rejected();
            tracing::warn!(
                size = frame.len(),
                capacity = capacity,
                timestamp = timestamp,
                "Frame exceeds slot capacity, dropped"
            );
            return Err(PublishError::FrameTooLarge {
                size: frame.len(),
                capacity,
            });
        }

        let mut producer = self
            .producer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let token = FrameToken::new(producer.next_write_index, producer.next_sequence);
        self.pool.slot(token.index).write(frame, token.sequence);
        self.latest.store(token.pack(), Ordering::Release);

        producer.next_write_index = (producer.next_write_index + 1) % self.pool.len();
        producer.next_sequence += 1;
        producer.last_published_timestamp = Some(timestamp);
        drop(producer);

        self.metrics.record_published(frame.len());
        self.notify.notify_waiters();

        tracing::trace!(
            slot = token.index,
            sequence = token.sequence,
            size = frame.len(),
            "Frame published"
        );

        Ok(token)
    }

    /// Snapshot of the active slot and its sequence
    ///
    /// Returns `None` until the first frame has been published.
    pub fn latest(&self) -> Option<FrameToken> {
        FrameToken::unpack(self.latest.load(Ordering::Acquire))
    }

    /// Copy out the frame identified by `token`
    ///
    /// Returns `None` if the slot has been overwritten since the token was
    /// taken; the caller should retry against a fresh [`latest`](Self::latest).
    pub fn read(&self, token: FrameToken) -> Option<Bytes> {
        self.pool.get(token.index)?.read_if(token.sequence)
    }

    /// Future that completes on the next publish
    ///
    /// Call `enable()` on the pinned future before checking
    /// [`latest`](Self::latest) so a publish in between is not missed.
    pub fn notified(&self) -> Notified<'_> {
        self.notify.notified()
    }

    /// Timestamp of the last frame that made it into a slot
    pub fn last_published_timestamp(&self) -> Option<u64> {
        self.producer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_published_timestamp
    }

    /// Number of slots in the ring
    pub fn slot_count(&self) -> usize {
        self.pool.len()
    }

    /// Largest frame that can be published
    pub fn slot_capacity(&self) -> usize {
        self.pool.capacity()
    }

    pub(crate) fn metrics(&self) -> &BroadcastMetrics {
        &self.metrics
    }

    /// Frame counters
    pub fn stats(&self) -> BroadcastStats {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    fn small(slots: usize, capacity: usize) -> FrameBroadcaster {
        let config = BroadcastConfig::default()
            .slot_count(slots)
            .slot_capacity(capacity);
        FrameBroadcaster::with_config(&config).unwrap()
    }

    #[test]
    fn test_empty_has_no_latest() {
        let broadcaster = small(4, 16);
        assert!(broadcaster.latest().is_none());
        assert!(broadcaster.last_published_timestamp().is_none());
    }

    #[test]
    fn test_publish_and_read() {
        let broadcaster = small(4, 16);

        let token = broadcaster.publish(b"frame-one", 100).unwrap();
        assert_eq!(token, FrameToken::new(0, 1));
        assert_eq!(broadcaster.latest(), Some(token));
        assert_eq!(
            broadcaster.read(token).unwrap(),
            Bytes::from_static(b"frame-one")
        );
        assert_eq!(broadcaster.last_published_timestamp(), Some(100));
    }

    #[test]
    fn test_sequence_is_monotonic() {
        let broadcaster = small(3, 16);
        let mut last = 0;

        for i in 0..10u64 {
            broadcaster.publish(&[i as u8; 4], i).unwrap();
            let latest = broadcaster.latest().unwrap();
            assert!(latest.sequence > last);
            assert_eq!(latest.index, (i as usize) % 3);
            last = latest.sequence;
        }
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let broadcaster = small(2, 8);

        let result = broadcaster.publish(&[0u8; 9], 1);
        assert_eq!(
            result,
            Err(PublishError::FrameTooLarge {
                size: 9,
                capacity: 8
            })
        );
        assert!(broadcaster.latest().is_none());

        // The next valid frame is unaffected
        let token = broadcaster.publish(&[1u8; 8], 2).unwrap();
        assert_eq!(token.sequence, 1);
        assert_eq!(broadcaster.read(token).unwrap().len(), 8);

        let stats = broadcaster.stats();
        assert_eq!(stats.frames_rejected, 1);
        assert_eq!(stats.frames_published, 1);
    }

    #[test]
    fn test_round_robin_overwrite_invalidates_old_token() {
        let slots = 4;
        let broadcaster = small(slots, 16);

        let first = broadcaster.publish(b"first", 0).unwrap();
        assert_eq!(broadcaster.read(first).unwrap(), Bytes::from_static(b"first"));

        for i in 1..=slots as u64 {
            broadcaster.publish(format!("frame-{}", i).as_bytes(), i).unwrap();
        }

        // Slot 0 now holds the (N+1)th frame under a new sequence
        assert!(broadcaster.read(first).is_none());
        let latest = broadcaster.latest().unwrap();
        assert_eq!(latest.index, first.index);
        assert_eq!(
            broadcaster.read(latest).unwrap(),
            Bytes::from(format!("frame-{}", slots))
        );
    }

    #[test]
    fn test_read_out_of_range_token() {
        let broadcaster = small(2, 8);
        assert!(broadcaster.read(FrameToken::new(5, 1)).is_none());
    }

    #[test]
    fn test_concurrent_reads_never_tear() {
        let broadcaster = Arc::new(small(2, 1024));
        let stop = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let broadcaster = Arc::clone(&broadcaster);
                let stop = Arc::clone(&stop);
                std::thread::spawn(move || {
                    let mut successful = 0u64;
                    while !stop.load(Ordering::Relaxed) {
                        let Some(token) = broadcaster.latest() else {
                            continue;
                        };
                        if let Some(bytes) = broadcaster.read(token) {
                            // Every frame is filled with a single byte value
                            // derived from its sequence number.
                            let expected = (token.sequence % 251) as u8;
                            assert!(bytes.iter().all(|b| *b == expected));
                            successful += 1;
                        }
                    }
                    successful
                })
            })
            .collect();

        for sequence in 1..=5_000u64 {
            let len = 1 + (sequence as usize * 7) % 1024;
            broadcaster
                .publish(&vec![(sequence % 251) as u8; len], sequence)
                .unwrap();
        }
        std::thread::sleep(Duration::from_millis(20));
        stop.store(true, Ordering::Relaxed);

        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[tokio::test]
    async fn test_notified_wakes_on_publish() {
        let broadcaster = Arc::new(small(2, 8));

        let waiter = {
            let broadcaster = Arc::clone(&broadcaster);
            tokio::spawn(async move {
                let notified = broadcaster.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if broadcaster.latest().is_none() {
                    notified.await;
                }
                broadcaster.latest()
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        broadcaster.publish(b"x", 1).unwrap();

        let token = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(token.map(|t| t.sequence), Some(1));
    }
}
