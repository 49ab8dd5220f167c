//! Push handle for the pipeline and the producer task behind it
//!
//! The pipeline calls [`FrameSink::push`] from its own thread. Only the most
//! recent frame is kept: if the producer falls behind, older undelivered
//! frames are replaced, never queued.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::adapter::{IngestAdapter, IngestOutcome};
use super::frame::PipelineFrame;

/// Pipeline-facing frame input
///
/// Cloneable; all clones feed the same producer task.
#[derive(Debug, Clone)]
pub struct FrameSink {
    tx: Arc<watch::Sender<Option<PipelineFrame>>>,
}

impl FrameSink {
    /// Create a sink and the receiver the producer task drains
    pub fn channel() -> (Self, watch::Receiver<Option<PipelineFrame>>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx: Arc::new(tx) }, rx)
    }

    /// Hand over one encoded frame
    ///
    /// Never blocks. Safe to call from non-async threads.
    pub fn push(&self, data: impl Into<Bytes>, timestamp: u64) {
        self.tx
            .send_replace(Some(PipelineFrame::new(data, timestamp)));
    }

    /// Whether the producer task has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the producer task
///
/// Runs until every [`FrameSink`] clone is dropped or the task is aborted.
pub fn spawn_producer(
    rx: watch::Receiver<Option<PipelineFrame>>,
    adapter: IngestAdapter,
) -> JoinHandle<()> {
    tokio::spawn(run_producer(rx, adapter))
}

async fn run_producer(
    mut rx: watch::Receiver<Option<PipelineFrame>>,
    mut adapter: IngestAdapter,
) {
    tracing::debug!("Producer task started");

    while rx.changed().await.is_ok() {
        let frame = rx.borrow_and_update().clone();
        let Some(frame) = frame else {
            continue;
        };

        if let IngestOutcome::Rejected(e) = adapter.ingest(&frame) {
            tracing::debug!(
                timestamp = frame.timestamp,
                error = %e,
                "Frame not published"
            );
        }
    }

    tracing::debug!("Producer task finished");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::broadcast::{BroadcastConfig, FrameBroadcaster};

    use super::*;

    async fn wait_for_sequence(broadcaster: &FrameBroadcaster, sequence: u64) {
        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                let notified = broadcaster.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if broadcaster.latest().map(|t| t.sequence) >= Some(sequence) {
                    return;
                }
                notified.await;
            }
        })
        .await
        .expect("frame was not published in time");
    }

    #[tokio::test]
    async fn test_push_reaches_broadcaster() {
        let config = BroadcastConfig::default().slot_count(4).slot_capacity(64);
        let broadcaster = Arc::new(FrameBroadcaster::with_config(&config).unwrap());
        let (sink, rx) = FrameSink::channel();
        let producer = spawn_producer(rx, IngestAdapter::new(Arc::clone(&broadcaster)));

        sink.push(Bytes::from_static(b"frame-1"), 1);
        wait_for_sequence(&broadcaster, 1).await;

        let token = broadcaster.latest().unwrap();
        assert_eq!(
            broadcaster.read(token).unwrap(),
            Bytes::from_static(b"frame-1")
        );

        producer.abort();
    }

    #[tokio::test]
    async fn test_producer_exits_when_sinks_dropped() {
        let config = BroadcastConfig::default().slot_count(2).slot_capacity(8);
        let broadcaster = Arc::new(FrameBroadcaster::with_config(&config).unwrap());
        let (sink, rx) = FrameSink::channel();
        let producer = spawn_producer(rx, IngestAdapter::new(broadcaster));

        assert!(!sink.is_closed());
        drop(sink);

        let finished = tokio::time::timeout(Duration::from_secs(1), producer).await;
        tokio_test::assert_ok!(tokio_test::assert_ok!(finished));
    }

    #[test]
    fn test_push_without_producer_does_not_block() {
        let (sink, rx) = FrameSink::channel();
        drop(rx);

        sink.push(vec![1u8, 2, 3], 7);
        assert!(sink.is_closed());
    }
}
