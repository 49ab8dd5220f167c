//! Frame broadcast ring
//!
//! A fixed pool of pre-allocated frame slots shared between one producer and
//! any number of connection handlers. The producer writes each frame into the
//! next slot in round-robin order and then publishes a single packed token
//! (slot index + sequence number). Consumers never follow a raw index: they
//! read the token, copy the slot out and keep the bytes only if the slot still
//! carries the sequence they asked for.
//!
//! # Architecture
//!
//! ```text
//!                      Arc<FrameBroadcaster>
//!                 ┌─────────────────────────────┐
//!                 │ pool: [FrameSlot; N]        │
//!                 │   RwLock<{ data, size,      │
//!                 │            sequence }>      │
//!                 │ latest: AtomicU64 token     │
//!                 │ notify: Notify              │
//!                 └──────────────┬──────────────┘
//!                                │
//!        ┌───────────────────────┼───────────────────────┐
//!        │                       │                       │
//!        ▼                       ▼                       ▼
//!  [IngestAdapter]         [Connection]            [Connection]
//!  publish(bytes)          latest() + read()       latest() + read()
//!        │                       │                       │
//!        └──► slot write ──► token store ──► copy out ──► TCP
//! ```
//!
//! # Tearing
//!
//! Slot bytes are only mutated under the slot's write lock, and the token is
//! stored after the write completes. A reader that loses the race against a
//! wrap-around overwrite sees a different sequence and gets `None` back, so a
//! successful read always holds exactly one published frame.

pub mod config;
pub mod error;
pub mod frame;
pub mod slot;
pub mod store;

pub use config::BroadcastConfig;
pub use error::PublishError;
pub use frame::FrameToken;
pub use slot::{FrameSlot, FrameSlotPool};
pub use store::FrameBroadcaster;
