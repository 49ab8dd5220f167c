//! Fixed-capacity frame slots
//!
//! Slots are allocated once when the pool is created and never resized.
//! Each slot keeps its bytes, the number of valid bytes and the sequence
//! number of the publish that wrote it.

use std::sync::{PoisonError, RwLock};

use bytes::Bytes;

use crate::error::{Error, Result};

use super::config::BroadcastConfig;

#[derive(Debug)]
struct SlotData {
    /// Holds the current frame; capacity is reserved up front and never
    /// grows, so pages are only touched as frames fill them
    data: Vec<u8>,
    /// Sequence of the publish that wrote this slot (0 = never written)
    sequence: u64,
}

/// One reusable frame buffer
#[derive(Debug)]
pub struct FrameSlot {
    inner: RwLock<SlotData>,
    capacity: usize,
}

impl FrameSlot {
    fn allocate(capacity: usize) -> Option<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(capacity).ok()?;

        Some(Self {
            inner: RwLock::new(SlotData { data, sequence: 0 }),
            capacity,
        })
    }

    /// Slot capacity in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sequence currently stored in the slot
    pub fn sequence(&self) -> u64 {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sequence
    }

    /// Number of valid bytes currently stored in the slot
    pub fn size(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .data
            .len()
    }

    /// Overwrite the slot with a new frame
    ///
    /// The caller has already checked `frame.len() <= capacity`.
    pub(crate) fn write(&self, frame: &[u8], sequence: u64) {
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        slot.data.clear();
        slot.data.extend_from_slice(frame);
        slot.sequence = sequence;
    }

    /// Copy the slot out if it still holds `sequence`
    pub(crate) fn read_if(&self, sequence: u64) -> Option<Bytes> {
        let slot = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        if slot.sequence != sequence {
            return None;
        }
        Some(Bytes::copy_from_slice(&slot.data))
    }
}

/// Ordered set of slots, indexed `0..N`
#[derive(Debug)]
pub struct FrameSlotPool {
    slots: Vec<FrameSlot>,
    capacity: usize,
}

impl FrameSlotPool {
    /// Reserve `count` slots of `capacity` bytes each
    ///
    /// Fails with [`Error::Allocation`] if the memory cannot be obtained.
    pub fn allocate(count: usize, capacity: usize) -> Result<Self> {
        BroadcastConfig {
            slot_count: count,
            slot_capacity: capacity,
        }
        .validate()?;

        let alloc_error = || Error::Allocation {
            slots: count,
            capacity,
        };

        let mut slots = Vec::new();
        slots.try_reserve_exact(count).map_err(|_| alloc_error())?;
        for _ in 0..count {
            slots.push(FrameSlot::allocate(capacity).ok_or_else(alloc_error)?);
        }

        tracing::debug!(
            slots = count,
            capacity = capacity,
            "Frame slot pool allocated"
        );

        Ok(Self { slots, capacity })
    }

    /// Build a pool from a config
    pub fn from_config(config: &BroadcastConfig) -> Result<Self> {
        Self::allocate(config.slot_count, config.slot_capacity)
    }

    /// Get a slot by index
    pub fn get(&self, index: usize) -> Option<&FrameSlot> {
        self.slots.get(index)
    }

    /// Slot at an index known to be in range
    pub(crate) fn slot(&self, index: usize) -> &FrameSlot {
        &self.slots[index]
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false for a successfully allocated pool
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Per-slot capacity in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
