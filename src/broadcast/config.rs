//! Broadcast ring configuration

use crate::error::{Error, Result};

use super::frame::MAX_SLOTS;

/// Default number of frame slots in the ring
pub const DEFAULT_SLOT_COUNT: usize = 20;

/// Default capacity of a single slot in bytes
pub const DEFAULT_SLOT_CAPACITY: usize = 4_096_000;

/// Frame ring configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastConfig {
    /// Number of slots (N). Slots are reused round-robin.
    pub slot_count: usize,

    /// Capacity of each slot (C). Larger frames are rejected.
    pub slot_capacity: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            slot_count: DEFAULT_SLOT_COUNT,
            slot_capacity: DEFAULT_SLOT_CAPACITY,
        }
    }
}

impl BroadcastConfig {
    /// Set the number of slots
    pub fn slot_count(mut self, count: usize) -> Self {
        self.slot_count = count;
        self
    }

    /// Set the per-slot capacity in bytes
    pub fn slot_capacity(mut self, capacity: usize) -> Self {
        self.slot_capacity = capacity;
        self
    }

    /// Check the values before the pool is allocated
    pub fn validate(&self) -> Result<()> {
        if self.slot_count == 0 || self.slot_count > MAX_SLOTS {
            return Err(Error::InvalidConfig(format!(
                "slot_count must be in 1..={}, got {}",
                MAX_SLOTS, self.slot_count
            )));
        }
        if self.slot_capacity == 0 {
            return Err(Error::InvalidConfig(
                "slot_capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Total bytes reserved by a pool built from this config
    pub fn total_bytes(&self) -> usize {
        self.slot_count.saturating_mul(self.slot_capacity)
    }
}
