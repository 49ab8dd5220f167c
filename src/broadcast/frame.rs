//! Published frame tokens
//!
//! The active slot index and its sequence number are published together as
//! one `u64` so a consumer can never pair an index with a stale sequence.

/// Bits reserved for the slot index in a packed token
pub const INDEX_BITS: u32 = 16;

/// Largest slot count a token can address
pub const MAX_SLOTS: usize = 1 << INDEX_BITS;

const INDEX_MASK: u64 = (1 << INDEX_BITS) - 1;

/// Snapshot of the most recently published frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameToken {
    /// Slot holding the frame
    pub index: usize,
    /// Sequence number assigned at publish time (starts at 1)
    pub sequence: u64,
}

impl FrameToken {
    /// Create a new token
    pub fn new(index: usize, sequence: u64) -> Self {
        Self { index, sequence }
    }

    /// Pack into the atomic representation
    ///
    /// A packed value of 0 means "nothing published"; sequence numbers start
    /// at 1 so a real token is never 0.
    pub(crate) fn pack(self) -> u64 {
        (self.sequence << INDEX_BITS) | (self.index as u64 & INDEX_MASK)
    }

    /// Unpack from the atomic representation
    pub(crate) fn unpack(raw: u64) -> Option<Self> {
        if raw == 0 {
            return None;
        }
        Some(Self {
            index: (raw & INDEX_MASK) as usize,
            sequence: raw >> INDEX_BITS,
        })
    }
}

impl std::fmt::Display for FrameToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}@{}", self.sequence, self.index)
    }
}
