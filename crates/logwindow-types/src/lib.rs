//! Leaf value types shared by the range cache and its collaborators.
//!
//! - [`Position`]: ordered coordinate in the underlying source
//! - [`PartitionTag`]: opaque identity of a physical source or generation
//! - [`Interval`]: half-open `[begin, end)` window tagged with a partition
//! - [`Message`]: the one capability the cache needs from parsed messages

pub mod interval;
pub mod message;

pub use interval::Interval;
pub use message::{IndexedMessage, Message};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordered coordinate in the underlying source (byte offset or sequence number).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Position(u64);

impl Position {
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for Position {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the source generation an interval belongs to.
///
/// Tags are only ever compared for equality; intervals with different tags
/// never merge and a tag change on the active interval is a full source switch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionTag(u32);

impl PartitionTag {
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PartitionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
