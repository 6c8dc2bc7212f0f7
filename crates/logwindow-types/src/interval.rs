//! Half-open position intervals.

use std::fmt;

use logwindow_error::{CacheError, Result};
use serde::Serialize;

use crate::{PartitionTag, Position};

/// Half open interval `[begin, end)` in position space, tagged with the
/// partition it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Interval {
    begin: Position,
    end: Position,
    tag: PartitionTag,
}

impl Interval {
    /// Build an interval, rejecting `begin > end`.
    pub fn new(
        begin: impl Into<Position>,
        end: impl Into<Position>,
        tag: PartitionTag,
    ) -> Result<Self> {
        let (begin, end) = (begin.into(), end.into());
        if begin > end {
            return Err(CacheError::InvalidInterval {
                begin: begin.get(),
                end: end.get(),
            });
        }
        Ok(Self { begin, end, tag })
    }

    /// Interval spanning two positions given in either order.
    #[must_use]
    pub fn between(a: Position, b: Position, tag: PartitionTag) -> Self {
        Self {
            begin: a.min(b),
            end: a.max(b),
            tag,
        }
    }

    #[inline]
    #[must_use]
    pub const fn begin(&self) -> Position {
        self.begin
    }

    #[inline]
    #[must_use]
    pub const fn end(&self) -> Position {
        self.end
    }

    #[inline]
    #[must_use]
    pub const fn tag(&self) -> PartitionTag {
        self.tag
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.end.get() - self.begin.get()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    /// Whether `pos` lies in `[begin, end)`.
    #[must_use]
    pub fn contains(&self, pos: Position) -> bool {
        self.begin <= pos && pos < self.end
    }

    /// Non-empty overlap with the same tag.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.intersection(other).is_some()
    }

    /// The overlapping part of two same-tag intervals, if it is non-empty.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        if self.tag != other.tag {
            return None;
        }
        let begin = self.begin.max(other.begin);
        let end = self.end.min(other.end);
        (begin < end).then_some(Self {
            begin,
            end,
            tag: self.tag,
        })
    }

    /// Same tag and touching boundaries, in either order.
    #[must_use]
    pub fn is_adjacent_to(&self, other: &Self) -> bool {
        self.tag == other.tag && (self.end == other.begin || other.end == self.begin)
    }

    /// Span of `self` followed directly by `next`, if they are adjacent in
    /// that order.
    #[must_use]
    pub fn join(&self, next: &Self) -> Option<Self> {
        (self.tag == next.tag && self.end == next.begin).then_some(Self {
            begin: self.begin,
            end: next.end,
            tag: self.tag,
        })
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}-{},{})", self.begin, self.end, self.tag)
    }
}
