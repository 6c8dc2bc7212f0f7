//! Scoped single-writer claim on one range.
//!
//! A [`FillSession`] is returned by [`RangeCache::next_range_to_fill`]. It
//! appends messages and completes its range; dropping it (on any exit path,
//! unwinding included) releases the claim and merges adjacent ranges.

use std::sync::Arc;

use logwindow_error::Result;
use logwindow_types::{Interval, Message, Position};

use crate::cache::RangeCache;
use crate::loaded_range::{AddOutcome, ReplayWindow};

#[must_use = "dropping a fill session releases its range immediately"]
pub struct FillSession<'a, M: Message> {
    cache: &'a RangeCache<M>,
    id: u64,
    interval: Interval,
    replay: ReplayWindow,
    appended: usize,
    acknowledged: usize,
}

impl<'a, M: Message> FillSession<'a, M> {
    pub(crate) const fn new(
        cache: &'a RangeCache<M>,
        id: u64,
        interval: Interval,
        replay: ReplayWindow,
    ) -> Self {
        Self {
            cache,
            id,
            interval,
            replay,
            appended: 0,
            acknowledged: 0,
        }
    }

    /// Append the next message of the claimed interval.
    ///
    /// While resuming, messages at or before the watermark found at claim
    /// time are acknowledged as already present and not stored again. `aux`
    /// is an opaque side channel the cache only counts.
    pub fn add(&mut self, message: impl Into<Arc<M>>, aux: bool) -> Result<()> {
        match self
            .cache
            .session_add(self.id, message.into(), aux, &mut self.replay)?
        {
            AddOutcome::Stored => self.appended += 1,
            AddOutcome::AlreadyPresent => self.acknowledged += 1,
        }
        Ok(())
    }

    /// Declare the interval exhaustively read; further `add` calls fail.
    pub fn complete(&mut self) -> Result<()> {
        self.cache.session_complete(self.id)
    }

    /// The claimed interval; fixed for the session's lifetime.
    #[must_use]
    pub const fn interval(&self) -> Interval {
        self.interval
    }

    pub fn loaded_end(&self) -> Result<Position> {
        self.cache
            .session_loaded_end(self.id)
            .map(|(loaded_end, _)| loaded_end)
    }

    pub fn is_complete(&self) -> Result<bool> {
        self.cache
            .session_loaded_end(self.id)
            .map(|(_, complete)| complete)
    }

    /// Watermark recorded when the range was claimed, while replay is still
    /// being recognised.
    #[must_use]
    pub const fn resume_from(&self) -> Option<Position> {
        self.replay.watermark()
    }

    /// Messages stored by this session.
    #[must_use]
    pub const fn appended(&self) -> usize {
        self.appended
    }

    /// Replayed messages recognised as already present.
    #[must_use]
    pub const fn acknowledged(&self) -> usize {
        self.acknowledged
    }
}

impl<M: Message> Drop for FillSession<'_, M> {
    fn drop(&mut self) {
        self.cache
            .release_session(self.id, self.appended, self.acknowledged);
    }
}
