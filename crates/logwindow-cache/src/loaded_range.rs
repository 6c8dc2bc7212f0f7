//! A materialised sub-interval of the active window.
//!
//! `LoadedRange` owns the messages read so far for one interval together with
//! the `loaded_end` watermark:
//! - `interval.begin <= loaded_end <= interval.end`
//! - every stored position lies in `[interval.begin, loaded_end]`, non-decreasing
//! - `complete` implies `loaded_end == interval.end`

use std::fmt;
use std::sync::Arc;

use logwindow_error::{CacheError, Result};
use logwindow_types::{Interval, Message, Position};

/// Outcome of offering one message to a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AddOutcome {
    /// Appended; the watermark moved to the message position.
    Stored,
    /// Re-presented content at or before the resume watermark; not stored.
    AlreadyPresent,
}

/// Replay state of a fill session resuming a partially loaded range.
///
/// While `watermark` is set, a message at or before it is acknowledged when
/// the range already holds a message at that position. It is cleared by the
/// first message that extends the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReplayWindow {
    watermark: Option<Position>,
}

impl ReplayWindow {
    pub(crate) fn for_range<M: Message>(range: &LoadedRange<M>) -> Self {
        let watermark = (!range.is_empty()).then_some(range.loaded_end);
        Self { watermark }
    }

    #[cfg(test)]
    pub(crate) const fn closed() -> Self {
        Self { watermark: None }
    }

    pub(crate) const fn watermark(&self) -> Option<Position> {
        self.watermark
    }
}

pub(crate) struct LoadedRange<M> {
    interval: Interval,
    loaded_end: Position,
    messages: Vec<Arc<M>>,
    complete: bool,
}

impl<M: Message> LoadedRange<M> {
    /// Placeholder covering `interval` with nothing loaded yet.
    ///
    /// A zero-length interval has nothing to read and starts complete.
    pub(crate) fn empty(interval: Interval) -> Self {
        Self {
            interval,
            loaded_end: interval.begin(),
            messages: Vec::new(),
            complete: interval.is_empty(),
        }
    }

    #[inline]
    pub(crate) const fn interval(&self) -> Interval {
        self.interval
    }

    #[inline]
    pub(crate) const fn loaded_end(&self) -> Position {
        self.loaded_end
    }

    #[inline]
    pub(crate) const fn is_complete(&self) -> bool {
        self.complete
    }

    #[inline]
    pub(crate) fn messages(&self) -> &[Arc<M>] {
        &self.messages
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.messages.len()
    }

    /// Nothing loaded: no messages and the watermark still at `begin`.
    pub(crate) fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.loaded_end == self.interval.begin()
    }

    /// Some stored message sits exactly at `position`.
    fn holds(&self, position: Position) -> bool {
        let at = self.messages.partition_point(|m| m.position() < position);
        self.messages
            .get(at)
            .is_some_and(|m| m.position() == position)
    }

    /// A fill session may still extend this range.
    #[inline]
    pub(crate) const fn needs_fill(&self) -> bool {
        !self.complete
    }

    /// Offer one message to the range.
    pub(crate) fn add(&mut self, message: Arc<M>, replay: &mut ReplayWindow) -> Result<AddOutcome> {
        if self.complete {
            return Err(CacheError::RangeComplete {
                range: self.to_string(),
            });
        }
        let position = message.position();
        if position < self.interval.begin() || position > self.interval.end() {
            return Err(CacheError::PositionOutOfRange {
                position: position.get(),
                begin: self.interval.begin().get(),
                end: self.interval.end().get(),
            });
        }
        if replay.watermark.is_some_and(|watermark| position <= watermark) && self.holds(position)
        {
            return Ok(AddOutcome::AlreadyPresent);
        }
        if position < self.loaded_end {
            return Err(CacheError::NonMonotonic {
                position: position.get(),
                loaded_end: self.loaded_end.get(),
            });
        }
        self.messages
            .try_reserve(1)
            .map_err(|_| CacheError::OutOfMemory { requested: 1 })?;
        self.messages.push(message);
        self.loaded_end = position;
        replay.watermark = None;
        Ok(AddOutcome::Stored)
    }

    /// Declare the range exhaustively scanned up to its end.
    pub(crate) fn complete(&mut self) -> Result<()> {
        if self.complete {
            return Err(CacheError::RangeComplete {
                range: self.to_string(),
            });
        }
        self.loaded_end = self.interval.end();
        self.complete = true;
        Ok(())
    }

    /// Clip the range to `window`, which must lie within the current interval.
    ///
    /// Returns the number of messages dropped.
    pub(crate) fn clip_to(&mut self, window: Interval) -> usize {
        debug_assert!(
            window.begin() >= self.interval.begin() && window.end() <= self.interval.end(),
            "clip window {window} exceeds {self}"
        );
        let raw_loaded_end = self.loaded_end;
        let before = self.messages.len();

        if window.begin() > self.interval.begin() {
            let first_kept = self
                .messages
                .partition_point(|m| m.position() < window.begin());
            self.messages.drain(..first_kept);
            self.loaded_end = window.begin().max(raw_loaded_end.min(window.end()));
        }

        if window.end() < self.interval.end() {
            let kept = self
                .messages
                .partition_point(|m| m.position() <= window.end());
            self.messages.truncate(kept);
            self.complete = raw_loaded_end >= window.end();
            self.loaded_end = self.loaded_end.min(window.end());
        }

        self.interval = window;
        before - self.messages.len()
    }

    /// Grow the interval to `extended`, which must share `begin` and tag.
    ///
    /// The watermark stays, so the grown tail is left for a resumed fill.
    pub(crate) fn extend_to(&mut self, extended: Interval) {
        debug_assert_eq!(extended.begin(), self.interval.begin());
        debug_assert!(extended.end() >= self.interval.end());
        if extended.end() > self.interval.end() {
            self.complete = false;
        }
        self.interval = extended;
    }

    /// Append `next` (the directly following range) to this complete range.
    ///
    /// Messages are concatenated as they are; a junction message stored by
    /// both sides stays twice. The result takes `next`'s watermark and state.
    pub(crate) fn absorb(&mut self, mut next: Self) -> std::result::Result<(), Self> {
        let Some(joined) = self.interval.join(&next.interval) else {
            return Err(next);
        };
        if !self.complete {
            return Err(next);
        }
        self.interval = joined;
        self.messages.append(&mut next.messages);
        self.loaded_end = next.loaded_end;
        self.complete = next.complete;
        Ok(())
    }
}

impl<M> fmt::Display for LoadedRange<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}-{}-{},{})",
            self.interval.begin(),
            self.loaded_end,
            self.interval.end(),
            self.interval.tag()
        )
    }
}

impl<M> fmt::Debug for LoadedRange<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedRange")
            .field("interval", &self.interval)
            .field("loaded_end", &self.loaded_end)
            .field("messages", &format_args!("[{} message(s)]", self.messages.len()))
            .field("complete", &self.complete)
            .finish()
    }
}
