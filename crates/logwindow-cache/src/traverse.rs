//! Lazy traversal over the cache's concatenated message view.
//!
//! The starting index is resolved under the cache lock; after that messages
//! are copied out in batches of `traversal_batch`, each under a short lock
//! hold. A traversal that observes a mutation between batches stops and
//! reports [`Traversal::is_invalidated`].

use std::collections::VecDeque;

use logwindow_types::{IndexedMessage, Message};

use crate::cache::{CacheState, RangeCache};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Forward,
    Reverse,
}

pub struct Traversal<'a, M: Message> {
    cache: &'a RangeCache<M>,
    direction: Direction,
    /// Logical index of the next message to copy out.
    next: usize,
    remaining: usize,
    generation: u64,
    buffer: VecDeque<IndexedMessage<M>>,
    invalidated: bool,
}

impl<'a, M: Message> Traversal<'a, M> {
    pub(crate) fn new(
        cache: &'a RangeCache<M>,
        state: &mut CacheState<M>,
        direction: Direction,
        start: usize,
        remaining: usize,
    ) -> Self {
        let mut traversal = Self {
            cache,
            direction,
            next: start,
            remaining,
            generation: state.generation(),
            buffer: VecDeque::new(),
            invalidated: false,
        };
        traversal.copy_from(state);
        traversal
    }

    /// The cache changed while this traversal was streaming; the remaining
    /// messages were not produced.
    #[must_use]
    pub const fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    /// Messages still to be yielded, including buffered ones.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buffer.len() + self.remaining
    }

    fn copy_from(&mut self, state: &mut CacheState<M>) {
        let limit = self.remaining.min(self.cache.traversal_batch());
        if limit == 0 {
            return;
        }
        let copied = state.copy_batch(self.next, limit, self.direction, &mut self.buffer);
        self.remaining -= copied;
        match self.direction {
            Direction::Forward => self.next += copied,
            Direction::Reverse => self.next = self.next.saturating_sub(copied),
        }
        if copied < limit {
            // Fewer messages than resolved under the same generation.
            self.remaining = 0;
        }
    }

    fn refill(&mut self) {
        let cache = self.cache;
        let mut state = cache.lock_state();
        if state.generation() != self.generation {
            self.invalidated = true;
            self.remaining = 0;
            return;
        }
        self.copy_from(&mut state);
    }
}

impl<M: Message> Iterator for Traversal<'_, M> {
    type Item = IndexedMessage<M>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && self.remaining > 0 {
            self.refill();
        }
        self.buffer.pop_front()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.buffer.len(), Some(self.remaining()))
    }
}
