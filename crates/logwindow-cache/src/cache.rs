//! The range cache: one mutex-guarded range list, the open-session marker and
//! the lazily rebuilt logical index.
//!
//! A single loader drives [`RangeCache::set_active_interval`] and
//! [`RangeCache::next_range_to_fill`]; any number of readers call
//! [`RangeCache::count`], [`RangeCache::get`], [`RangeCache::forward`] and
//! [`RangeCache::reverse`] through a shared `Arc<RangeCache<M>>`.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use logwindow_error::{CacheError, Result};
use logwindow_types::{IndexedMessage, Interval, Message, Position};
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::config::CacheConfig;
use crate::loaded_range::{AddOutcome, LoadedRange, ReplayWindow};
use crate::reconcile::{merge_adjacent, reconcile};
use crate::session::FillSession;
use crate::telemetry::{
    CacheMetrics, CacheMetricsSnapshot, CacheObserver, CacheTelemetryEvent, NoOpCacheObserver,
};
use crate::traverse::{Direction, Traversal};

/// The range currently claimed by a fill session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenSession {
    id: u64,
    slot: usize,
}

pub(crate) struct CacheState<M> {
    active: Option<Interval>,
    ranges: Vec<LoadedRange<M>>,
    open: Option<OpenSession>,
    next_session_id: u64,
    /// `prefix[i]` is the message count of `ranges[..i]`; stale while
    /// `prefix_dirty` is set.
    prefix: Vec<usize>,
    prefix_dirty: bool,
    generation: u64,
}

impl<M: Message> CacheState<M> {
    fn new() -> Self {
        Self {
            active: None,
            ranges: Vec::new(),
            open: None,
            next_session_id: 1,
            prefix: vec![0],
            prefix_dirty: false,
            generation: 0,
        }
    }

    /// Record a mutation of the range list.
    fn touch(&mut self) {
        self.prefix_dirty = true;
        self.generation = self.generation.wrapping_add(1);
    }

    pub(crate) const fn generation(&self) -> u64 {
        self.generation
    }

    fn prefix(&mut self) -> &[usize] {
        if self.prefix_dirty {
            self.prefix.clear();
            self.prefix.reserve(self.ranges.len() + 1);
            let mut total = 0;
            self.prefix.push(total);
            for range in &self.ranges {
                total += range.len();
                self.prefix.push(total);
            }
            self.prefix_dirty = false;
        }
        &self.prefix
    }

    pub(crate) fn count(&mut self) -> usize {
        self.prefix().last().copied().unwrap_or(0)
    }

    /// Map a logical index to `(range slot, offset)`; `None` past the end.
    fn locate(&mut self, index: usize) -> Option<(usize, usize)> {
        let prefix = self.prefix();
        let total = prefix.last().copied().unwrap_or(0);
        if index >= total {
            return None;
        }
        // Last slot whose prefix is <= index: empty ranges share their
        // successor's prefix and are skipped.
        let slot = prefix.partition_point(|&p| p <= index) - 1;
        Some((slot, index - prefix[slot]))
    }

    fn get(&mut self, index: usize) -> Option<IndexedMessage<M>> {
        let (slot, offset) = self.locate(index)?;
        Some(IndexedMessage {
            index,
            message: Arc::clone(&self.ranges[slot].messages()[offset]),
        })
    }

    /// Copy up to `limit` messages starting at logical index `start` into
    /// `out`, walking in `direction`.
    pub(crate) fn copy_batch(
        &mut self,
        start: usize,
        limit: usize,
        direction: Direction,
        out: &mut VecDeque<IndexedMessage<M>>,
    ) -> usize {
        let Some((mut slot, mut offset)) = self.locate(start) else {
            return 0;
        };
        let mut index = start;
        let mut copied = 0;
        while copied < limit {
            let messages = self.ranges[slot].messages();
            out.push_back(IndexedMessage {
                index,
                message: Arc::clone(&messages[offset]),
            });
            copied += 1;
            match direction {
                Direction::Forward => {
                    index += 1;
                    offset += 1;
                    while offset >= self.ranges[slot].len() {
                        slot += 1;
                        offset = 0;
                        if slot >= self.ranges.len() {
                            return copied;
                        }
                    }
                }
                Direction::Reverse => {
                    if index == 0 {
                        return copied;
                    }
                    index -= 1;
                    if offset > 0 {
                        offset -= 1;
                    } else {
                        loop {
                            slot -= 1;
                            if !self.ranges[slot].messages().is_empty() {
                                break;
                            }
                        }
                        offset = self.ranges[slot].len() - 1;
                    }
                }
            }
        }
        copied
    }

    /// The range claimed by session `id`.
    fn claimed(&mut self, id: u64) -> Result<&mut LoadedRange<M>> {
        match self.open {
            Some(open) if open.id == id => self
                .ranges
                .get_mut(open.slot)
                .ok_or_else(|| CacheError::internal(format!("session {id} slot out of bounds"))),
            _ => Err(CacheError::internal(format!("session {id} is not open"))),
        }
    }

    fn open_range_label(&self) -> String {
        self.open
            .and_then(|open| self.ranges.get(open.slot))
            .map_or_else(|| "<released>".to_owned(), ToString::to_string)
    }

    fn message_total(&self) -> usize {
        self.ranges.iter().map(LoadedRange::len).sum()
    }
}

/// Read-only view of one range, as returned by [`RangeCache::ranges`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RangeSnapshot {
    pub interval: Interval,
    pub loaded_end: Position,
    pub complete: bool,
    pub message_count: usize,
    /// Claimed by the currently open fill session.
    pub open: bool,
}

impl fmt::Display for RangeSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}-{}-{},{})",
            self.interval.begin(),
            self.loaded_end,
            self.interval.end(),
            self.interval.tag()
        )?;
        if self.open {
            f.write_str(" open")?;
        }
        Ok(())
    }
}

/// Windowed cache of parsed messages over an arbitrarily large source.
pub struct RangeCache<M> {
    state: Mutex<CacheState<M>>,
    config: CacheConfig,
    observer: Arc<dyn CacheObserver>,
    metrics: CacheMetrics,
    origin: Instant,
}

impl<M: Message> Default for RangeCache<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> fmt::Debug for RangeCache<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RangeCache")
            .field("name", &self.config.name)
            .finish_non_exhaustive()
    }
}

impl<M: Message> RangeCache<M> {
    /// Cache with the default configuration and no observer.
    #[must_use]
    pub fn new() -> Self {
        Self::build(CacheConfig::default())
    }

    pub fn with_config(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: CacheConfig) -> Self {
        Self {
            state: Mutex::new(CacheState::new()),
            config,
            observer: Arc::new(NoOpCacheObserver),
            metrics: CacheMetrics::new(),
            origin: Instant::now(),
        }
    }

    /// Install an observer for structured telemetry events.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn CacheObserver>) -> Self {
        self.observer = observer;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    #[must_use]
    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    #[must_use]
    pub fn metrics(&self) -> CacheMetricsSnapshot {
        self.metrics.snapshot()
    }

    // -----------------------------------------------------------------------
    // Loader side
    // -----------------------------------------------------------------------

    /// Reconcile the range list against a new active interval.
    ///
    /// Loaded content that still falls inside `active` is kept; everything
    /// else is dropped. Fails with [`CacheError::SessionOpen`] while a fill
    /// session holds a range.
    pub fn set_active_interval(&self, active: Interval) -> Result<()> {
        let mut state = self.state.lock();
        if state.open.is_some() {
            let range = state.open_range_label();
            drop(state);
            return Err(self.reject("set_active_interval", CacheError::SessionOpen { range }));
        }
        if state.active == Some(active) {
            trace!(cache = %self.config.name, interval = %active, "active interval unchanged");
            return Ok(());
        }

        let previous = std::mem::take(&mut state.ranges);
        let (ranges, stats) = reconcile(previous, active);
        state.ranges = ranges;
        state.active = Some(active);
        state.touch();

        info!(
            cache = %self.config.name,
            interval = %active,
            ranges = state.ranges.len(),
            discarded = stats.discarded,
            dropped_messages = stats.dropped_messages,
            gaps_inserted = stats.gaps_inserted,
            extended_tail = stats.extended_tail,
            "active interval set"
        );
        self.metrics
            .record_active_interval_change(stats.dropped_messages);
        let event = CacheTelemetryEvent::ActiveIntervalSet {
            interval: active,
            ranges: state.ranges.len(),
            discarded: stats.discarded,
            dropped_messages: stats.dropped_messages,
            gaps_inserted: stats.gaps_inserted,
            extended_tail: stats.extended_tail,
            timestamp_ns: self.now_ns(),
        };
        drop(state);
        self.emit(event);
        Ok(())
    }

    /// Drop the active interval and every loaded range.
    pub fn clear(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.open.is_some() {
            let range = state.open_range_label();
            drop(state);
            return Err(self.reject("clear", CacheError::SessionOpen { range }));
        }
        let dropped_messages = state.message_total();
        state.ranges.clear();
        state.active = None;
        state.touch();
        drop(state);

        info!(cache = %self.config.name, dropped_messages, "cache cleared");
        self.metrics.record_dropped(dropped_messages);
        self.emit(CacheTelemetryEvent::Cleared {
            dropped_messages,
            timestamp_ns: self.now_ns(),
        });
        Ok(())
    }

    /// Claim the first range that is not complete.
    ///
    /// `Ok(None)` when every range is complete. Only one session may be open
    /// at a time; a second request fails with
    /// [`CacheError::SessionAlreadyOpen`].
    pub fn next_range_to_fill(&self) -> Result<Option<FillSession<'_, M>>> {
        let mut state = self.state.lock();
        if state.open.is_some() {
            let range = state.open_range_label();
            drop(state);
            return Err(self.reject(
                "next_range_to_fill",
                CacheError::SessionAlreadyOpen { range },
            ));
        }
        let Some(slot) = state.ranges.iter().position(LoadedRange::needs_fill) else {
            trace!(cache = %self.config.name, "no range left to fill");
            return Ok(None);
        };

        let id = state.next_session_id;
        state.next_session_id += 1;
        state.open = Some(OpenSession { id, slot });

        let range = &state.ranges[slot];
        let replay = ReplayWindow::for_range(range);
        let interval = range.interval();
        let loaded_end = range.loaded_end();
        debug!(
            cache = %self.config.name,
            session_id = id,
            range = %range,
            resuming = replay.watermark().is_some(),
            "fill session opened"
        );
        drop(state);
        self.metrics.record_session_opened();
        self.emit(CacheTelemetryEvent::SessionOpened {
            session_id: id,
            range: interval,
            loaded_end,
            resuming: replay.watermark().is_some(),
            timestamp_ns: self.now_ns(),
        });

        Ok(Some(FillSession::new(self, id, interval, replay)))
    }

    pub(crate) fn session_add(
        &self,
        id: u64,
        message: Arc<M>,
        aux: bool,
        replay: &mut ReplayWindow,
    ) -> Result<AddOutcome> {
        let mut state = self.state.lock();
        let range = state.claimed(id)?;
        let position = message.position();
        match range.add(message, replay) {
            Ok(AddOutcome::Stored) => {
                trace!(
                    cache = %self.config.name,
                    session_id = id,
                    position = position.get(),
                    aux,
                    "message appended"
                );
                state.touch();
                self.metrics.record_append(aux);
                Ok(AddOutcome::Stored)
            }
            Ok(AddOutcome::AlreadyPresent) => {
                trace!(
                    cache = %self.config.name,
                    session_id = id,
                    position = position.get(),
                    "replayed message acknowledged"
                );
                self.metrics.record_acknowledged();
                Ok(AddOutcome::AlreadyPresent)
            }
            Err(err) => {
                drop(state);
                Err(self.reject("add", err))
            }
        }
    }

    pub(crate) fn session_complete(&self, id: u64) -> Result<()> {
        let mut state = self.state.lock();
        let range = state.claimed(id)?;
        if let Err(err) = range.complete() {
            drop(state);
            return Err(self.reject("complete", err));
        }
        debug!(cache = %self.config.name, session_id = id, range = %range, "range completed");
        state.touch();
        Ok(())
    }

    pub(crate) fn session_loaded_end(&self, id: u64) -> Result<(Position, bool)> {
        let mut state = self.state.lock();
        let range = state.claimed(id)?;
        Ok((range.loaded_end(), range.is_complete()))
    }

    /// Release session `id` and merge adjacent ranges. Runs from the
    /// session's `Drop`, so it never fails.
    pub(crate) fn release_session(&self, id: u64, appended: usize, acknowledged: usize) {
        let mut state = self.state.lock();
        let Some(open) = state.open.filter(|open| open.id == id) else {
            warn!(cache = %self.config.name, session_id = id, "released unknown fill session");
            return;
        };
        state.open = None;
        let (range, completed) = state
            .ranges
            .get(open.slot)
            .map_or((None, false), |r| (Some(r.interval()), r.is_complete()));

        let merged = merge_adjacent(&mut state.ranges);
        let ranges = state.ranges.len();
        if merged > 0 {
            state.touch();
        }
        drop(state);

        if merged > 0 {
            debug!(
                cache = %self.config.name,
                merged,
                ranges,
                "adjacent ranges merged"
            );
            self.metrics.record_merges(merged);
            self.emit(CacheTelemetryEvent::RangesMerged {
                merged,
                ranges,
                timestamp_ns: self.now_ns(),
            });
        }

        debug!(
            cache = %self.config.name,
            session_id = id,
            appended,
            acknowledged,
            completed,
            "fill session closed"
        );
        self.metrics.record_session_closed(completed);
        if let Some(range) = range {
            self.emit(CacheTelemetryEvent::SessionClosed {
                session_id: id,
                range,
                appended,
                acknowledged,
                completed,
                timestamp_ns: self.now_ns(),
            });
        }
    }

    // -----------------------------------------------------------------------
    // Reader side
    // -----------------------------------------------------------------------

    /// Total number of messages across all ranges.
    pub fn count(&self) -> usize {
        self.state.lock().count()
    }

    pub fn get(&self, index: usize) -> Option<IndexedMessage<M>> {
        self.state.lock().get(index)
    }

    /// Ascending traversal of at most `count` messages from logical index
    /// `start`. Empty when `start` is past the end.
    pub fn forward(&self, start: usize, count: usize) -> Traversal<'_, M> {
        let mut state = self.state.lock();
        let total = state.count();
        let remaining = if start < total {
            count.min(total - start)
        } else {
            0
        };
        Traversal::new(self, &mut state, Direction::Forward, start, remaining)
    }

    /// Descending traversal of at most `count` messages. `start` is clamped
    /// to the last index.
    pub fn reverse(&self, start: usize, count: usize) -> Traversal<'_, M> {
        let mut state = self.state.lock();
        let total = state.count();
        let (start, remaining) = if total == 0 {
            (0, 0)
        } else {
            let start = start.min(total - 1);
            (start, count.min(start + 1))
        };
        Traversal::new(self, &mut state, Direction::Reverse, start, remaining)
    }

    /// Diagnostic snapshot of the range list in position order.
    pub fn ranges(&self) -> Vec<RangeSnapshot> {
        let state = self.state.lock();
        let open_slot = state.open.map(|open| open.slot);
        state
            .ranges
            .iter()
            .enumerate()
            .map(|(slot, range)| RangeSnapshot {
                interval: range.interval(),
                loaded_end: range.loaded_end(),
                complete: range.is_complete(),
                message_count: range.len(),
                open: open_slot == Some(slot),
            })
            .collect()
    }

    pub fn active_interval(&self) -> Option<Interval> {
        self.state.lock().active
    }

    /// An active interval is set and every range is complete.
    pub fn is_fully_loaded(&self) -> bool {
        let state = self.state.lock();
        state.active.is_some() && state.ranges.iter().all(LoadedRange::is_complete)
    }

    /// Mutation counter; changes whenever the logical view may have changed.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, CacheState<M>> {
        self.state.lock()
    }

    pub(crate) const fn traversal_batch(&self) -> usize {
        self.config.traversal_batch
    }

    fn reject(&self, operation: &'static str, err: CacheError) -> CacheError {
        warn!(
            cache = %self.config.name,
            operation,
            kind = ?err.kind(),
            error = %err,
            "fill protocol call rejected"
        );
        if err.is_protocol_violation() {
            self.metrics.record_protocol_violation();
        }
        self.emit(CacheTelemetryEvent::ProtocolViolation {
            operation,
            kind: err.kind(),
            reason: err.to_string(),
            timestamp_ns: self.now_ns(),
        });
        err
    }

    /// Never called with the state lock held; observers may read the cache.
    fn emit(&self, event: CacheTelemetryEvent) {
        self.observer.on_event(&event);
    }

    fn now_ns(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}
