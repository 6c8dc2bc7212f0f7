//! Structured telemetry for the range cache.
//!
//! Zero-cost observer pattern: a [`CacheObserver`] trait whose default
//! implementation ([`NoOpCacheObserver`]) compiles away, a bounded
//! [`CacheEventRingBuffer`] for diagnostic queries, and per-instance
//! [`CacheMetrics`] counters.
//!
//! # Conformance rules
//!
//! 1. Every [`CacheTelemetryEvent`] variant carries a monotonic `timestamp_ns`
//!    measured from the owning cache's creation.
//! 2. All events and snapshots implement `serde::Serialize` for JSON export.
//! 3. Observers are called after the cache lock is released: they may read
//!    the cache, but run on the caller's thread and should not block.
//! 4. Counters are `AtomicU64` with `Ordering::Relaxed`, one set per cache
//!    instance; there are no process-wide counters.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use logwindow_error::ErrorKind;
use logwindow_types::{Interval, Position};
use serde::Serialize;

use crate::config::CacheConfig;

// ---------------------------------------------------------------------------
// Telemetry event schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CacheTelemetryEvent {
    /// The range list was reconciled against a new active interval.
    ActiveIntervalSet {
        interval: Interval,
        /// Ranges in the list afterwards.
        ranges: usize,
        discarded: usize,
        dropped_messages: usize,
        gaps_inserted: usize,
        extended_tail: bool,
        timestamp_ns: u64,
    },

    /// Active interval and all ranges dropped.
    Cleared {
        dropped_messages: usize,
        timestamp_ns: u64,
    },

    /// A fill session claimed a range.
    SessionOpened {
        session_id: u64,
        range: Interval,
        loaded_end: Position,
        /// Whether the range already held loaded content.
        resuming: bool,
        timestamp_ns: u64,
    },

    /// A fill session released its range.
    SessionClosed {
        session_id: u64,
        range: Interval,
        appended: usize,
        acknowledged: usize,
        completed: bool,
        timestamp_ns: u64,
    },

    /// Adjacent ranges were merged on release.
    RangesMerged {
        merged: usize,
        /// Ranges in the list afterwards.
        ranges: usize,
        timestamp_ns: u64,
    },

    /// A caller broke the fill protocol; the call was rejected.
    ProtocolViolation {
        operation: &'static str,
        kind: ErrorKind,
        reason: String,
        timestamp_ns: u64,
    },
}

impl CacheTelemetryEvent {
    #[must_use]
    pub fn timestamp_ns(&self) -> u64 {
        match self {
            Self::ActiveIntervalSet { timestamp_ns, .. }
            | Self::Cleared { timestamp_ns, .. }
            | Self::SessionOpened { timestamp_ns, .. }
            | Self::SessionClosed { timestamp_ns, .. }
            | Self::RangesMerged { timestamp_ns, .. }
            | Self::ProtocolViolation { timestamp_ns, .. } => *timestamp_ns,
        }
    }

    /// Short classification label for this event kind.
    #[must_use]
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::ActiveIntervalSet { .. } => "active_interval_set",
            Self::Cleared { .. } => "cleared",
            Self::SessionOpened { .. } => "session_opened",
            Self::SessionClosed { .. } => "session_closed",
            Self::RangesMerged { .. } => "ranges_merged",
            Self::ProtocolViolation { .. } => "protocol_violation",
        }
    }
}

// ---------------------------------------------------------------------------
// Observer trait (zero-cost when unused)
// ---------------------------------------------------------------------------

pub trait CacheObserver: Send + Sync {
    fn on_event(&self, event: &CacheTelemetryEvent);
}

/// No-op observer that compiles to zero instructions.
pub struct NoOpCacheObserver;

impl CacheObserver for NoOpCacheObserver {
    #[inline(always)]
    fn on_event(&self, _event: &CacheTelemetryEvent) {}
}

/// Ring-buffer observer that keeps the last N events for diagnostics.
pub struct CacheEventRingBuffer {
    capacity: usize,
    events: parking_lot::Mutex<VecDeque<CacheTelemetryEvent>>,
}

impl CacheEventRingBuffer {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: parking_lot::Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Ring sized by [`CacheConfig::event_buffer`].
    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.event_buffer)
    }

    /// Copy of the retained events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<CacheTelemetryEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Take the retained events, oldest first, leaving the ring empty.
    #[must_use]
    pub fn drain(&self) -> Vec<CacheTelemetryEvent> {
        self.events.lock().drain(..).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheObserver for CacheEventRingBuffer {
    fn on_event(&self, event: &CacheTelemetryEvent) {
        let mut events = self.events.lock();
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event.clone());
    }
}

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct CacheMetrics {
    active_interval_changes: AtomicU64,
    sessions_opened: AtomicU64,
    sessions_completed: AtomicU64,
    sessions_abandoned: AtomicU64,
    messages_appended: AtomicU64,
    messages_acknowledged: AtomicU64,
    aux_flagged: AtomicU64,
    messages_dropped: AtomicU64,
    merges: AtomicU64,
    protocol_violations: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheMetricsSnapshot {
    pub active_interval_changes_total: u64,
    pub sessions_opened_total: u64,
    pub sessions_completed_total: u64,
    pub sessions_abandoned_total: u64,
    pub messages_appended_total: u64,
    pub messages_acknowledged_total: u64,
    pub aux_flagged_total: u64,
    pub messages_dropped_total: u64,
    pub merges_total: u64,
    pub protocol_violations_total: u64,
}

impl CacheMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_active_interval_change(&self, dropped_messages: usize) {
        self.active_interval_changes.fetch_add(1, Ordering::Relaxed);
        self.record_dropped(dropped_messages);
    }

    pub fn record_dropped(&self, dropped_messages: usize) {
        self.messages_dropped
            .fetch_add(dropped_messages as u64, Ordering::Relaxed);
    }

    pub fn record_session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_closed(&self, completed: bool) {
        let counter = if completed {
            &self.sessions_completed
        } else {
            &self.sessions_abandoned
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// One stored message; `aux` is counted and otherwise ignored.
    pub fn record_append(&self, aux: bool) {
        self.messages_appended.fetch_add(1, Ordering::Relaxed);
        if aux {
            self.aux_flagged.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_acknowledged(&self) {
        self.messages_acknowledged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_merges(&self, merged: usize) {
        self.merges.fetch_add(merged as u64, Ordering::Relaxed);
    }

    pub fn record_protocol_violation(&self) {
        self.protocol_violations.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            active_interval_changes_total: self.active_interval_changes.load(Ordering::Relaxed),
            sessions_opened_total: self.sessions_opened.load(Ordering::Relaxed),
            sessions_completed_total: self.sessions_completed.load(Ordering::Relaxed),
            sessions_abandoned_total: self.sessions_abandoned.load(Ordering::Relaxed),
            messages_appended_total: self.messages_appended.load(Ordering::Relaxed),
            messages_acknowledged_total: self.messages_acknowledged.load(Ordering::Relaxed),
            aux_flagged_total: self.aux_flagged.load(Ordering::Relaxed),
            messages_dropped_total: self.messages_dropped.load(Ordering::Relaxed),
            merges_total: self.merges.load(Ordering::Relaxed),
            protocol_violations_total: self.protocol_violations.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.active_interval_changes,
            &self.sessions_opened,
            &self.sessions_completed,
            &self.sessions_abandoned,
            &self.messages_appended,
            &self.messages_acknowledged,
            &self.aux_flagged,
            &self.messages_dropped,
            &self.merges,
            &self.protocol_violations,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
