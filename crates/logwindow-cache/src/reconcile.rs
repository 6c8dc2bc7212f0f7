//! Range list algebra: reconciliation against a new active interval and the
//! adjacency merge run when a fill session is released.
//!
//! Both are pure functions over an owned range list so they can be exercised
//! without the cache's lock or telemetry.

use logwindow_types::{Interval, Message};

use crate::loaded_range::LoadedRange;

/// What a reconciliation did to the previous list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ReconcileStats {
    /// Ranges dropped because of tag, disjointness, or no loaded content.
    pub discarded: usize,
    /// Messages dropped by discarding and clipping.
    pub dropped_messages: usize,
    /// Empty placeholder ranges inserted to cover gaps.
    pub gaps_inserted: usize,
    /// Whether the last surviving range grew to absorb the trailing gap.
    pub extended_tail: bool,
}

/// Rebuild `previous` so its union is exactly `active`.
///
/// 1. Ranges with another tag, no overlap, or nothing loaded are discarded.
/// 2. Survivors are clipped to their overlap with `active`.
/// 3. Gaps before and between survivors get empty placeholders; the gap after
///    the last survivor is absorbed by extending it so its loaded prefix can be
///    resumed.
/// 4. With no survivors the result is one empty range equal to `active`.
pub(crate) fn reconcile<M: Message>(
    previous: Vec<LoadedRange<M>>,
    active: Interval,
) -> (Vec<LoadedRange<M>>, ReconcileStats) {
    let mut stats = ReconcileStats::default();
    let mut survivors = Vec::with_capacity(previous.len());

    for mut range in previous {
        let Some(window) = range.interval().intersection(&active) else {
            stats.discarded += 1;
            stats.dropped_messages += range.len();
            continue;
        };
        stats.dropped_messages += range.clip_to(window);
        if range.is_empty() {
            stats.discarded += 1;
            continue;
        }
        survivors.push(range);
    }

    let mut ranges: Vec<LoadedRange<M>> = Vec::with_capacity(survivors.len() + 2);
    let mut cursor = active.begin();
    for range in survivors {
        let begin = range.interval().begin();
        if cursor < begin {
            ranges.push(LoadedRange::empty(Interval::between(
                cursor,
                begin,
                active.tag(),
            )));
            stats.gaps_inserted += 1;
        }
        cursor = range.interval().end();
        ranges.push(range);
    }

    if cursor < active.end() {
        if let Some(last) = ranges.last_mut() {
            let grown = Interval::between(last.interval().begin(), active.end(), active.tag());
            last.extend_to(grown);
            stats.extended_tail = true;
        }
    }

    if ranges.is_empty() {
        ranges.push(LoadedRange::empty(active));
    }

    debug_assert!(
        covers_exactly(&ranges, active),
        "reconciled list does not cover {active}"
    );
    (ranges, stats)
}

/// Merge every complete range with its directly adjacent successor.
///
/// The merged range spans both intervals, keeps all messages in order (junction
/// duplicates included) and takes the successor's watermark and completion, so
/// chains of complete ranges collapse in one pass. Returns the merge count.
pub(crate) fn merge_adjacent<M: Message>(ranges: &mut Vec<LoadedRange<M>>) -> usize {
    let mut merged = 0;
    let previous = std::mem::take(ranges);
    let mut out: Vec<LoadedRange<M>> = Vec::with_capacity(previous.len());
    for range in previous {
        let rejected = match out.last_mut() {
            Some(prev) => match prev.absorb(range) {
                Ok(()) => {
                    merged += 1;
                    None
                }
                Err(range) => Some(range),
            },
            None => Some(range),
        };
        if let Some(range) = rejected {
            out.push(range);
        }
    }
    *ranges = out;
    merged
}

/// Sorted, contiguous, non-overlapping and spanning exactly `active`.
pub(crate) fn covers_exactly<M: Message>(ranges: &[LoadedRange<M>], active: Interval) -> bool {
    let Some(first) = ranges.first() else {
        return false;
    };
    if first.interval().begin() != active.begin() {
        return false;
    }
    let mut cursor = active.begin();
    for range in ranges {
        let iv = range.interval();
        if iv.begin() != cursor || iv.tag() != active.tag() {
            return false;
        }
        if !(iv.begin() <= range.loaded_end() && range.loaded_end() <= iv.end()) {
            return false;
        }
        if range.is_complete() && range.loaded_end() != iv.end() {
            return false;
        }
        cursor = iv.end();
    }
    cursor == active.end()
}
