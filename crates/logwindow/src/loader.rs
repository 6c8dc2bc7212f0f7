//! Drives the fill protocol against a message source.
//!
//! [`fill_pending`] claims ranges from the cache one at a time, asks the
//! [`RangeSource`] for exactly the claimed interval starting at the range's
//! watermark, and completes the range once the source reports the interval
//! exhausted. The source never decides which positions to read.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use logwindow_cache::RangeCache;
use logwindow_error::{CacheError, Result};
use logwindow_types::{Interval, Message, Position};
use serde::Serialize;
use tracing::{debug, info};

/// How a [`RangeSource::read`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadStatus {
    /// Every message of the interval from `resume_from` on was delivered.
    Exhausted,
    /// Reading stopped early: the sink asked to stop or the source has no
    /// more data yet (a file still being written).
    Interrupted,
}

/// Produces the messages of one interval in position order.
pub trait RangeSource<M: Message> {
    /// Deliver messages with positions in `[resume_from, interval.end]`, in
    /// order, to `sink`. `sink` returns `false` to stop reading; the flag
    /// argument is the opaque per-message `aux` value.
    ///
    /// Failures of the underlying medium are reported as
    /// [`CacheError::Source`].
    fn read(
        &mut self,
        interval: Interval,
        resume_from: Position,
        sink: &mut dyn FnMut(Arc<M>, bool) -> bool,
    ) -> Result<ReadStatus>;
}

/// Summary of one [`fill_pending`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FillReport {
    pub sessions: usize,
    pub completed: usize,
    pub appended: usize,
    pub acknowledged: usize,
    /// The cancellation flag was observed.
    pub cancelled: bool,
    /// Range left resumable because the source stopped before its end.
    pub interrupted: Option<Interval>,
}

/// Fill ranges until none is left, the source stops early, or `cancel` is set.
///
/// Every stop leaves the current range resumable; a later call picks it up at
/// its watermark.
pub fn fill_pending<M, S>(
    cache: &RangeCache<M>,
    source: &mut S,
    cancel: &AtomicBool,
) -> Result<FillReport>
where
    M: Message,
    S: RangeSource<M> + ?Sized,
{
    let mut report = FillReport::default();
    loop {
        if cancel.load(Ordering::Acquire) {
            report.cancelled = true;
            break;
        }
        let Some(mut session) = cache.next_range_to_fill()? else {
            break;
        };
        report.sessions += 1;
        let interval = session.interval();
        let resume_from = session.loaded_end()?;

        let mut rejected: Option<CacheError> = None;
        let mut stopped_by_cancel = false;
        let status = source.read(interval, resume_from, &mut |message: Arc<M>, aux: bool| {
            if cancel.load(Ordering::Relaxed) {
                stopped_by_cancel = true;
                return false;
            }
            match session.add(message, aux) {
                Ok(()) => true,
                Err(err) => {
                    rejected = Some(err);
                    false
                }
            }
        })?;
        report.appended += session.appended();
        report.acknowledged += session.acknowledged();
        if let Some(err) = rejected {
            return Err(err);
        }

        match status {
            ReadStatus::Exhausted if !stopped_by_cancel => {
                session.complete()?;
                report.completed += 1;
                debug!(
                    cache = %cache.name(),
                    range = %interval,
                    appended = session.appended(),
                    "range filled"
                );
            }
            _ if stopped_by_cancel => {
                report.cancelled = true;
                break;
            }
            _ => {
                debug!(
                    cache = %cache.name(),
                    range = %interval,
                    appended = session.appended(),
                    "source stopped before range end"
                );
                report.interrupted = Some(interval);
                break;
            }
        }
    }
    info!(
        cache = %cache.name(),
        sessions = report.sessions,
        completed = report.completed,
        appended = report.appended,
        cancelled = report.cancelled,
        fully_loaded = cache.is_fully_loaded(),
        "fill pass finished"
    );
    Ok(report)
}
