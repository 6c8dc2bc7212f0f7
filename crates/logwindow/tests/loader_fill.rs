use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use logwindow::{
    CacheEventRingBuffer, Interval, Message, PartitionTag, Position, RangeCache, RangeSource,
    ReadStatus, Result, fill_pending,
};

#[derive(Debug)]
struct Line {
    offset: u64,
    continuation: bool,
}

impl Message for Line {
    fn position(&self) -> Position {
        Position::new(self.offset)
    }
}

/// In-memory log: sorted offsets, of which only the first `visible` have
/// been "written" so far.
struct GrowingLog {
    offsets: Vec<u64>,
    visible: usize,
    reads: Vec<(Interval, Position)>,
}

impl GrowingLog {
    fn new(offsets: Vec<u64>) -> Self {
        let visible = offsets.len();
        Self {
            offsets,
            visible,
            reads: Vec::new(),
        }
    }
}

impl RangeSource<Line> for GrowingLog {
    fn read(
        &mut self,
        interval: Interval,
        resume_from: Position,
        sink: &mut dyn FnMut(Arc<Line>, bool) -> bool,
    ) -> Result<ReadStatus> {
        self.reads.push((interval, resume_from));
        let visible = &self.offsets[..self.visible];
        let first = visible.partition_point(|&o| o < resume_from.get());
        for &offset in &visible[first..] {
            if offset > interval.end().get() {
                return Ok(ReadStatus::Exhausted);
            }
            let continuation = offset % 2 == 1;
            if !sink(
                Arc::new(Line {
                    offset,
                    continuation,
                }),
                continuation,
            ) {
                return Ok(ReadStatus::Interrupted);
            }
        }
        if self.visible < self.offsets.len() {
            return Ok(ReadStatus::Interrupted);
        }
        Ok(ReadStatus::Exhausted)
    }
}

fn iv(begin: u64, end: u64) -> Interval {
    Interval::new(begin, end, PartitionTag::new(1)).expect("valid interval")
}

fn positions(cache: &RangeCache<Line>) -> Vec<u64> {
    cache
        .forward(0, usize::MAX)
        .map(|m| m.position().get())
        .collect()
}

#[test]
fn fills_window_and_then_scrolled_window() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let cache = RangeCache::<Line>::new();
    let mut log = GrowingLog::new((0..100).map(|i| i * 10).collect());
    let cancel = AtomicBool::new(false);

    cache.set_active_interval(iv(200, 400)).unwrap();
    let report = fill_pending(&cache, &mut log, &cancel).unwrap();
    assert_eq!(report.sessions, 1);
    assert_eq!(report.completed, 1);
    assert_eq!(report.appended, 21);
    assert!(cache.is_fully_loaded());
    assert_eq!(positions(&cache), (20..=40).map(|i| i * 10).collect::<Vec<_>>());

    // Scroll up: only the head gap is read.
    cache.set_active_interval(iv(100, 300)).unwrap();
    let report = fill_pending(&cache, &mut log, &cancel).unwrap();
    assert_eq!(report.sessions, 1);
    assert_eq!(log.reads.last(), Some(&(iv(100, 200), Position::new(100))));
    let got = positions(&cache);
    assert_eq!(got.first(), Some(&100));
    assert_eq!(got.last(), Some(&300));
    assert_eq!(
        got.iter().filter(|&&p| p == 200).count(),
        2,
        "case=junction_duplicate_kept"
    );

    // Scroll down: the tail resumes from its watermark.
    cache.set_active_interval(iv(100, 500)).unwrap();
    let report = fill_pending(&cache, &mut log, &cancel).unwrap();
    assert_eq!(report.acknowledged, 1);
    assert_eq!(log.reads.last(), Some(&(iv(100, 500), Position::new(300))));
    assert_eq!(cache.ranges().len(), 1);
    assert!(cache.is_fully_loaded());
}

#[test]
fn tailing_source_leaves_range_resumable() {
    let cache = RangeCache::<Line>::new();
    let mut log = GrowingLog::new((0..50).collect());
    log.visible = 20;
    let cancel = AtomicBool::new(false);

    cache.set_active_interval(iv(0, 49)).unwrap();
    let report = fill_pending(&cache, &mut log, &cancel).unwrap();
    assert_eq!(report.interrupted, Some(iv(0, 49)));
    assert_eq!(report.completed, 0);
    assert_eq!(cache.count(), 20);
    assert!(!cache.is_fully_loaded());

    log.visible = 50;
    let report = fill_pending(&cache, &mut log, &cancel).unwrap();
    assert_eq!(report.interrupted, None);
    assert_eq!(report.acknowledged, 1, "case=anchor_replayed");
    assert_eq!(positions(&cache), (0..50).collect::<Vec<_>>());
    assert!(cache.is_fully_loaded());

    let flagged = cache.metrics().aux_flagged_total;
    assert_eq!(flagged, 25);
    assert!(cache.get(1).unwrap().message.continuation);
}

#[test]
fn cancellation_mid_read_stops_and_resumes() {
    struct Cancelling<'a> {
        inner: GrowingLog,
        cancel: &'a AtomicBool,
        after: usize,
    }

    impl RangeSource<Line> for Cancelling<'_> {
        fn read(
            &mut self,
            interval: Interval,
            resume_from: Position,
            sink: &mut dyn FnMut(Arc<Line>, bool) -> bool,
        ) -> Result<ReadStatus> {
            let cancel = self.cancel;
            let mut left = self.after;
            self.inner.read(interval, resume_from, &mut |line: Arc<Line>, aux: bool| {
                if left == 0 {
                    cancel.store(true, Ordering::Release);
                }
                left = left.saturating_sub(1);
                sink(line, aux)
            })
        }
    }

    let cache = RangeCache::<Line>::new();
    let ring = Arc::new(CacheEventRingBuffer::new(64));
    let cache = cache.with_observer(ring.clone());
    let cancel = AtomicBool::new(false);
    let mut source = Cancelling {
        inner: GrowingLog::new((0..30).collect()),
        cancel: &cancel,
        after: 10,
    };

    cache.set_active_interval(iv(0, 29)).unwrap();
    let report = fill_pending(&cache, &mut source, &cancel).unwrap();
    assert!(report.cancelled);
    assert_eq!(report.appended, 10);
    assert_eq!(cache.ranges()[0].to_string(), "(0-9-29,1)");

    cancel.store(false, Ordering::Release);
    source.after = usize::MAX;
    let report = fill_pending(&cache, &mut source, &cancel).unwrap();
    assert!(!report.cancelled);
    assert_eq!(report.completed, 1);
    assert_eq!(positions(&cache), (0..30).collect::<Vec<_>>());

    let closed = ring
        .drain()
        .into_iter()
        .filter(|e| e.kind_str() == "session_closed")
        .count();
    assert_eq!(closed, 2);
    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("\"completed\":1"));
}
