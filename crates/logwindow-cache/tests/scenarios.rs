use std::sync::Arc;

use logwindow_cache::{CacheEventRingBuffer, CacheTelemetryEvent, RangeCache};
use logwindow_error::CacheError;
use logwindow_types::{Interval, Message, PartitionTag, Position};

const TAG: PartitionTag = PartitionTag::new(1);

#[derive(Debug, Clone, PartialEq, Eq)]
struct LogLine {
    offset: u64,
    text: String,
}

impl LogLine {
    fn at(offset: u64) -> Arc<Self> {
        Arc::new(Self {
            offset,
            text: format!("line@{offset}"),
        })
    }
}

impl Message for LogLine {
    fn position(&self) -> Position {
        Position::new(self.offset)
    }
}

fn iv(begin: u64, end: u64) -> Interval {
    Interval::new(begin, end, TAG).expect("valid interval")
}

fn ranges(cache: &RangeCache<LogLine>) -> Vec<String> {
    cache.ranges().iter().map(ToString::to_string).collect()
}

fn forward_positions(cache: &RangeCache<LogLine>) -> Vec<u64> {
    let mut expected_index = 0;
    cache
        .forward(0, usize::MAX)
        .map(|m| {
            assert_eq!(m.index, expected_index, "case=forward_index");
            expected_index += 1;
            m.position().get()
        })
        .collect()
}

/// Forward and reverse agree with each other and with `count()`.
fn check_collection(cache: &RangeCache<LogLine>, expected: &[u64]) {
    assert_eq!(cache.count(), expected.len());
    assert_eq!(forward_positions(cache), expected);

    let reversed: Vec<_> = cache.reverse(usize::MAX, usize::MAX).collect();
    let mut expected_index = expected.len();
    for m in &reversed {
        expected_index -= 1;
        assert_eq!(m.index, expected_index, "case=reverse_index");
    }
    let mut back: Vec<u64> = reversed.iter().map(|m| m.position().get()).collect();
    back.reverse();
    assert_eq!(back, expected);

    for (index, &pos) in expected.iter().enumerate() {
        assert_eq!(cache.get(index).map(|m| m.position().get()), Some(pos));
    }
}

fn fill(cache: &RangeCache<LogLine>, at: &[u64], complete: bool) {
    let mut session = cache
        .next_range_to_fill()
        .expect("no session open")
        .expect("range to fill");
    for &p in at {
        session.add(LogLine::at(p), false).expect("add");
    }
    if complete {
        session.complete().expect("complete");
    }
}

fn install_test_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

#[test]
fn empty_ranges_follow_the_active_interval() {
    install_test_subscriber();
    let cache = RangeCache::<LogLine>::new();
    cache.set_active_interval(iv(10, 40)).unwrap();
    assert_eq!(ranges(&cache), ["(10-10-40,1)"]);
    cache.set_active_interval(iv(0, 30)).unwrap();
    assert_eq!(ranges(&cache), ["(0-0-30,1)"]);
    check_collection(&cache, &[]);
}

#[test]
fn normal_scenario() {
    install_test_subscriber();
    let cache = RangeCache::<LogLine>::new();

    cache.set_active_interval(iv(10, 40)).unwrap();
    fill(&cache, &[10, 20, 30, 40], true);
    assert_eq!(ranges(&cache), ["(10-40-40,1)"]);
    check_collection(&cache, &[10, 20, 30, 40]);

    cache.set_active_interval(iv(0, 30)).unwrap();
    assert_eq!(ranges(&cache), ["(0-0-10,1)", "(10-30-30,1)"]);
    check_collection(&cache, &[10, 20, 30]);

    fill(&cache, &[0, 10], true);
    assert_eq!(ranges(&cache), ["(0-30-30,1)"]);
    check_collection(&cache, &[0, 10, 10, 20, 30]);

    cache.set_active_interval(iv(20, 60)).unwrap();
    assert_eq!(ranges(&cache), ["(20-30-60,1)"]);
    check_collection(&cache, &[20, 30]);

    cache.set_active_interval(iv(0, 50)).unwrap();
    assert_eq!(ranges(&cache), ["(0-0-20,1)", "(20-30-50,1)"]);

    fill(&cache, &[0], true);
    assert_eq!(ranges(&cache), ["(0-30-50,1)"]);
    check_collection(&cache, &[0, 20, 30]);

    fill(&cache, &[50], true);
    assert_eq!(ranges(&cache), ["(0-50-50,1)"]);
    check_collection(&cache, &[0, 20, 30, 50]);
    assert!(cache.is_fully_loaded());

    cache.set_active_interval(iv(100, 150)).unwrap();
    assert_eq!(ranges(&cache), ["(100-100-150,1)"]);
    check_collection(&cache, &[]);
}

#[test]
fn add_after_complete_fails() {
    let cache = RangeCache::<LogLine>::new();
    cache.set_active_interval(iv(0, 30)).unwrap();
    let mut session = cache.next_range_to_fill().unwrap().unwrap();
    session.add(LogLine::at(0), false).unwrap();
    session.complete().unwrap();
    let err = session.add(LogLine::at(10), false).unwrap_err();
    assert!(matches!(err, CacheError::RangeComplete { .. }));
    assert!(err.is_protocol_violation());
    assert!(!err.is_retryable());
}

#[test]
fn stopped_fill_resumes_without_duplicates() {
    let cache = RangeCache::<LogLine>::new();
    cache.set_active_interval(iv(0, 30)).unwrap();
    fill(&cache, &[0, 10], false);
    assert_eq!(ranges(&cache), ["(0-10-30,1)"]);

    {
        let mut session = cache.next_range_to_fill().unwrap().unwrap();
        session.add(LogLine::at(10), false).unwrap();
        assert_eq!(session.appended(), 0);
    }
    assert_eq!(ranges(&cache), ["(0-10-30,1)"]);
    check_collection(&cache, &[0, 10]);

    fill(&cache, &[10, 15], false);
    assert_eq!(ranges(&cache), ["(0-15-30,1)"]);
    check_collection(&cache, &[0, 10, 15]);

    fill(&cache, &[10, 15, 20, 30], true);
    assert_eq!(ranges(&cache), ["(0-30-30,1)"]);
    check_collection(&cache, &[0, 10, 15, 20, 30]);

    cache.set_active_interval(iv(100, 300)).unwrap();
    fill(&cache, &[100, 110, 150, 160, 170], false);
    assert_eq!(ranges(&cache), ["(100-170-300,1)"]);

    cache.set_active_interval(iv(100, 150)).unwrap();
    assert_eq!(ranges(&cache), ["(100-150-150,1)"]);
    check_collection(&cache, &[100, 110, 150]);
    assert!(cache.is_fully_loaded(), "case=shrink_below_watermark_completes");
}

#[test]
fn open_marker_shows_in_diagnostics() {
    let cache = RangeCache::<LogLine>::new();
    cache.set_active_interval(iv(10, 40)).unwrap();
    fill(&cache, &[10, 20], true);
    cache.set_active_interval(iv(0, 40)).unwrap();
    let session = cache.next_range_to_fill().unwrap().unwrap();
    assert_eq!(session.interval(), iv(0, 10));
    assert_eq!(ranges(&cache), ["(0-0-10,1) open", "(10-40-40,1)"]);
    drop(session);
    assert_eq!(ranges(&cache), ["(0-0-10,1)", "(10-40-40,1)"]);
}

#[test]
fn shrinking_past_watermark_drops_messages() {
    let cache = RangeCache::<LogLine>::new();
    cache.set_active_interval(iv(0, 100)).unwrap();
    fill(&cache, &[0, 25, 50, 75, 100], true);
    assert_eq!(cache.count(), 5);
    cache.set_active_interval(iv(0, 60)).unwrap();
    assert_eq!(cache.count(), 3);
    assert_eq!(ranges(&cache), ["(0-60-60,1)"]);
    assert_eq!(cache.metrics().messages_dropped_total, 2);
}

#[test]
fn growing_both_sides_resumes_tail_and_fills_head() {
    let cache = RangeCache::<LogLine>::new();
    cache.set_active_interval(iv(100, 200)).unwrap();
    fill(&cache, &[100, 150, 200], true);
    cache.set_active_interval(iv(50, 300)).unwrap();
    assert_eq!(ranges(&cache), ["(50-50-100,1)", "(100-200-300,1)"]);

    fill(&cache, &[50, 100], true);
    assert_eq!(ranges(&cache), ["(50-200-300,1)"]);

    let mut session = cache.next_range_to_fill().unwrap().unwrap();
    assert_eq!(session.resume_from(), Some(Position::new(200)));
    for p in [200, 250, 300] {
        session.add(LogLine::at(p), false).unwrap();
    }
    session.complete().unwrap();
    assert_eq!(session.acknowledged(), 1);
    drop(session);

    check_collection(&cache, &[50, 100, 100, 150, 200, 250, 300]);
    assert_eq!(cache.get(0).unwrap().message.text, "line@50");
}

#[test]
fn telemetry_records_protocol_violations() {
    let ring = Arc::new(CacheEventRingBuffer::new(64));
    let cache = RangeCache::<LogLine>::new().with_observer(ring.clone());
    cache.set_active_interval(iv(0, 30)).unwrap();
    let mut session = cache.next_range_to_fill().unwrap().unwrap();
    session.add(LogLine::at(20), false).unwrap();
    let _ = session.add(LogLine::at(10), false).unwrap_err();
    drop(session);

    let violation = ring
        .drain()
        .into_iter()
        .find(|e| matches!(e, CacheTelemetryEvent::ProtocolViolation { .. }))
        .expect("violation recorded");
    let json = serde_json::to_value(&violation).unwrap();
    assert_eq!(json["ProtocolViolation"]["operation"], "add");
    assert_eq!(json["ProtocolViolation"]["kind"], "protocol_violation");
    assert_eq!(cache.metrics().protocol_violations_total, 1);
}
