//! Windowed message range cache for log viewers.
//!
//! ```
//! use std::sync::Arc;
//! use logwindow::{Interval, Message, PartitionTag, Position, RangeCache};
//!
//! struct Line(u64);
//! impl Message for Line {
//!     fn position(&self) -> Position {
//!         Position::new(self.0)
//!     }
//! }
//!
//! let cache = RangeCache::<Line>::new();
//! cache.set_active_interval(Interval::new(0_u64, 20_u64, PartitionTag::new(1))?)?;
//! if let Some(mut session) = cache.next_range_to_fill()? {
//!     session.add(Arc::new(Line(0)), false)?;
//!     session.add(Line(10), false)?;
//!     session.complete()?;
//! }
//! let positions: Vec<u64> = cache.forward(0, usize::MAX).map(|m| m.position().get()).collect();
//! assert_eq!(positions, [0, 10]);
//! # Ok::<(), logwindow::CacheError>(())
//! ```

pub mod loader;

pub use logwindow_cache::{
    CacheConfig, CacheEventRingBuffer, CacheMetricsSnapshot, CacheObserver, CacheTelemetryEvent,
    FillSession, NoOpCacheObserver, RangeCache, RangeSnapshot, Traversal,
};
pub use logwindow_error::{CacheError, ErrorKind, Result};
pub use logwindow_types::{IndexedMessage, Interval, Message, PartitionTag, Position};

pub use loader::{FillReport, RangeSource, ReadStatus, fill_pending};
