//! Windowed range cache for log viewers.
//!
//! Presents a randomly scrollable, indexable sequence of parsed messages over
//! a source too large to hold in memory. The caller names the position window
//! it wants materialised ([`RangeCache::set_active_interval`]); the cache
//! keeps whatever it already loaded inside that window and hands out the
//! missing pieces one [`FillSession`] at a time. Readers see the
//! concatenation of all loaded ranges through [`RangeCache::forward`],
//! [`RangeCache::reverse`] and [`RangeCache::get`] while loading continues.

pub mod cache;
pub mod config;
mod loaded_range;
mod reconcile;
pub mod session;
pub mod telemetry;
pub mod traverse;

pub use cache::{RangeCache, RangeSnapshot};
pub use config::CacheConfig;
pub use session::FillSession;
pub use telemetry::{
    CacheEventRingBuffer, CacheMetrics, CacheMetricsSnapshot, CacheObserver, CacheTelemetryEvent,
    NoOpCacheObserver,
};
pub use traverse::Traversal;
