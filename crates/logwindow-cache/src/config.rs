//! Cache configuration.
//!
//! Deserialisable with serde so an embedding application can keep it next to
//! its own settings (TOML, JSON); every field has a default.

use logwindow_error::{CacheError, Result};
use serde::{Deserialize, Serialize};

/// Default label attached to log events and telemetry.
pub const DEFAULT_CACHE_NAME: &str = "messages";
/// Default number of messages a traversal copies out per lock hold.
pub const DEFAULT_TRAVERSAL_BATCH: usize = 64;
/// Default capacity of [`crate::CacheEventRingBuffer::from_config`].
pub const DEFAULT_EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Label carried by every log event of this cache instance.
    pub name: String,
    /// Messages copied out of the range list per lock acquisition while a
    /// traversal streams.
    pub traversal_batch: usize,
    /// Capacity of the diagnostic event ring buffer.
    pub event_buffer: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_CACHE_NAME.to_owned(),
            traversal_batch: DEFAULT_TRAVERSAL_BATCH,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_traversal_batch(mut self, batch: usize) -> Self {
        self.traversal_batch = batch;
        self
    }

    #[must_use]
    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.traversal_batch == 0 {
            return Err(CacheError::InvalidConfig {
                field: "traversal_batch",
                reason: "must be > 0".to_owned(),
            });
        }
        if self.event_buffer == 0 {
            return Err(CacheError::InvalidConfig {
                field: "event_buffer",
                reason: "must be > 0".to_owned(),
            });
        }
        if self.name.trim().is_empty() {
            return Err(CacheError::InvalidConfig {
                field: "name",
                reason: "must not be blank".to_owned(),
            });
        }
        Ok(())
    }
}
