//! Error taxonomy for the windowed message range cache.
//!
//! Every fallible operation in the workspace returns [`Result`]. Errors fall in
//! four classes (see [`ErrorKind`]):
//! - protocol violations: the caller broke the fill protocol; never retried
//! - invalid input: rejected constructor or configuration arguments
//! - resource exhaustion: an allocation failed, state is untouched
//! - collaborator and internal failures

use serde::Serialize;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = CacheError> = std::result::Result<T, E>;

/// Coarse classification of a [`CacheError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ProtocolViolation,
    InvalidInput,
    ResourceExhausted,
    Source,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// A second fill session was requested while one is still open.
    #[error("fill session already open on {range}")]
    SessionAlreadyOpen { range: String },

    /// The range list was about to be restructured while a session holds a range.
    #[error("range list is locked by the fill session on {range}")]
    SessionOpen { range: String },

    /// The range was already completed and is now immutable.
    #[error("range {range} is complete")]
    RangeComplete { range: String },

    /// A message arrived behind the range's loaded watermark.
    #[error("message at position {position} precedes loaded end {loaded_end}")]
    NonMonotonic { position: u64, loaded_end: u64 },

    /// A message position lies outside the range it is added to.
    #[error("message at position {position} lies outside [{begin}, {end}]")]
    PositionOutOfRange { position: u64, begin: u64, end: u64 },

    #[error("invalid interval: begin {begin} is after end {end}")]
    InvalidInterval { begin: u64, end: u64 },

    #[error("invalid configuration `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// Reserving room for a message failed.
    #[error("out of memory reserving room for {requested} message(s)")]
    OutOfMemory { requested: usize },

    /// The message source feeding a loader failed.
    #[error("message source failed: {0}")]
    Source(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Shorthand for [`CacheError::Internal`].
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Shorthand for [`CacheError::Source`].
    pub fn source_failure(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::SessionAlreadyOpen { .. }
            | Self::SessionOpen { .. }
            | Self::RangeComplete { .. }
            | Self::NonMonotonic { .. }
            | Self::PositionOutOfRange { .. } => ErrorKind::ProtocolViolation,
            Self::InvalidInterval { .. } | Self::InvalidConfig { .. } => ErrorKind::InvalidInput,
            Self::OutOfMemory { .. } => ErrorKind::ResourceExhausted,
            Self::Source(_) => ErrorKind::Source,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the caller broke the fill protocol. These indicate a caller bug.
    #[must_use]
    pub const fn is_protocol_violation(&self) -> bool {
        matches!(self.kind(), ErrorKind::ProtocolViolation)
    }

    /// Whether a later attempt (by the loader, never by the cache) may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ResourceExhausted | ErrorKind::Source
        )
    }
}
