//! The message contract between log-format parsers and the range cache.

use std::sync::Arc;

use crate::Position;

/// A parsed log message as seen by the range cache.
///
/// The cache stores and orders messages by [`Message::position`] and never
/// constructs or interprets anything else about them.
pub trait Message: Send + Sync + 'static {
    /// Position of the message in the underlying source.
    fn position(&self) -> Position;
}

impl<M: Message + ?Sized> Message for Arc<M> {
    fn position(&self) -> Position {
        (**self).position()
    }
}

impl<M: Message + ?Sized> Message for Box<M> {
    fn position(&self) -> Position {
        (**self).position()
    }
}

/// A message together with its logical index in the cache's concatenated view.
///
/// Indices are only meaningful against the state the traversal resolved them
/// in; they carry no identity across range list mutations.
#[derive(Debug)]
pub struct IndexedMessage<M> {
    pub index: usize,
    pub message: Arc<M>,
}

impl<M> Clone for IndexedMessage<M> {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            message: Arc::clone(&self.message),
        }
    }
}

impl<M: Message> IndexedMessage<M> {
    #[inline]
    #[must_use]
    pub fn position(&self) -> Position {
        self.message.position()
    }
}
