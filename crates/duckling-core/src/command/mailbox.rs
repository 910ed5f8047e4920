//! Single-slot, latest-wins mailbox

use parking_lot::Mutex;
use std::sync::Arc;

/// A single-slot mailbox shared between one producer and one consumer
///
/// `post` replaces whatever is in the slot; `take` empties it without
/// blocking. A read and a write never interleave.
#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Store a value, returning the unread one it replaced
    pub fn post(&self, value: T) -> Option<T> {
        self.slot.lock().replace(value)
    }

    /// Take the latest value, if one arrived since the last take
    pub fn take(&self) -> Option<T> {
        self.slot.lock().take()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.lock().is_none()
    }
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}
