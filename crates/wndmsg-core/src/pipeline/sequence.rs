//! Thread-safe sequence counter for translated events.
//!
//! Every [`TranslatedEvent`](crate::TranslatedEvent) carries a sequence number
//! assigned at translation time.  Listeners and tests use it to detect drops
//! (a gap means the queue overflowed) and reordering (a decrease would mean a
//! bug; the queue never reorders).
//!
//! The counter is owned by one pipeline instance rather than being a process
//! global, so independent pipelines in the same process (tests, multiple
//! subsystems) each start at 1.

use std::sync::atomic::{AtomicU64, Ordering};

/// A thread-safe, monotonically increasing counter starting at 1.
pub struct SequenceCounter {
    inner: AtomicU64,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self {
            inner: AtomicU64::new(1),
        }
    }

    /// Returns the next sequence number and atomically advances the counter.
    ///
    /// `Relaxed` is enough: the number orders events, it does not publish
    /// memory.  Callers that need push order to match sequence order assign
    /// the number while holding the queue lock.
    pub fn next(&self) -> u64 {
        self.inner.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the number the next call to [`next`](Self::next) will hand out.
    pub fn peek(&self) -> u64 {
        self.inner.load(Ordering::Relaxed)
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}
