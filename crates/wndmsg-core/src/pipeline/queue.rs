//! Bounded FIFO between the message-pump thread and the consumer thread.
//!
//! # Overflow policy
//!
//! The queue holds at most `capacity` events.  Pushing into a full queue
//! evicts the oldest event and increments the drop counter, so a message storm
//! costs the consumer old events rather than blocking the pump.  Survivors of
//! an overflow are always the most recent events, and their sequence numbers
//! stay contiguous.
//!
//! # Locking
//!
//! A `parking_lot::Mutex` guards the deque.  Critical sections are a
//! `push_back`/`pop_front` pair or a drain, so contention is brief.  Storage
//! is preallocated to `capacity`; the pump thread never grows it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::warn;

use crate::domain::event::TranslatedEvent;

/// Result of a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued { sequence: u64 },
    /// The queue was full; the oldest event (`dropped`) was evicted.
    DroppedOldest { sequence: u64, dropped: u64 },
}

impl PushOutcome {
    /// Sequence number of the event that was pushed.
    pub fn sequence(&self) -> u64 {
        match self {
            Self::Queued { sequence } | Self::DroppedOldest { sequence, .. } => *sequence,
        }
    }

    pub fn overflowed(&self) -> bool {
        matches!(self, Self::DroppedOldest { .. })
    }
}

struct QueueState {
    events: VecDeque<TranslatedEvent>,
    /// Set after the first overflow since the last drain so the warning is
    /// logged once per cycle rather than once per event.
    overflow_reported: bool,
}

/// Thread-safe bounded event queue with drop-oldest overflow.
pub struct EventQueue {
    state: Mutex<QueueState>,
    capacity: usize,
    dropped: AtomicU64,
}

impl EventQueue {
    /// Creates a queue holding at most `capacity` events (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                events: VecDeque::with_capacity(capacity),
                overflow_reported: false,
            }),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    /// Appends `event`, evicting the oldest event if the queue is full.
    pub fn push(&self, event: TranslatedEvent) -> PushOutcome {
        self.push_with(|| event)
    }

    /// Builds the event while holding the queue lock, then appends it.
    ///
    /// Used by the capture path so that the sequence number assigned inside
    /// `build` is ordered consistently with the push, even when several pump
    /// threads feed the same queue.
    pub fn push_with<F>(&self, build: F) -> PushOutcome
    where
        F: FnOnce() -> TranslatedEvent,
    {
        let (outcome, first_overflow) = {
            let mut state = self.state.lock();
            let event = build();
            let sequence = event.sequence;

            let evicted = if state.events.len() >= self.capacity {
                state.events.pop_front().map(|old| old.sequence)
            } else {
                None
            };
            state.events.push_back(event);

            match evicted {
                Some(dropped) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    let first = !state.overflow_reported;
                    state.overflow_reported = true;
                    (PushOutcome::DroppedOldest { sequence, dropped }, first)
                }
                None => (PushOutcome::Queued { sequence }, false),
            }
        };

        if first_overflow {
            warn!(
                capacity = self.capacity,
                "event queue overflow: dropping oldest events until the next drain"
            );
        }
        outcome
    }

    /// Removes and returns every queued event in push order.
    pub fn drain_all(&self) -> Vec<TranslatedEvent> {
        let mut state = self.state.lock();
        state.overflow_reported = false;
        state.events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total events evicted by overflow since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::EventPayload;
    use crate::domain::message::{Category, WindowHandle};
    use std::sync::Arc;
    use std::thread;

    fn event(sequence: u64) -> TranslatedEvent {
        TranslatedEvent {
            category: Category::new(Category::CLOSE_REQUEST),
            payload: EventPayload::CloseRequest,
            window: WindowHandle(1),
            timestamp_ms: sequence * 10,
            sequence,
        }
    }

    fn sequences(events: &[TranslatedEvent]) -> Vec<u64> {
        events.iter().map(|e| e.sequence).collect()
    }

    #[test]
    fn test_drain_returns_events_in_push_order() {
        // Arrange
        let queue = EventQueue::new(8);
        for seq in 1..=5 {
            queue.push(event(seq));
        }

        // Act
        let drained = queue.drain_all();

        // Assert
        assert_eq!(sequences(&drained), vec![1, 2, 3, 4, 5]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_on_empty_queue_returns_nothing() {
        let queue = EventQueue::new(4);
        assert!(queue.drain_all().is_empty());
        assert_eq!(queue.dropped(), 0);
    }

    #[test]
    fn test_overflow_drops_oldest_and_counts() {
        // Arrange
        let queue = EventQueue::new(2);

        // Act
        let outcomes: Vec<_> = (1..=3).map(|seq| queue.push(event(seq))).collect();

        // Assert
        assert_eq!(outcomes[0], PushOutcome::Queued { sequence: 1 });
        assert_eq!(outcomes[2], PushOutcome::DroppedOldest { sequence: 3, dropped: 1 });
        assert_eq!(sequences(&queue.drain_all()), vec![2, 3]);
        assert_eq!(queue.dropped(), 1);
    }

    #[test]
    fn test_overflow_drop_count_is_pushed_minus_capacity() {
        // Arrange
        let capacity = 16;
        let pushed = 100u64;
        let queue = EventQueue::new(capacity);

        // Act
        for seq in 1..=pushed {
            queue.push(event(seq));
        }
        let drained = queue.drain_all();

        // Assert – survivors are the newest `capacity` events, contiguous
        assert_eq!(queue.dropped(), pushed - capacity as u64);
        let expected: Vec<u64> = (pushed - capacity as u64 + 1..=pushed).collect();
        assert_eq!(sequences(&drained), expected);
    }

    #[test]
    fn test_zero_capacity_is_clamped_to_one() {
        let queue = EventQueue::new(0);
        assert_eq!(queue.capacity(), 1);
        queue.push(event(1));
        queue.push(event(2));
        assert_eq!(sequences(&queue.drain_all()), vec![2]);
    }

    #[test]
    fn test_push_with_builds_under_lock() {
        // Arrange
        let queue = EventQueue::new(4);

        // Act
        let outcome = queue.push_with(|| event(42));

        // Assert
        assert_eq!(outcome.sequence(), 42);
        assert!(!outcome.overflowed());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_concurrent_push_and_drain_never_reorders() {
        // Arrange – one producer pushes 10_000 ordered events while the
        // consumer drains repeatedly; capacity is large enough for no drops.
        let total = 10_000u64;
        let queue = Arc::new(EventQueue::new(total as usize));
        let producer_queue = Arc::clone(&queue);

        // Act
        let producer = thread::spawn(move || {
            for seq in 1..=total {
                producer_queue.push(event(seq));
            }
        });

        let mut received = Vec::with_capacity(total as usize);
        while received.len() < total as usize {
            received.extend(sequences(&queue.drain_all()));
            thread::yield_now();
        }
        producer.join().expect("producer panicked");

        // Assert – the concatenation of all drains is exactly push order
        let expected: Vec<u64> = (1..=total).collect();
        assert_eq!(received, expected);
    }

    #[test]
    fn test_concurrent_push_with_small_capacity_keeps_increasing_order() {
        // Arrange – overflow is allowed here; order must still hold
        let queue = Arc::new(EventQueue::new(8));
        let producer_queue = Arc::clone(&queue);
        let total = 5_000u64;

        // Act
        let producer = thread::spawn(move || {
            for seq in 1..=total {
                producer_queue.push(event(seq));
            }
        });
        let mut received = Vec::new();
        loop {
            let finished = producer.is_finished();
            received.extend(sequences(&queue.drain_all()));
            if finished {
                break;
            }
            thread::yield_now();
        }
        producer.join().expect("producer panicked");
        received.extend(sequences(&queue.drain_all()));

        // Assert
        for pair in received.windows(2) {
            assert!(pair[1] > pair[0], "reordered: {} after {}", pair[1], pair[0]);
        }
        assert_eq!(received.len() as u64 + queue.dropped(), total);
    }
}
