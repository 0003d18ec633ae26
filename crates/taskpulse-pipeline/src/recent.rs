//! Bounded buffer of recently accepted events for the debug endpoint.

use std::{
    collections::VecDeque,
    sync::{Mutex, PoisonError},
};

use taskpulse_core::RawEvent;

/// Default number of events kept.
pub const DEFAULT_RECENT_CAPACITY: usize = 10;

/// Ring buffer holding the last N accepted events, oldest first.
#[derive(Debug)]
pub struct RecentEvents {
    capacity: usize,
    events: Mutex<VecDeque<RawEvent>>,
}

impl RecentEvents {
    /// Creates a buffer holding at most `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self { capacity, events: Mutex::new(VecDeque::with_capacity(capacity)) }
    }

    /// Records an event, evicting the oldest one when full.
    pub fn push(&self, event: RawEvent) {
        if self.capacity == 0 {
            return;
        }

        // The buffer is diagnostic only; a poisoned lock still holds usable data.
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        while events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Returns a copy of the buffered events, oldest first.
    pub fn snapshot(&self) -> Vec<RawEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).iter().cloned().collect()
    }

    /// Returns the number of buffered events.
    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the maximum number of events kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for RecentEvents {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_CAPACITY)
    }
}
