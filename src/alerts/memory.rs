//! Bounded in-memory alert history

use parking_lot::Mutex;
use std::collections::VecDeque;
use super::{AlertEvent, AlertSink};

pub const DEFAULT_ALERT_HISTORY: usize = 100;

#[derive(Debug)]
pub struct MemoryAlertSink {
    events: Mutex<VecDeque<AlertEvent>>,
    capacity: usize,
}

impl MemoryAlertSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    /// Oldest first.
    pub fn events(&self) -> Vec<AlertEvent> {
        self.events.lock().iter().cloned().collect()
    }

    pub fn count_matching(&self, predicate: impl Fn(&AlertEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|event| predicate(event)).count()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Default for MemoryAlertSink {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_HISTORY)
    }
}

impl AlertSink for MemoryAlertSink {
    fn notify(&self, event: AlertEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }
}
