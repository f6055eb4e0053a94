//! Recording sinks for tests.
//!
//! Both sinks simply append whatever they receive so that tests can assert on
//! the exact notification sequence after flushing the worker queue.

use std::sync::Mutex;

use super::{AgentEvent, AgentEventSink, DisplayChangeListener, DisplayStateChange};

/// An [`AgentEventSink`] that records every event.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AgentEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything received so far.
    pub fn events(&self) -> Vec<AgentEvent> {
        self.events.lock().expect("lock poisoned").clone()
    }

    /// Returns and forgets everything received so far.
    pub fn take(&self) -> Vec<AgentEvent> {
        std::mem::take(&mut *self.events.lock().expect("lock poisoned"))
    }

    /// Counts received events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&AgentEvent) -> bool) -> usize {
        self.events
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|e| predicate(e))
            .count()
    }
}

impl AgentEventSink for RecordingSink {
    fn on_agent_event(&self, event: AgentEvent) {
        self.events.lock().expect("lock poisoned").push(event);
    }
}

/// A [`DisplayChangeListener`] that records every change.
#[derive(Default)]
pub struct RecordingListener {
    changes: Mutex<Vec<DisplayStateChange>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn changes(&self) -> Vec<DisplayStateChange> {
        self.changes.lock().expect("lock poisoned").clone()
    }
}

impl DisplayChangeListener for RecordingListener {
    fn on_display_state_change(&self, change: DisplayStateChange) {
        self.changes.lock().expect("lock poisoned").push(change);
    }
}
