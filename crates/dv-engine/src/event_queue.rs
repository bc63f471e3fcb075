//! Time-ordered queue of scheduled triggers.

use crate::clock::{HandleId, Trigger};

/// A trigger waiting for its transport time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PendingTrigger {
    pub at: f64,
    pub handle: HandleId,
    pub trigger: Trigger,
}

/// Pending triggers sorted by time, then by handle.
///
/// Due triggers are consumed via a cursor that advances forward without
/// shifting elements, so the realtime drain path is allocation-free.
/// Equal times fire in scheduling order.
#[derive(Clone, Debug, Default)]
pub struct TriggerQueue {
    events: Vec<PendingTrigger>,
    /// Next trigger index to fire.
    cursor: usize,
}

impl TriggerQueue {
    pub fn new() -> Self {
        Self { events: Vec::new(), cursor: 0 }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { events: Vec::with_capacity(capacity), cursor: 0 }
    }

    /// Insert a trigger in time order.
    pub fn push(&mut self, pending: PendingTrigger) {
        self.compact();
        let pos = self.events[self.cursor..]
            .partition_point(|e| (e.at, e.handle) <= (pending.at, pending.handle))
            + self.cursor;
        self.events.insert(pos, pending);
    }

    /// Next trigger due at or before `now`, if any.
    pub fn pop_due(&mut self, now: f64) -> Option<PendingTrigger> {
        let next = *self.events.get(self.cursor)?;
        if next.at <= now {
            self.cursor += 1;
            Some(next)
        } else {
            None
        }
    }

    /// Next trigger due strictly before `end`, if any.
    pub fn pop_before(&mut self, end: f64) -> Option<PendingTrigger> {
        match self.next_time() {
            Some(at) if at < end => self.pop_due(at),
            _ => None,
        }
    }

    /// Time of the next pending trigger.
    pub fn next_time(&self) -> Option<f64> {
        self.events.get(self.cursor).map(|e| e.at)
    }

    /// Remove a pending trigger. Returns false if it already fired or never existed.
    pub fn cancel(&mut self, handle: HandleId) -> bool {
        match self.events[self.cursor..].iter().position(|e| e.handle == handle) {
            Some(idx) => {
                self.events.remove(self.cursor + idx);
                true
            }
            None => false,
        }
    }

    /// Drop every pending trigger.
    pub fn clear(&mut self) {
        self.events.clear();
        self.cursor = 0;
    }

    /// Number of triggers still waiting.
    pub fn len(&self) -> usize {
        self.events.len() - self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate pending triggers in firing order.
    pub fn iter(&self) -> impl Iterator<Item = &PendingTrigger> {
        self.events[self.cursor..].iter()
    }

    /// Discard already-fired entries. Never grows the buffer.
    fn compact(&mut self) {
        if self.cursor > 0 {
            self.events.drain(..self.cursor);
            self.cursor = 0;
        }
    }
}
