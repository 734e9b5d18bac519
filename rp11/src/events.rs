//! A simple event queue which implements [`Scheduler`].
//!
//! Each drive has at most one pending callback, so the queue is keyed
//! by unit number and prioritised by the simulated time at which the
//! callback is due.  Every scheduled callback gets a fresh serial
//! number, so that cancelling an old handle cannot remove a newer
//! callback for the same unit.
use std::collections::HashMap;
use std::time::Duration;

use tracing::{event, Level};

use base::collections::pq::KeyedReversePriorityQueue;
use base::prelude::*;

use super::context::Context;
use super::host::{CancelHandle, Scheduler};

#[derive(Debug, Default)]
pub struct EventQueue {
    items: KeyedReversePriorityQueue<UnitNumber, Duration>,
    serials: HashMap<UnitNumber, u64>,
    next_serial: u64,
}

impl EventQueue {
    pub fn new() -> EventQueue {
        EventQueue::default()
    }

    /// The unit whose callback is due first, and when.
    pub fn peek(&self) -> Option<(UnitNumber, Duration)> {
        self.items.peek().map(|(unit, due)| (*unit, *due))
    }

    /// When the next callback is due.
    pub fn next_due(&self) -> Option<Duration> {
        self.peek().map(|(_, due)| due)
    }

    /// Remove and return the earliest callback if it is due at or
    /// before `now`.
    pub fn pop_due(&mut self, now: Duration) -> Option<(UnitNumber, Duration)> {
        match self.peek() {
            Some((_, due)) if due <= now => {
                let (unit, due) = self.items.pop()?;
                self.serials.remove(&unit);
                Some((unit, due))
            }
            _ => None,
        }
    }

    /// When the callback for `unit` is due, if there is one.
    pub fn due_time(&self, unit: UnitNumber) -> Option<Duration> {
        self.items.priority_of(&unit).copied()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Scheduler for EventQueue {
    fn schedule(&mut self, ctx: &Context, unit: UnitNumber, delay: Duration) -> CancelHandle {
        let due = ctx.simulated_time + delay;
        if let Some(prev) = self.items.push(unit, due) {
            event!(
                Level::WARN,
                "{unit:?} already had a callback due at {prev:?}; replaced with one due at {due:?}"
            );
        }
        self.next_serial += 1;
        let serial = self.next_serial;
        self.serials.insert(unit, serial);
        event!(
            Level::TRACE,
            "scheduled callback #{serial} for {unit:?} at {due:?}"
        );
        CancelHandle { unit, serial }
    }

    fn cancel(&mut self, handle: CancelHandle) {
        if self.serials.get(&handle.unit) != Some(&handle.serial) {
            event!(Level::TRACE, "{handle:?} is no longer pending");
            return;
        }
        self.serials.remove(&handle.unit);
        if let Ok(due) = self.items.remove(&handle.unit) {
            event!(Level::TRACE, "cancelled {handle:?} (was due at {due:?})");
        }
    }
}
