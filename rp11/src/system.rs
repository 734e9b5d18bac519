//! A controller together with memory, an interrupt request flag and
//! an event queue.
//!
//! This is the smallest host which can drive the controller, and is
//! what the command-line tool and the tests use.  Simulated time only
//! moves forward when the caller asks it to, either directly
//! ([`System::advance_to`]) or by delivering the next pending
//! callback ([`System::step`]).
use core::time::Duration;
use std::path::Path;

use tracing::{event, Level};

use base::prelude::*;

use super::context::Context;
use super::controller::{Access, Controller, ControllerConfig};
use super::errors::{ConfigurationError, UnmappedAddress};
use super::events::EventQueue;
use super::host::{Host, InterruptLine};
use super::memory::CoreMemory;
use super::registers::{RegisterId, RegisterSnapshot};
use super::store::BackingStore;

/// A single interrupt request flag.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InterruptRequest {
    pending: bool,
}

impl InterruptLine for InterruptRequest {
    fn set(&mut self) {
        self.pending = true;
    }

    fn clear(&mut self) {
        self.pending = false;
    }

    fn is_set(&self) -> bool {
        self.pending
    }
}

#[derive(Debug)]
pub struct System {
    controller: Controller,
    memory: CoreMemory,
    interrupt: InterruptRequest,
    events: EventQueue,
    now: Duration,
}

impl System {
    pub fn new(config: ControllerConfig, memory_words: usize) -> System {
        System {
            controller: Controller::new(config),
            memory: CoreMemory::new(memory_words),
            interrupt: InterruptRequest::default(),
            events: EventQueue::new(),
            now: Duration::ZERO,
        }
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Controller {
        &mut self.controller
    }

    pub fn memory(&self) -> &CoreMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut CoreMemory {
        &mut self.memory
    }

    /// The current simulated time.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn context(&self) -> Context {
        Context::new(self.now)
    }

    fn with_host<R>(&mut self, f: impl FnOnce(&mut Controller, &Context, &mut Host) -> R) -> R {
        let ctx = Context::new(self.now);
        let mut host = Host::new(&mut self.memory, &mut self.interrupt, &mut self.events);
        f(&mut self.controller, &ctx, &mut host)
    }

    ////////////////////////////////////////////////////////////////
    // Bus access
    ////////////////////////////////////////////////////////////////

    pub fn read(&mut self, addr: BusAddress) -> Result<Word, UnmappedAddress> {
        let ctx = self.context();
        self.controller.read(&ctx, addr)
    }

    pub fn write(
        &mut self,
        addr: BusAddress,
        value: Word,
        access: Access,
    ) -> Result<(), UnmappedAddress> {
        self.with_host(|controller, ctx, host| controller.write(ctx, host, addr, value, access))
    }

    pub fn read_register(&mut self, id: RegisterId) -> Word {
        let ctx = self.context();
        self.controller.read_register(&ctx, id)
    }

    pub fn write_register(&mut self, id: RegisterId, value: Word) {
        self.with_host(|controller, ctx, host| controller.write_register(ctx, host, id, value));
    }

    pub fn snapshot(&mut self) -> RegisterSnapshot {
        let ctx = self.context();
        self.controller.snapshot(&ctx)
    }

    ////////////////////////////////////////////////////////////////
    // Time
    ////////////////////////////////////////////////////////////////

    /// Deliver the earliest pending callback, moving the clock
    /// forward to when it is due.  Returns the unit which was
    /// serviced and the time, or `None` if nothing was pending.
    pub fn step(&mut self) -> Option<(UnitNumber, Duration)> {
        let (_, due) = self.events.peek()?;
        let (unit, due) = self.events.pop_due(due)?;
        self.now = self.now.max(due);
        event!(Level::TRACE, "delivering callback for {unit:?} at {due:?}");
        self.with_host(|controller, ctx, host| controller.service(ctx, host, unit));
        Some((unit, self.now))
    }

    /// Deliver every callback due at or before `t`, then set the
    /// clock to `t` (the clock never goes backwards).
    pub fn advance_to(&mut self, t: Duration) {
        while self.events.next_due().is_some_and(|due| due <= t) {
            self.step();
        }
        self.now = self.now.max(t);
    }

    /// Deliver callbacks until none are pending.  Returns the time
    /// at which the last one was delivered.
    pub fn run_until_idle(&mut self) -> Duration {
        while self.step().is_some() {}
        self.now
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    pub fn next_event_due(&self) -> Option<Duration> {
        self.events.next_due()
    }

    ////////////////////////////////////////////////////////////////
    // Interrupts
    ////////////////////////////////////////////////////////////////

    pub fn interrupt_pending(&self) -> bool {
        self.interrupt.is_set()
    }

    /// Acknowledge the interrupt request, if there is one, returning
    /// the vector.
    pub fn acknowledge(&mut self) -> Option<u16> {
        if !self.interrupt.is_set() {
            return None;
        }
        self.interrupt.clear();
        Some(self.controller.acknowledge())
    }

    ////////////////////////////////////////////////////////////////
    // Configuration
    ////////////////////////////////////////////////////////////////

    pub fn attach(
        &mut self,
        unit: UnitNumber,
        store: Box<dyn BackingStore>,
    ) -> Result<(), ConfigurationError> {
        self.controller.attach(unit, store)
    }

    pub fn attach_file(
        &mut self,
        unit: UnitNumber,
        path: &Path,
        read_only: bool,
    ) -> Result<(), ConfigurationError> {
        self.controller.attach_file(unit, path, read_only)
    }

    pub fn detach(&mut self, unit: UnitNumber) -> Result<Box<dyn BackingStore>, ConfigurationError> {
        self.with_host(|controller, _, host| controller.detach(host, unit))
    }

    /// A bus reset.
    pub fn reset(&mut self) {
        self.with_host(|controller, _, host| controller.reset(host));
    }
}

impl Default for System {
    fn default() -> System {
        System::new(ControllerConfig::default(), CoreMemory::MAX_WORDS)
    }
}
