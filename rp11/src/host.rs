//! The things the controller needs from the simulation it is part of.
//!
//! The controller owns its registers and drives, but not the memory
//! it transfers data to, the interrupt request line it raises, or the
//! simulated clock.  Those are supplied by the host on each call,
//! bundled together in a [`Host`].
use core::time::Duration;
use std::fmt::{self, Debug, Formatter};

use base::prelude::*;

use super::context::Context;

/// The host memory bus, as seen by a DMA device.
pub trait HostMemory {
    /// Read `buf.len()` consecutive words starting at `addr`.  Returns
    /// the number of words read; a value less than `buf.len()` means
    /// the word after the last one read does not exist (NXM).
    fn read_words(&mut self, addr: BusAddress, buf: &mut [Word]) -> usize;

    /// Write consecutive words starting at `addr`.  Returns the number
    /// of words written, as for [`HostMemory::read_words`].
    fn write_words(&mut self, addr: BusAddress, buf: &[Word]) -> usize;
}

/// This device's interrupt request flag.
pub trait InterruptLine {
    fn set(&mut self);
    fn clear(&mut self);
    fn is_set(&self) -> bool;
}

/// Identifies a callback requested from a [`Scheduler`], so that it
/// can be cancelled.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CancelHandle {
    pub unit: UnitNumber,
    pub serial: u64,
}

impl Debug for CancelHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "CancelHandle({:?} #{})", self.unit, self.serial)
    }
}

/// The simulation's event scheduler.
///
/// When the requested time arrives, the host must call
/// [`Controller::service`](crate::Controller::service) for the unit.
/// A cancelled callback must never be delivered.
pub trait Scheduler {
    fn schedule(&mut self, ctx: &Context, unit: UnitNumber, delay: Duration) -> CancelHandle;
    fn cancel(&mut self, handle: CancelHandle);
}

/// The host collaborators needed by one call into the controller.
pub struct Host<'a> {
    pub memory: &'a mut dyn HostMemory,
    pub interrupt: &'a mut dyn InterruptLine,
    pub scheduler: &'a mut dyn Scheduler,
}

impl<'a> Host<'a> {
    pub fn new(
        memory: &'a mut dyn HostMemory,
        interrupt: &'a mut dyn InterruptLine,
        scheduler: &'a mut dyn Scheduler,
    ) -> Host<'a> {
        Host {
            memory,
            interrupt,
            scheduler,
        }
    }
}
