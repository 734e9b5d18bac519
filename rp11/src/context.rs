//! This module manages the context in which the emulator is
//! performing a single operation.
//!
//! A call into the controller represents an opportunity to emulate a
//! state change: a register access by the CPU, or the completion of
//! a seek or transfer which the controller scheduled earlier.  The
//! controller needs to know the simulated time at which that happens
//! (for example, to work out which sector is passing under the
//! heads), but it never reads a clock of its own.
use core::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    pub simulated_time: Duration,
}

impl Context {
    #[must_use]
    pub fn new(simulated_time: Duration) -> Context {
        Context { simulated_time }
    }
}
