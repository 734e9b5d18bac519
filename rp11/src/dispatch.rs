//! Starting an operation.
//!
//! When the program sets GO, the function is checked against the
//! state of the registers and of the selected drive.  Anything wrong
//! completes the operation at once, with error bits set.  Otherwise
//! the heads are moved to the target cylinder and a callback is
//! scheduled for when the seek (and, for a transfer, the rotational
//! delay) is over.
use tracing::{event, span, Level};

use base::prelude::*;

use super::context::Context;
use super::controller::Controller;
use super::drive::{Cylinder, Head, SECTORS_PER_TRACK};
use super::errors::ErrorBits;
use super::host::Host;
use super::registers::{ControlStatus, Function, RegisterFile};
use super::timing::{delay_between, OperationKind};

/// Where an operation will take place, once it has been validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Target {
    pub(crate) cylinder: Cylinder,
    pub(crate) head: Head,
}

/// Checks of the header and mode bits.  These are made both when the
/// operation starts and again when the transfer happens, since the
/// program may change RPCS and RPWC in between.
///
/// Header operations need 18-bit mode, and move whole 3-word header
/// records; a header read moves exactly one.  Regular transfers need
/// normal mode.  Odd word counts are accepted for regular transfers
/// even though the handbook forbids them, since DOS/BATCH uses them.
pub(crate) fn header_errors(cs: ControlStatus, function: Function, words: usize) -> ErrorBits {
    let read = function.is_read();
    let write = function.is_write();
    if cs.has(ControlStatus::HEADER) {
        if !cs.has(ControlStatus::MODE) {
            ErrorBits::MODE
        } else if !(read || write) || (read && words != 3) || (write && words % 3 != 0) {
            ErrorBits::PROGRAMMING
        } else {
            ErrorBits::NONE
        }
    } else if (read || write) && cs.has(ControlStatus::MODE) {
        ErrorBits::MODE
    } else {
        ErrorBits::NONE
    }
}

impl Controller {
    /// Start the function in RPCS.
    pub(crate) fn go(&mut self, ctx: &Context, host: &mut Host) {
        let function = self.regs.cs.function();
        if function == Function::Reset {
            self.reset_function(host);
            return;
        }
        let unit = self.regs.cs.unit();
        let span = span!(Level::DEBUG, "go", function = %function, unit = %unit);
        let _enter = span.enter();

        self.clear_done(host);
        self.regs.er = ErrorBits::NONE;
        self.regs
            .cs
            .clear(ControlStatus::ERR | ControlStatus::HARD_ERR);

        if !self.drive(unit).is_attached() {
            event!(Level::DEBUG, "drive is not attached");
            self.set_done(host, ErrorBits::PROGRAMMING);
            return;
        }

        match self.validate(unit, function) {
            Err(errors) => {
                event!(Level::DEBUG, "rejected: {errors}");
                self.set_done(host, errors);
            }
            Ok(target) => self.start(ctx, host, unit, function, target),
        }
    }

    /// Check that `function` can be performed by `unit`.
    fn validate(&self, unit: UnitNumber, function: Function) -> Result<Target, ErrorBits> {
        let drive = self.drive(unit);
        let regs: &RegisterFile = &self.regs;
        let mut errors = ErrorBits::NONE;

        if function.is_write() && drive.write_locked {
            errors |= ErrorBits::WRITE_PROTECT_VIOLATION;
        }
        if drive.is_busy() {
            errors |= ErrorBits::PROGRAMMING;
        }
        errors |= header_errors(regs.cs, function, regs.words_remaining());
        if regs.da.sector() >= SECTORS_PER_TRACK {
            errors |= ErrorBits::NON_EXISTENT_SECTOR;
        }

        let target = if function == Function::Home {
            Some(Target {
                cylinder: Cylinder::ZERO,
                head: Head::ZERO,
            })
        } else if function.is_no_seek() {
            Some(Target {
                cylinder: drive.cylinder,
                head: drive.head,
            })
        } else {
            let head = Head::validate(regs.da.track());
            let cylinder = Cylinder::validate(regs.ca, drive.drive_type);
            if head.is_none() {
                errors |= ErrorBits::NON_EXISTENT_TRACK;
            }
            if cylinder.is_none() {
                errors |= ErrorBits::NON_EXISTENT_CYLINDER;
            }
            head.zip(cylinder)
                .map(|(head, cylinder)| Target { cylinder, head })
        };

        if function.is_write()
            && !errors.intersects(
                ErrorBits::WRITE_PROTECT_VIOLATION
                    | ErrorBits::NON_EXISTENT_CYLINDER
                    | ErrorBits::NON_EXISTENT_TRACK
                    | ErrorBits::NON_EXISTENT_SECTOR,
            )
        {
            if let Some(t) = target {
                if self.lockout.forbids(unit, t.cylinder) {
                    event!(Level::DEBUG, "cylinder {} is locked out", t.cylinder);
                    errors |= ErrorBits::WRITE_PROTECT_VIOLATION;
                }
            }
        }

        match target {
            Some(t) if errors.is_empty() => Ok(t),
            _ => Err(errors),
        }
    }

    /// Move the heads and schedule completion of a validated
    /// operation.
    fn start(
        &mut self,
        ctx: &Context,
        host: &mut Host,
        unit: UnitNumber,
        function: Function,
        target: Target,
    ) {
        let kind = match function {
            Function::Home => OperationKind::Home,
            Function::Seek => OperationKind::Seek,
            _ => OperationKind::Transfer,
        };
        let drive = self.drive(unit);
        let delay = delay_between(kind, drive.cylinder, target.cylinder, drive.drive_type);
        event!(
            Level::DEBUG,
            "{function} from cylinder {} to cylinder {} head {} sector {}; due in {delay:?}",
            drive.cylinder,
            target.cylinder,
            target.head,
            self.regs.da.sector()
        );
        let handle = host.scheduler.schedule(ctx, unit, delay);
        let drive = self.drive_mut(unit);
        drive.seeking = function.is_positioning();
        drive.pending = Some(handle);
        drive.cylinder = target.cylinder;
        drive.head = target.head;
        drive.function = Some(function);
    }

    /// The RESET function clears the controller's registers.  It
    /// works even while an operation is in progress; that operation
    /// is abandoned.
    pub(crate) fn reset_function(&mut self, host: &mut Host) {
        event!(Level::DEBUG, "RESET function");
        for unit in UnitNumber::all() {
            let drive = self.drive_mut(unit);
            if let Some(handle) = drive.pending.take() {
                host.scheduler.cancel(handle);
                event!(Level::DEBUG, "{unit:?}: operation abandoned by RESET");
                if drive.seeking {
                    // We cannot know where the heads stopped.
                    drive.home();
                }
                drive.seeking = false;
                drive.function = None;
            }
        }
        self.regs = RegisterFile::idle();
        self.regs.suca = self.drive(UnitNumber::ZERO).cylinder.value();
        self.lower_interrupt(host, "RESET function");
    }
}
