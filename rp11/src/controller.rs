//! The RP11-C controller: bus interface, configuration and the
//! interrupt model.
//!
//! Starting operations is handled in the `dispatch` module and
//! completing them in the `transfer` module; both add methods to
//! [`Controller`].
use std::fmt::{self, Debug, Formatter, Write as _};
use std::path::Path;

use tracing::{event, Level};

use base::prelude::*;

use super::context::Context;
use super::drive::{
    Cylinder, DriveType, DriveUnit, Head, MAX_TRANSFER_WORDS, SECTORS_PER_TRACK,
    SURFACES_PER_CYLINDER,
};
use super::errors::{ConfigurationError, ErrorBits, UnmappedAddress};
use super::host::Host;
use super::protect::WriteLockout;
use super::registers::{
    ControlStatus, DiskAddress, DriveStatus, Function, RegisterFile, RegisterId,
    RegisterSnapshot, BUS_ADDRESS_BITS, CYLINDER_BITS,
};
use super::store::{BackingStore, FileStore};
use super::timing::sector_under_heads;

pub const DEVICE_DESCRIPTION: &str = "RP11C/RP02/RP03 disk pack device";

/// Where the controller sits on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    pub base_address: BusAddress,
    pub vector: u16,
}

impl Default for ControllerConfig {
    fn default() -> ControllerConfig {
        ControllerConfig {
            base_address: bus_addr!(0o776_710),
            vector: 0o254,
        }
    }
}

/// The width of a bus write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Word,
    /// A byte write (DATOB).  The byte is in the low 8 bits of the
    /// value, and goes to the half of the register selected by the
    /// low-order address bit.
    Byte,
}

pub struct Controller {
    config: ControllerConfig,
    pub(crate) regs: RegisterFile,
    pub(crate) units: [DriveUnit; UnitNumber::COUNT],
    pub(crate) lockout: WriteLockout,
    /// Holds the data of a transfer while it moves between the pack
    /// and memory.
    pub(crate) buffer: Vec<Word>,
}

impl Controller {
    pub fn new(config: ControllerConfig) -> Controller {
        Controller {
            config,
            regs: RegisterFile::idle(),
            units: std::array::from_fn(|_| DriveUnit::new()),
            lockout: WriteLockout::OFF,
            buffer: vec![0; MAX_TRANSFER_WORDS],
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Convert a unit number given by a user into a [`UnitNumber`].
    pub fn unit(n: usize) -> Result<UnitNumber, ConfigurationError> {
        UnitNumber::try_from(n).map_err(|_| ConfigurationError::NoSuchUnit(n))
    }

    pub(crate) fn drive(&self, unit: UnitNumber) -> &DriveUnit {
        &self.units[usize::from(unit)]
    }

    pub(crate) fn drive_mut(&mut self, unit: UnitNumber) -> &mut DriveUnit {
        &mut self.units[usize::from(unit)]
    }

    /// Identify the register at bus address `addr`.
    pub fn decode(&self, addr: BusAddress) -> Result<RegisterId, UnmappedAddress> {
        let base = u32::from(self.config.base_address);
        u32::from(addr)
            .checked_sub(base)
            .filter(|offset| *offset < RegisterId::WINDOW_BYTES)
            .and_then(|offset| RegisterId::from_index((offset >> 1) as usize))
            .ok_or(UnmappedAddress(addr))
    }

    /// True while an operation is in progress.
    pub fn is_busy(&self) -> bool {
        !self.regs.cs.has(ControlStatus::DONE)
    }

    ////////////////////////////////////////////////////////////////
    // Register reads
    ////////////////////////////////////////////////////////////////

    pub fn read(&mut self, ctx: &Context, addr: BusAddress) -> Result<Word, UnmappedAddress> {
        let id = self.decode(addr)?;
        Ok(self.read_register(ctx, id))
    }

    /// The live drive status bits of the selected drive.
    fn drive_status(&self) -> DriveStatus {
        let drive = self.drive(self.regs.cs.unit());
        let mut bits = self.regs.attention();
        if drive.drive_type == DriveType::Rp03 {
            bits |= DriveStatus::RP03;
        }
        if drive.is_attached() {
            bits |= DriveStatus::ONLINE;
            if drive.write_locked {
                bits |= DriveStatus::WRITE_LOCKED;
            }
            if drive.seeking {
                bits |= DriveStatus::SEEKING;
            } else if drive.pending.is_none() {
                bits |= DriveStatus::READY;
            }
        }
        DriveStatus::from_bits(bits)
    }

    /// Recompute the parts of RPER and RPCS which are derived from
    /// other state.
    fn refresh_status(&mut self) -> DriveStatus {
        let ds = self.drive_status();
        self.regs.er = self.regs.er.only(ErrorBits::STORED) | ds.drive_error();
        self.regs.cs = ControlStatus::from_bits(self.regs.cs.bits() & ControlStatus::STORED);
        self.regs.fold_error_summary();
        ds
    }

    pub fn read_register(&mut self, ctx: &Context, id: RegisterId) -> Word {
        let value = match id {
            RegisterId::Rpds | RegisterId::Rper | RegisterId::Rpcs => {
                let ds = self.refresh_status();
                match id {
                    RegisterId::Rpds => ds.bits(),
                    RegisterId::Rper => self.regs.er.bits(),
                    _ => self.regs.cs.bits(),
                }
            }
            RegisterId::Rpwc => self.regs.wc,
            RegisterId::Rpba => self.regs.ba,
            RegisterId::Rpca => self.regs.ca,
            RegisterId::Rpda => self
                .regs
                .da
                .with_sector_on_track(sector_under_heads(ctx.simulated_time))
                .bits(),
            RegisterId::Suca => self.regs.suca,
            RegisterId::Rpm1 | RegisterId::Rpm2 | RegisterId::Rpm3 | RegisterId::Silo => 0,
        };
        event!(Level::TRACE, "read {id}={value:06o}");
        value
    }

    /// The registers as a program would see them now.
    pub fn snapshot(&mut self, ctx: &Context) -> RegisterSnapshot {
        RegisterSnapshot {
            rpds: self.read_register(ctx, RegisterId::Rpds),
            rper: self.read_register(ctx, RegisterId::Rper),
            rpcs: self.read_register(ctx, RegisterId::Rpcs),
            rpwc: self.read_register(ctx, RegisterId::Rpwc),
            rpba: self.read_register(ctx, RegisterId::Rpba),
            rpca: self.read_register(ctx, RegisterId::Rpca),
            rpda: self.read_register(ctx, RegisterId::Rpda),
            suca: self.read_register(ctx, RegisterId::Suca),
        }
    }

    ////////////////////////////////////////////////////////////////
    // Register writes
    ////////////////////////////////////////////////////////////////

    pub fn write(
        &mut self,
        ctx: &Context,
        host: &mut Host,
        addr: BusAddress,
        value: Word,
        access: Access,
    ) -> Result<(), UnmappedAddress> {
        let id = self.decode(addr)?;
        let lane = match access {
            Access::Word => None,
            Access::Byte => Some(ByteLane::of(addr)),
        };
        self.store(ctx, host, id, value, lane);
        Ok(())
    }

    /// Write a whole word to a register.
    pub fn write_register(&mut self, ctx: &Context, host: &mut Host, id: RegisterId, value: Word) {
        self.store(ctx, host, id, value, None);
    }

    fn store(
        &mut self,
        ctx: &Context,
        host: &mut Host,
        id: RegisterId,
        value: Word,
        lane: Option<ByteLane>,
    ) {
        let merged = |old: Word| match lane {
            None => value,
            Some(lane) => merge_byte(old, lane, low_byte(value)),
        };
        match id {
            RegisterId::Rpds => {
                if lane == Some(ByteLane::High) {
                    // Only the attention bits are writable.
                    return;
                }
                self.clear_attention(host, value & DriveStatus::ATTENTION);
            }
            RegisterId::Rper | RegisterId::Suca => {
                event!(Level::TRACE, "ignoring write to read-only register {id}");
                return;
            }
            RegisterId::Rpcs => {
                let data = merged(self.regs.cs.bits());
                self.write_control_status(ctx, host, data);
            }
            RegisterId::Rpwc => {
                self.regs.wc = merged(self.regs.wc);
            }
            RegisterId::Rpba => {
                self.regs.ba = merged(self.regs.ba) & BUS_ADDRESS_BITS;
            }
            RegisterId::Rpca => {
                self.regs.ca = merged(self.regs.ca) & CYLINDER_BITS;
            }
            RegisterId::Rpda => {
                self.regs.da = DiskAddress::from_bits(merged(self.regs.da.bits()) & DiskAddress::WRITABLE);
            }
            RegisterId::Rpm1 | RegisterId::Rpm2 | RegisterId::Rpm3 | RegisterId::Silo => {
                event!(Level::TRACE, "ignoring write to unimplemented register {id}");
                return;
            }
        }
        event!(Level::TRACE, "write {id}={value:06o} (lane {lane:?})");
    }

    fn clear_attention(&mut self, host: &mut Host, mask: u16) {
        self.regs.ds &= !mask;
        let cs = self.regs.cs;
        if self.regs.attention() == 0
            && cs.has(ControlStatus::ATTENTION_INTERRUPT_ENABLE)
            && (!cs.has(ControlStatus::INTERRUPT_ENABLE) || !cs.has(ControlStatus::DONE))
        {
            self.lower_interrupt(host, "attention cleared");
        }
    }

    fn write_control_status(&mut self, ctx: &Context, host: &mut Host, data: Word) {
        let old = self.regs.cs;
        let attention = self.regs.attention() != 0;
        if data & (ControlStatus::ATTENTION_INTERRUPT_ENABLE | ControlStatus::INTERRUPT_ENABLE) == 0
        {
            self.lower_interrupt(host, "interrupts disabled");
        } else if (data & ControlStatus::INTERRUPT_ENABLE != 0
            && old.bits() & (ControlStatus::DONE | ControlStatus::INTERRUPT_ENABLE)
                == ControlStatus::DONE)
            || (data & ControlStatus::ATTENTION_INTERRUPT_ENABLE != 0
                && !old.has(ControlStatus::ATTENTION_INTERRUPT_ENABLE)
                && attention)
        {
            self.raise_interrupt(host, "interrupt enabled while condition pending");
        }

        let mut cs = old;
        cs.clear(ControlStatus::WRITABLE);
        cs.set(data & ControlStatus::WRITABLE);
        self.regs.cs = cs;

        let unit = cs.unit();
        let deselected = unit != old.unit();
        if deselected {
            self.regs.suca = self.drive(unit).cylinder.value();
        }
        let go = data & ControlStatus::GO != 0;
        if go && cs.function() == Function::Reset {
            self.reset_function(host);
        } else if !old.has(ControlStatus::DONE) {
            if go || deselected {
                event!(
                    Level::DEBUG,
                    "{} while busy; programming error",
                    if go { "GO" } else { "drive change" }
                );
                self.regs.er |= ErrorBits::PROGRAMMING;
            }
        } else if go {
            self.go(ctx, host);
        }
    }

    ////////////////////////////////////////////////////////////////
    // Interrupts
    ////////////////////////////////////////////////////////////////

    pub(crate) fn raise_interrupt(&self, host: &mut Host, why: &str) {
        event!(Level::TRACE, "interrupt: set ({why})");
        host.interrupt.set();
    }

    pub(crate) fn lower_interrupt(&self, host: &mut Host, why: &str) {
        event!(Level::TRACE, "interrupt: clear ({why})");
        host.interrupt.clear();
    }

    /// Start of an operation: DONE goes off.
    pub(crate) fn clear_done(&mut self, host: &mut Host) {
        self.regs.cs.clear(ControlStatus::DONE);
        let cs = self.regs.cs;
        if cs.has(ControlStatus::INTERRUPT_ENABLE)
            && (!cs.has(ControlStatus::ATTENTION_INTERRUPT_ENABLE) || self.regs.attention() == 0)
        {
            self.lower_interrupt(host, "done cleared");
        }
    }

    /// End of an operation: record `errors` and set DONE.
    pub(crate) fn set_done(&mut self, host: &mut Host, errors: ErrorBits) {
        self.regs.er |= errors;
        self.regs.fold_error_summary();
        self.regs.cs.set(ControlStatus::DONE);
        event!(Level::DEBUG, "done; errors: {}", self.regs.er);
        if self.regs.cs.has(ControlStatus::INTERRUPT_ENABLE) {
            self.raise_interrupt(host, "done");
        }
    }

    /// Set the attention bit of `unit`, interrupting if that is
    /// enabled.
    pub(crate) fn raise_attention(&mut self, host: &mut Host, unit: UnitNumber) {
        self.regs.raise_attention(unit);
        if self.regs.cs.has(ControlStatus::ATTENTION_INTERRUPT_ENABLE) {
            self.raise_interrupt(host, "attention");
        }
    }

    /// Interrupt acknowledge.  Returns the interrupt vector.  The
    /// attention interrupt enable is one-shot, so this turns it off.
    /// The host is expected to drop its interrupt request as part of
    /// the acknowledge.
    pub fn acknowledge(&mut self) -> u16 {
        event!(Level::TRACE, "interrupt: acknowledged");
        self.regs.cs.clear(ControlStatus::ATTENTION_INTERRUPT_ENABLE);
        self.config.vector
    }

    ////////////////////////////////////////////////////////////////
    // Resets
    ////////////////////////////////////////////////////////////////

    /// A bus (device) reset: clears the registers, stops every drive
    /// and puts all heads back on cylinder 0.
    pub fn reset(&mut self, host: &mut Host) {
        event!(Level::INFO, "device reset");
        self.regs = RegisterFile::idle();
        self.lower_interrupt(host, "device reset");
        for drive in self.units.iter_mut() {
            if let Some(handle) = drive.pending.take() {
                host.scheduler.cancel(handle);
            }
            drive.home();
        }
    }

    ////////////////////////////////////////////////////////////////
    // Configuration
    ////////////////////////////////////////////////////////////////

    pub fn drive_type(&self, unit: UnitNumber) -> DriveType {
        self.drive(unit).drive_type
    }

    pub fn set_drive_type(
        &mut self,
        unit: UnitNumber,
        drive_type: DriveType,
    ) -> Result<(), ConfigurationError> {
        let drive = self.drive_mut(unit);
        if drive.is_attached() {
            return Err(ConfigurationError::AlreadyAttached(unit));
        }
        drive.drive_type = drive_type;
        Ok(())
    }

    pub fn autosize(&self, unit: UnitNumber) -> bool {
        self.drive(unit).autosize
    }

    pub fn set_autosize(&mut self, unit: UnitNumber, autosize: bool) {
        self.drive_mut(unit).autosize = autosize;
    }

    pub fn is_write_locked(&self, unit: UnitNumber) -> bool {
        self.drive(unit).write_locked
    }

    /// Lock or enable writes on a drive.  A drive whose image is
    /// read-only cannot be write-enabled.
    pub fn set_write_locked(
        &mut self,
        unit: UnitNumber,
        locked: bool,
    ) -> Result<(), ConfigurationError> {
        let drive = self.drive_mut(unit);
        if !locked && drive.store.as_ref().is_some_and(|s| s.is_read_only()) {
            return Err(ConfigurationError::ReadOnlyImage(unit));
        }
        drive.write_locked = locked;
        Ok(())
    }

    pub fn protect(&self) -> WriteLockout {
        self.lockout
    }

    pub fn set_lockout(&mut self, lockout: WriteLockout) {
        self.lockout = lockout;
    }

    /// Change the write lockout from a setting such as `ON;0407` or
    /// `OFF`.  On error the lockout is unchanged.
    pub fn set_protect(&mut self, setting: &str) -> Result<(), ConfigurationError> {
        self.lockout.apply(setting)?;
        event!(Level::INFO, "write lockout is now {}", self.lockout);
        Ok(())
    }

    pub fn is_attached(&self, unit: UnitNumber) -> bool {
        self.drive(unit).is_attached()
    }

    /// The name of the image attached to `unit`.
    pub fn image_name(&self, unit: UnitNumber) -> Option<&str> {
        self.drive(unit).store.as_ref().map(|s| s.name())
    }

    pub fn cylinder(&self, unit: UnitNumber) -> Cylinder {
        self.drive(unit).cylinder
    }

    pub fn head(&self, unit: UnitNumber) -> Head {
        self.drive(unit).head
    }

    pub fn is_seeking(&self, unit: UnitNumber) -> bool {
        self.drive(unit).seeking
    }

    /// Connect a pack to a drive.
    pub fn attach(
        &mut self,
        unit: UnitNumber,
        store: Box<dyn BackingStore>,
    ) -> Result<(), ConfigurationError> {
        let drive = self.drive_mut(unit);
        if drive.is_attached() {
            return Err(ConfigurationError::AlreadyAttached(unit));
        }
        if drive.autosize {
            if let Some(found) = store.len_sectors().and_then(DriveType::from_blocks) {
                if found != drive.drive_type {
                    event!(
                        Level::INFO,
                        "{unit:?}: image size matches {found}, changing drive type from {}",
                        drive.drive_type
                    );
                }
                drive.drive_type = found;
            }
        }
        if store.is_read_only() {
            drive.write_locked = true;
        }
        event!(
            Level::INFO,
            "{unit:?}: attached {} as {}{}",
            store.name(),
            drive.drive_type,
            if drive.write_locked { " (write locked)" } else { "" }
        );
        drive.store = Some(store);
        Ok(())
    }

    /// Open an image file and attach it.
    pub fn attach_file(
        &mut self,
        unit: UnitNumber,
        path: &Path,
        read_only: bool,
    ) -> Result<(), ConfigurationError> {
        let store = FileStore::open(path, read_only).map_err(|error| ConfigurationError::Image {
            path: path.to_path_buf(),
            error,
        })?;
        self.attach(unit, Box::new(store))
    }

    /// Disconnect a pack from its drive, returning it.  An operation
    /// in progress on the drive is abandoned: a seek completes (with
    /// the cylinder shown as 0) and a transfer completes with a
    /// timing error.
    pub fn detach(
        &mut self,
        host: &mut Host,
        unit: UnitNumber,
    ) -> Result<Box<dyn BackingStore>, ConfigurationError> {
        if !self.is_attached(unit) {
            return Err(ConfigurationError::NotAttached(unit));
        }
        let pending = self.drive_mut(unit).pending.take();
        if let Some(handle) = pending {
            host.scheduler.cancel(handle);
            if self.drive(unit).seeking {
                event!(Level::DEBUG, "{unit:?}: detached while seeking");
                self.seek_done(host, unit, true);
                self.set_done(host, ErrorBits::NONE);
            } else {
                event!(Level::WARN, "{unit:?}: detached during a transfer");
                self.set_done(host, ErrorBits::TIMING);
            }
        }
        let drive = self.drive_mut(unit);
        drive.home();
        let store = drive.store.take().ok_or(ConfigurationError::NotAttached(unit))?;
        if store.is_read_only() {
            drive.write_locked = false;
        }
        event!(Level::INFO, "{unit:?}: detached {}", store.name());
        Ok(store)
    }

    /// Booting from an RP11 is not supported.
    pub fn boot(&self, _unit: UnitNumber) -> Result<(), ConfigurationError> {
        Err(ConfigurationError::BootUnsupported)
    }

    /// A table of drive parameters, one line per drive type.
    pub fn drive_table() -> String {
        let mut table = String::from(
            "        Cylinders    Heads  Sects/Trk    Capacity     Average access\n      Total   Spare                   Nominal  Usable    time, ms\n",
        );
        for drive_type in DriveType::ALL {
            let g = drive_type.geometry();
            let access = g.average_access();
            // Writing to a String cannot fail.
            let _ = writeln!(
                table,
                "{:<6}: {:5}   {:5}  {:5}  {:5}    {:5.1}MB  {:5.1}MB   {:5}.{}",
                g.name,
                g.cylinders,
                g.spare_cylinders,
                SURFACES_PER_CYLINDER,
                SECTORS_PER_TRACK,
                g.usable_megabytes(),
                g.nominal_megabytes(),
                access / 10,
                access % 10
            );
        }
        table
    }
}

impl Debug for Controller {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("config", &self.config)
            .field("regs", &self.regs)
            .field("units", &self.units)
            .field("lockout", &self.lockout)
            .finish_non_exhaustive()
    }
}
