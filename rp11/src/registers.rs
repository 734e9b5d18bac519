//! The register file: bit layouts of the bus-visible registers and
//! the storage behind them.
//!
//! Only some bits are stored.  Several fields of RPDS, RPER and RPCS
//! are recomputed from drive state each time they are read; that is
//! done by the controller, since it needs to look at the drives.
use std::fmt::{self, Debug, Display, Formatter};

use serde::Serialize;

use base::prelude::*;

use super::errors::ErrorBits;

/// Identifies one of the registers in the controller's bus window.
/// The discriminant is the register's word offset from the base
/// address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RegisterId {
    /// Drive status.
    Rpds = 0,
    /// Error register.
    Rper = 1,
    /// Control and status.
    Rpcs = 2,
    /// Word count.
    Rpwc = 3,
    /// Bus address.
    Rpba = 4,
    /// Cylinder address.
    Rpca = 5,
    /// Disk (track and sector) address.
    Rpda = 6,
    Rpm1 = 7,
    Rpm2 = 8,
    Rpm3 = 9,
    /// Selected unit's current cylinder.
    Suca = 10,
    Silo = 11,
}

impl RegisterId {
    pub const ALL: [RegisterId; 12] = [
        RegisterId::Rpds,
        RegisterId::Rper,
        RegisterId::Rpcs,
        RegisterId::Rpwc,
        RegisterId::Rpba,
        RegisterId::Rpca,
        RegisterId::Rpda,
        RegisterId::Rpm1,
        RegisterId::Rpm2,
        RegisterId::Rpm3,
        RegisterId::Suca,
        RegisterId::Silo,
    ];

    /// Size of the register window in bytes.
    pub const WINDOW_BYTES: u32 = 2 * RegisterId::ALL.len() as u32;

    pub fn from_index(index: usize) -> Option<RegisterId> {
        RegisterId::ALL.get(index).copied()
    }

    /// The word offset of the register from the controller's base
    /// address.
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// The byte offset of the register from the controller's base
    /// address.
    pub fn byte_offset(&self) -> u32 {
        (*self as u32) * BYTES_PER_WORD
    }

    pub fn name(&self) -> &'static str {
        match self {
            RegisterId::Rpds => "RPDS",
            RegisterId::Rper => "RPER",
            RegisterId::Rpcs => "RPCS",
            RegisterId::Rpwc => "RPWC",
            RegisterId::Rpba => "RPBA",
            RegisterId::Rpca => "RPCA",
            RegisterId::Rpda => "RPDA",
            RegisterId::Rpm1 => "RPM1",
            RegisterId::Rpm2 => "RPM2",
            RegisterId::Rpm3 => "RPM3",
            RegisterId::Suca => "SUCA",
            RegisterId::Silo => "SILO",
        }
    }

    /// True for the maintenance registers, which we do not emulate.
    pub fn is_unimplemented(&self) -> bool {
        matches!(
            self,
            RegisterId::Rpm1 | RegisterId::Rpm2 | RegisterId::Rpm3 | RegisterId::Silo
        )
    }
}

impl Display for RegisterId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(self.name())
    }
}

/// The operation selected by the function field of RPCS.
#[cfg_attr(test, derive(test_strategy::Arbitrary))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Function {
    Reset = 0,
    Write = 1,
    Read = 2,
    WriteCheck = 3,
    Seek = 4,
    WriteNoSeek = 5,
    Home = 6,
    ReadNoSeek = 7,
}

impl Function {
    pub fn from_code(code: u16) -> Function {
        match code & 0o7 {
            0 => Function::Reset,
            1 => Function::Write,
            2 => Function::Read,
            3 => Function::WriteCheck,
            4 => Function::Seek,
            5 => Function::WriteNoSeek,
            6 => Function::Home,
            _ => Function::ReadNoSeek,
        }
    }

    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Functions which move data from the drive to the controller.
    /// A write check counts, since it reads the disk in order to
    /// compare it with memory.
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            Function::Read | Function::ReadNoSeek | Function::WriteCheck
        )
    }

    pub fn is_write(&self) -> bool {
        matches!(self, Function::Write | Function::WriteNoSeek)
    }

    /// Transfers which stay on the drive's current cylinder and head
    /// instead of seeking to the address in RPCA/RPDA.
    pub fn is_no_seek(&self) -> bool {
        matches!(self, Function::ReadNoSeek | Function::WriteNoSeek)
    }

    /// Functions which only move the heads.
    pub fn is_positioning(&self) -> bool {
        matches!(self, Function::Seek | Function::Home)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Function::Reset => "RESET",
            Function::Write => "WRITE",
            Function::Read => "READ",
            Function::WriteCheck => "WCHK",
            Function::Seek => "SEEK",
            Function::WriteNoSeek => "WRNOSEEK",
            Function::Home => "HOME",
            Function::ReadNoSeek => "RDNOSEEK",
        }
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(self.name())
    }
}

fn write_flags(f: &mut Formatter<'_>, value: u16, flags: &[(u16, &str)]) -> fmt::Result {
    for (bit, name) in flags {
        if value & bit != 0 {
            write!(f, " {name}")?;
        }
    }
    Ok(())
}

/// The RPCS (control and status) register.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct ControlStatus(Word);

impl ControlStatus {
    pub const GO: u16 = 0o000_001;
    pub const FUNCTION: u16 = 0o000_016;
    const FUNCTION_SHIFT: u32 = 1;
    pub const MEMORY_EXTENSION: u16 = 0o000_060;
    const MEMORY_EXTENSION_SHIFT: u32 = 4;
    pub const INTERRUPT_ENABLE: u16 = 0o000_100;
    pub const DONE: u16 = 0o000_200;
    pub const DRIVE: u16 = 0o003_400;
    const DRIVE_SHIFT: u32 = 8;
    pub const HEADER: u16 = 0o004_000;
    /// Set for 18-bit ("header capable") mode, clear for normal
    /// PDP-11 mode.
    pub const MODE: u16 = 0o010_000;
    pub const ATTENTION_INTERRUPT_ENABLE: u16 = 0o020_000;
    pub const HARD_ERR: u16 = 0o040_000;
    pub const ERR: u16 = 0o100_000;

    /// Bits which are kept in the register.
    pub const STORED: u16 = 0o037_776;
    /// Bits which the program can change.
    pub const WRITABLE: u16 = 0o037_576;

    /// The value after a reset: done, and nothing else.
    pub const IDLE: ControlStatus = ControlStatus(ControlStatus::DONE);

    pub const fn from_bits(bits: Word) -> ControlStatus {
        ControlStatus(bits)
    }

    pub const fn bits(&self) -> Word {
        self.0
    }

    pub const fn has(&self, mask: u16) -> bool {
        self.0 & mask != 0
    }

    pub fn set(&mut self, mask: u16) {
        self.0 |= mask;
    }

    pub fn clear(&mut self, mask: u16) {
        self.0 &= !mask;
    }

    pub fn function(&self) -> Function {
        Function::from_code((self.0 & ControlStatus::FUNCTION) >> ControlStatus::FUNCTION_SHIFT)
    }

    /// Bus address bits 16-17.
    pub fn memory_extension(&self) -> u8 {
        ((self.0 & ControlStatus::MEMORY_EXTENSION) >> ControlStatus::MEMORY_EXTENSION_SHIFT) as u8
    }

    pub fn set_memory_extension(&mut self, extension: u8) {
        self.0 &= !ControlStatus::MEMORY_EXTENSION;
        self.0 |= (u16::from(extension) << ControlStatus::MEMORY_EXTENSION_SHIFT)
            & ControlStatus::MEMORY_EXTENSION;
    }

    /// The selected drive.
    pub fn unit(&self) -> UnitNumber {
        UnitNumber::from_low_bits(self.0 >> ControlStatus::DRIVE_SHIFT)
    }

    /// Build the bits of an RPCS value from its fields; convenient
    /// for programs (and tests) driving the controller.
    pub fn command(function: Function, unit: UnitNumber) -> Word {
        (function.code() << ControlStatus::FUNCTION_SHIFT)
            | (u16::from(unit) << ControlStatus::DRIVE_SHIFT)
            | ControlStatus::GO
    }
}

impl Display for ControlStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FUNC={} MEX={} DRV={}",
            self.function(),
            self.memory_extension(),
            self.unit()
        )?;
        write_flags(
            f,
            self.0,
            &[
                (ControlStatus::GO, "GO"),
                (ControlStatus::INTERRUPT_ENABLE, "IE"),
                (ControlStatus::DONE, "DONE"),
                (ControlStatus::HEADER, "HDR"),
                (ControlStatus::MODE, "MODE"),
                (ControlStatus::ATTENTION_INTERRUPT_ENABLE, "AIE"),
                (ControlStatus::HARD_ERR, "HERR"),
                (ControlStatus::ERR, "ERR"),
            ],
        )
    }
}

impl Debug for ControlStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ControlStatus({:06o}: {})", self.0, self)
    }
}

/// The RPDS (drive status) register.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct DriveStatus(Word);

impl DriveStatus {
    /// One attention bit per drive.
    pub const ATTENTION: u16 = 0o000_377;
    pub const WRITE_LOCKED: u16 = 0o000_400;
    pub const UNSAFE: u16 = 0o001_000;
    pub const SEEKING: u16 = 0o002_000;
    pub const SEEK_INCOMPLETE: u16 = 0o004_000;
    pub const HEADER_NOT_FOUND: u16 = 0o010_000;
    pub const RP03: u16 = 0o020_000;
    pub const ONLINE: u16 = 0o040_000;
    pub const READY: u16 = 0o100_000;

    pub const fn from_bits(bits: Word) -> DriveStatus {
        DriveStatus(bits)
    }

    pub const fn bits(&self) -> Word {
        self.0
    }

    pub const fn has(&self, mask: u16) -> bool {
        self.0 & mask != 0
    }

    pub fn attention(&self) -> u8 {
        low_byte(self.0)
    }

    /// The drive-error bit of RPER which this status implies.
    pub fn drive_error(&self) -> ErrorBits {
        if self.has(DriveStatus::HEADER_NOT_FOUND | DriveStatus::SEEK_INCOMPLETE) {
            ErrorBits::DRIVE_ERROR
        } else {
            ErrorBits::NONE
        }
    }
}

impl Display for DriveStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ATTN={:03o}", self.attention())?;
        write_flags(
            f,
            self.0,
            &[
                (DriveStatus::WRITE_LOCKED, "WLK"),
                (DriveStatus::UNSAFE, "UNSAFE"),
                (DriveStatus::SEEKING, "SEEK"),
                (DriveStatus::SEEK_INCOMPLETE, "INC"),
                (DriveStatus::HEADER_NOT_FOUND, "HNF"),
                (DriveStatus::RP03, "RP03"),
                (DriveStatus::ONLINE, "ONLN"),
                (DriveStatus::READY, "RDY"),
            ],
        )
    }
}

impl Debug for DriveStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "DriveStatus({:06o}: {})", self.0, self)
    }
}

/// The RPDA (disk address) register: track and sector.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct DiskAddress(Word);

impl DiskAddress {
    const SECTOR: u16 = 0o17;
    const SECTOR_ON_TRACK: u16 = 0o360;
    const SECTOR_ON_TRACK_SHIFT: u32 = 4;
    const TRACK: u16 = 0o37;
    const TRACK_SHIFT: u32 = 8;
    pub const WRITABLE: u16 = 0o017_417;

    pub const fn from_bits(bits: Word) -> DiskAddress {
        DiskAddress(bits)
    }

    pub fn from_parts(track: u16, sector: u16) -> DiskAddress {
        DiskAddress(
            ((track & DiskAddress::TRACK) << DiskAddress::TRACK_SHIFT)
                | (sector & DiskAddress::SECTOR),
        )
    }

    pub const fn bits(&self) -> Word {
        self.0
    }

    pub fn sector(&self) -> u16 {
        self.0 & DiskAddress::SECTOR
    }

    pub fn track(&self) -> u16 {
        (self.0 >> DiskAddress::TRACK_SHIFT) & DiskAddress::TRACK
    }

    pub fn sector_on_track(&self) -> u16 {
        (self.0 & DiskAddress::SECTOR_ON_TRACK) >> DiskAddress::SECTOR_ON_TRACK_SHIFT
    }

    /// The writable fields of this value, with `sot` filled in as the
    /// sector currently passing under the heads.
    #[must_use]
    pub fn with_sector_on_track(&self, sot: u16) -> DiskAddress {
        DiskAddress(
            (self.0 & DiskAddress::WRITABLE)
                | ((sot << DiskAddress::SECTOR_ON_TRACK_SHIFT) & DiskAddress::SECTOR_ON_TRACK),
        )
    }
}

impl Display for DiskAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TRACK={} SOT={} SECT={}",
            self.track(),
            self.sector_on_track(),
            self.sector()
        )
    }
}

impl Debug for DiskAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "DiskAddress({:06o}: {})", self.0, self)
    }
}

/// Implemented bits of RPBA; transfers are always word aligned.
pub(crate) const BUS_ADDRESS_BITS: u16 = 0o177_776;
/// Implemented bits of RPCA and SUCA.
pub(crate) const CYLINDER_BITS: u16 = 0o777;

/// The stored state of the controller's registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RegisterFile {
    /// Only the attention bits are stored.
    pub(crate) ds: u16,
    pub(crate) er: ErrorBits,
    pub(crate) cs: ControlStatus,
    pub(crate) wc: Word,
    pub(crate) ba: Word,
    pub(crate) ca: Word,
    pub(crate) da: DiskAddress,
    pub(crate) suca: Word,
}

impl RegisterFile {
    pub(crate) fn idle() -> RegisterFile {
        RegisterFile {
            ds: 0,
            er: ErrorBits::NONE,
            cs: ControlStatus::IDLE,
            wc: 0,
            ba: 0,
            ca: 0,
            da: DiskAddress::default(),
            suca: 0,
        }
    }

    pub(crate) fn attention(&self) -> u16 {
        self.ds & DriveStatus::ATTENTION
    }

    pub(crate) fn raise_attention(&mut self, unit: UnitNumber) {
        self.ds |= unit.mask();
    }

    /// The 18-bit address of the next word to transfer.
    pub(crate) fn memory_address(&self) -> BusAddress {
        BusAddress::from_parts(self.cs.memory_extension(), self.ba)
    }

    pub(crate) fn set_memory_address(&mut self, addr: BusAddress) {
        self.ba = addr.low() & BUS_ADDRESS_BITS;
        self.cs.set_memory_extension(addr.extension());
    }

    /// The number of words still to transfer.  A word count of zero
    /// means the whole of the maximum transfer.
    pub(crate) fn words_remaining(&self) -> usize {
        0x1_0000 - usize::from(self.wc)
    }

    /// The summary error bits of RPCS, recomputed from RPER.
    pub(crate) fn fold_error_summary(&mut self) {
        self.cs.clear(ControlStatus::ERR | ControlStatus::HARD_ERR);
        self.cs.set(self.er.summary());
    }
}

/// The values of all registers at one moment, as a program reading
/// them would see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegisterSnapshot {
    pub rpds: Word,
    pub rper: Word,
    pub rpcs: Word,
    pub rpwc: Word,
    pub rpba: Word,
    pub rpca: Word,
    pub rpda: Word,
    pub suca: Word,
}

impl RegisterSnapshot {
    pub fn get(&self, id: RegisterId) -> Word {
        match id {
            RegisterId::Rpds => self.rpds,
            RegisterId::Rper => self.rper,
            RegisterId::Rpcs => self.rpcs,
            RegisterId::Rpwc => self.rpwc,
            RegisterId::Rpba => self.rpba,
            RegisterId::Rpca => self.rpca,
            RegisterId::Rpda => self.rpda,
            RegisterId::Suca => self.suca,
            RegisterId::Rpm1 | RegisterId::Rpm2 | RegisterId::Rpm3 | RegisterId::Silo => 0,
        }
    }
}

impl Display for RegisterSnapshot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "RPDS={:06o} {}", self.rpds, DriveStatus(self.rpds))?;
        writeln!(
            f,
            "RPER={:06o} {}",
            self.rper,
            ErrorBits::from_bits(self.rper)
        )?;
        writeln!(f, "RPCS={:06o} {}", self.rpcs, ControlStatus(self.rpcs))?;
        writeln!(
            f,
            "RPWC={:06o} ({} words to go)",
            self.rpwc,
            0x1_0000 - u32::from(self.rpwc)
        )?;
        writeln!(f, "RPBA={:06o}", self.rpba)?;
        writeln!(f, "RPCA={:06o} ({})", self.rpca, self.rpca)?;
        writeln!(f, "RPDA={:06o} {}", self.rpda, DiskAddress(self.rpda))?;
        write!(f, "SUCA={:06o} ({})", self.suca, self.suca)
    }
}

#[test]
fn test_register_index_round_trip() {
    for (i, id) in RegisterId::ALL.iter().enumerate() {
        assert_eq!(RegisterId::from_index(i), Some(*id));
        assert_eq!(id.index(), i);
    }
    assert_eq!(RegisterId::from_index(12), None);
    assert_eq!(RegisterId::Suca.byte_offset(), 20);
    assert_eq!(RegisterId::WINDOW_BYTES, 0o30);
}

#[test]
fn test_function_codes() {
    for code in 0..8 {
        assert_eq!(Function::from_code(code).code(), code);
    }
    assert!(Function::WriteCheck.is_read());
    assert!(!Function::WriteCheck.is_write());
    assert!(Function::WriteNoSeek.is_no_seek());
    assert!(Function::Home.is_positioning());
    assert!(!Function::Reset.is_read() && !Function::Reset.is_write());
}

#[test]
fn test_control_status_fields() {
    let cs = ControlStatus::from_bits(
        ControlStatus::command(Function::Read, UnitNumber::try_from(5_u8).unwrap())
            | ControlStatus::INTERRUPT_ENABLE,
    );
    assert_eq!(cs.function(), Function::Read);
    assert_eq!(usize::from(cs.unit()), 5);
    assert!(cs.has(ControlStatus::GO));
    assert_eq!(cs.bits(), 0o002_505);

    let mut cs = ControlStatus::IDLE;
    cs.set_memory_extension(3);
    assert_eq!(cs.bits(), 0o000_260);
    assert_eq!(cs.memory_extension(), 3);
}

#[test]
fn test_control_status_display() {
    let cs = ControlStatus::from_bits(0o100_244);
    assert_eq!(cs.to_string(), "FUNC=READ MEX=2 DRV=0 DONE ERR");
}

#[test]
fn test_disk_address_fields() {
    let da = DiskAddress::from_parts(19, 9);
    assert_eq!(da.bits(), 0o011_411);
    assert_eq!(da.track(), 19);
    assert_eq!(da.sector(), 9);
    let with_sot = da.with_sector_on_track(7);
    assert_eq!(with_sot.sector_on_track(), 7);
    assert_eq!(with_sot.sector(), 9);
    assert_eq!(with_sot.bits() & DiskAddress::WRITABLE, da.bits());
}

#[test]
fn test_memory_address_carries_into_extension() {
    let mut regs = RegisterFile::idle();
    regs.set_memory_address(BusAddress::from_parts(0, 0o177_776).wrapping_add_words(1));
    assert_eq!(regs.ba, 0);
    assert_eq!(regs.cs.memory_extension(), 1);
    assert_eq!(u32::from(regs.memory_address()), 0o200_000);
}

#[test]
fn test_words_remaining() {
    let mut regs = RegisterFile::idle();
    assert_eq!(regs.words_remaining(), 65536);
    regs.wc = 0o177_775; // -3
    assert_eq!(regs.words_remaining(), 3);
}
