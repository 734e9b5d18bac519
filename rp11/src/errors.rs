//! Error conditions.
//!
//! Errors which the controller reports to the simulated program
//! (through the RPER register) are never failures of the emulator:
//! each operation always completes, with the relevant bits set.
//! Those bits are modelled by [`ErrorBits`].
//!
//! Mistakes made by whoever is configuring the emulator (attaching a
//! drive twice, asking for a drive which does not exist and so on)
//! are reported as [`ConfigurationError`].
use std::error::Error;
use std::fmt::{self, Debug, Display, Formatter};
use std::io;
use std::ops::{BitOr, BitOrAssign};
use std::path::PathBuf;

use serde::Serialize;

use base::prelude::*;

use super::registers::ControlStatus;

/// The contents of the RPER register; one bit per error condition.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct ErrorBits(u16);

impl ErrorBits {
    pub const NONE: ErrorBits = ErrorBits(0);
    /// Drive error (header not found or seek incomplete).
    pub const DRIVE_ERROR: ErrorBits = ErrorBits(0o000_001);
    /// End of pack: the transfer ran off the last sector.
    pub const PACK_OVERRUN: ErrorBits = ErrorBits(0o000_002);
    /// Non-existent memory.
    pub const NON_EXISTENT_MEMORY: ErrorBits = ErrorBits(0o000_004);
    pub const WRITE_CHECK: ErrorBits = ErrorBits(0o000_010);
    pub const TIMING: ErrorBits = ErrorBits(0o000_020);
    pub const SERIAL_CHECKSUM: ErrorBits = ErrorBits(0o000_040);
    pub const WORD_PARITY: ErrorBits = ErrorBits(0o000_100);
    pub const LONGITUDINAL_PARITY: ErrorBits = ErrorBits(0o000_200);
    pub const MODE: ErrorBits = ErrorBits(0o000_400);
    pub const FORMAT: ErrorBits = ErrorBits(0o001_000);
    pub const PROGRAMMING: ErrorBits = ErrorBits(0o002_000);
    pub const NON_EXISTENT_SECTOR: ErrorBits = ErrorBits(0o004_000);
    pub const NON_EXISTENT_TRACK: ErrorBits = ErrorBits(0o010_000);
    pub const NON_EXISTENT_CYLINDER: ErrorBits = ErrorBits(0o020_000);
    pub const UNSAFE_VIOLATION: ErrorBits = ErrorBits(0o040_000);
    pub const WRITE_PROTECT_VIOLATION: ErrorBits = ErrorBits(0o100_000);

    /// Bits which are actually stored; the drive-error bit is
    /// recomputed from the drive status each time it is read.
    pub(crate) const STORED: ErrorBits = ErrorBits(0o177_776);

    /// Hard errors (drawing 19 of the maintenance manual).
    pub const HARD: ErrorBits = ErrorBits(
        Self::WRITE_PROTECT_VIOLATION.0
            | Self::UNSAFE_VIOLATION.0
            | Self::NON_EXISTENT_CYLINDER.0
            | Self::NON_EXISTENT_TRACK.0
            | Self::NON_EXISTENT_SECTOR.0
            | Self::PROGRAMMING.0
            | Self::NON_EXISTENT_MEMORY.0
            | Self::DRIVE_ERROR.0
            | Self::MODE.0,
    );

    /// Soft errors.
    pub const SOFT: ErrorBits = ErrorBits(
        Self::LONGITUDINAL_PARITY.0
            | Self::WORD_PARITY.0
            | Self::SERIAL_CHECKSUM.0
            | Self::WRITE_CHECK.0
            | Self::PACK_OVERRUN.0
            | Self::TIMING.0
            | Self::FORMAT.0,
    );

    const NAMES: [&'static str; 16] = [
        "DRE", "EOP", "NXM", "WCE", "TE", "CSE", "WPE", "LPE", "MODE", "FMTE", "PGE", "NXS",
        "NXT", "NXC", "FUV", "WPV",
    ];

    pub const fn from_bits(bits: u16) -> ErrorBits {
        ErrorBits(bits)
    }

    pub const fn bits(&self) -> u16 {
        self.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn contains(&self, other: ErrorBits) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(&self, other: ErrorBits) -> bool {
        self.0 & other.0 != 0
    }

    #[must_use]
    pub const fn without(&self, other: ErrorBits) -> ErrorBits {
        ErrorBits(self.0 & !other.0)
    }

    #[must_use]
    pub const fn only(&self, other: ErrorBits) -> ErrorBits {
        ErrorBits(self.0 & other.0)
    }

    pub fn is_hard(&self) -> bool {
        self.intersects(ErrorBits::HARD)
    }

    pub fn is_soft(&self) -> bool {
        self.intersects(ErrorBits::SOFT)
    }

    /// The RPCS summary bits implied by this set of errors: a hard
    /// error sets both ERR and HERR, a soft error sets only ERR.
    pub fn summary(&self) -> u16 {
        let mut s: u16 = 0;
        if self.is_hard() {
            s |= ControlStatus::ERR | ControlStatus::HARD_ERR;
        }
        if self.is_soft() {
            s |= ControlStatus::ERR;
        }
        s
    }

    /// Mnemonics of the bits which are set, least significant first.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        ErrorBits::NAMES
            .iter()
            .enumerate()
            .filter(|(i, _)| self.0 & (1 << i) != 0)
            .map(|(_, name)| *name)
    }
}

impl BitOr for ErrorBits {
    type Output = ErrorBits;
    fn bitor(self, rhs: ErrorBits) -> ErrorBits {
        ErrorBits(self.0 | rhs.0)
    }
}

impl BitOrAssign for ErrorBits {
    fn bitor_assign(&mut self, rhs: ErrorBits) {
        self.0 |= rhs.0;
    }
}

impl Display for ErrorBits {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        if self.is_empty() {
            return f.write_str("none");
        }
        let mut first = true;
        for name in self.names() {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(name)?;
            first = false;
        }
        Ok(())
    }
}

impl Debug for ErrorBits {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "ErrorBits({:06o}: {})", self.0, self)
    }
}

/// A failure reported by a backing store.  Sector transfers which
/// stop early without an error are not failures; see
/// [`Transfer`](crate::Transfer).
#[derive(Debug)]
pub enum BackingStoreError {
    Io(io::Error),
    /// The store accepted fewer sectors than it was given, without
    /// saying why.
    ShortWrite { requested: usize, completed: usize },
    ReadOnly,
    /// An error injected by a test double.
    Injected { block: u32 },
}

impl Display for BackingStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            BackingStoreError::Io(e) => write!(f, "I/O error: {e}"),
            BackingStoreError::ShortWrite {
                requested,
                completed,
            } => write!(
                f,
                "short write: {completed} of {requested} sectors were written"
            ),
            BackingStoreError::ReadOnly => f.write_str("backing store is read-only"),
            BackingStoreError::Injected { block } => {
                write!(f, "injected fault at block {block}")
            }
        }
    }
}

impl Error for BackingStoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BackingStoreError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for BackingStoreError {
    fn from(e: io::Error) -> BackingStoreError {
        BackingStoreError::Io(e)
    }
}

/// A bus access to an address which does not belong to the
/// controller's register window.  The bus should try another device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnmappedAddress(pub BusAddress);

impl Display for UnmappedAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "address {} is not a controller register", self.0)
    }
}

impl Error for UnmappedAddress {}

/// Describes a mistake in the way the emulated hardware was set up.
#[derive(Debug)]
pub enum ConfigurationError {
    /// The unit number is outside the range supported by the
    /// controller.
    NoSuchUnit(usize),
    /// The operation is not allowed while a drive is attached.
    AlreadyAttached(UnitNumber),
    /// The operation needs an attached drive.
    NotAttached(UnitNumber),
    /// The drive's image cannot be written.
    ReadOnlyImage(UnitNumber),
    /// The write lockout setting could not be understood.
    InvalidProtect(String),
    /// The drive type name is not one we know.
    UnknownDriveType(String),
    /// The controller has no bootstrap.
    BootUnsupported,
    /// A disk image could not be opened.
    Image { path: PathBuf, error: io::Error },
}

impl Display for ConfigurationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            ConfigurationError::NoSuchUnit(n) => write!(
                f,
                "unit {n} does not exist; units are numbered 0 to {}",
                UnitNumber::COUNT - 1
            ),
            ConfigurationError::AlreadyAttached(u) => write!(f, "unit {u} is already attached"),
            ConfigurationError::NotAttached(u) => write!(f, "unit {u} is not attached"),
            ConfigurationError::ReadOnlyImage(u) => {
                write!(f, "unit {u} is attached to a read-only image")
            }
            ConfigurationError::InvalidProtect(s) => write!(
                f,
                "invalid write lockout setting '{s}'; expected OFF or ON;<address>"
            ),
            ConfigurationError::UnknownDriveType(s) => {
                write!(f, "unknown drive type '{s}'; expected RP02 or RP03")
            }
            ConfigurationError::BootUnsupported => {
                f.write_str("booting from the RP11 is not supported")
            }
            ConfigurationError::Image { path, error } => {
                write!(f, "cannot open disk image {}: {error}", path.display())
            }
        }
    }
}

impl Error for ConfigurationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigurationError::Image { error, .. } => Some(error),
            _ => None,
        }
    }
}

#[test]
fn test_hard_and_soft_partition_the_stored_bits() {
    assert_eq!(ErrorBits::HARD.bits() & ErrorBits::SOFT.bits(), 0);
    assert_eq!(ErrorBits::HARD.bits() | ErrorBits::SOFT.bits(), 0o177_777);
}

#[test]
fn test_summary() {
    assert_eq!(ErrorBits::NONE.summary(), 0);
    assert_eq!(
        ErrorBits::PACK_OVERRUN.summary(),
        ControlStatus::ERR,
        "overrun is a soft error"
    );
    assert_eq!(
        ErrorBits::NON_EXISTENT_SECTOR.summary(),
        ControlStatus::ERR | ControlStatus::HARD_ERR
    );
    assert_eq!(
        (ErrorBits::TIMING | ErrorBits::MODE).summary(),
        ControlStatus::ERR | ControlStatus::HARD_ERR
    );
}

#[test]
fn test_error_names() {
    assert_eq!(ErrorBits::NONE.to_string(), "none");
    assert_eq!(
        (ErrorBits::FORMAT | ErrorBits::WRITE_CHECK).to_string(),
        "WCE FMTE"
    );
    assert_eq!(ErrorBits::WRITE_PROTECT_VIOLATION.to_string(), "WPV");
}

#[test]
fn test_configuration_error_display() {
    assert_eq!(
        ConfigurationError::NoSuchUnit(9).to_string(),
        "unit 9 does not exist; units are numbered 0 to 7"
    );
}
