//! The write lockout address (WLOA).
//!
//! This is a set of switches rather than a bus-visible register.  It
//! write-protects whole drives (all drives up to and including DRV)
//! and the first few cylinders of every other drive.
use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;

use serde::Serialize;

use base::prelude::*;

use super::drive::Cylinder;
use super::errors::ConfigurationError;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct WriteLockout(u16);

impl WriteLockout {
    const CYL2: u16 = 0o377;
    const DRIVE: u16 = 0o1400;
    const DRIVE_SHIFT: u32 = 8;
    pub const ON: u16 = 0o100_000;
    /// Bits of the address (excluding the on/off switch).
    pub const IMPLEMENTED: u16 = 0o1777;

    pub const OFF: WriteLockout = WriteLockout(0);

    pub fn from_bits(bits: u16) -> WriteLockout {
        WriteLockout(bits & (WriteLockout::ON | WriteLockout::IMPLEMENTED))
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn is_on(&self) -> bool {
        self.0 & WriteLockout::ON != 0
    }

    /// The highest-numbered drive which is completely protected.
    pub fn protected_drive(&self) -> u16 {
        (self.0 & WriteLockout::DRIVE) >> WriteLockout::DRIVE_SHIFT
    }

    /// The highest-numbered cylinder which is protected; the switches
    /// select cylinders in pairs.
    pub fn protected_cylinder(&self) -> u16 {
        ((self.0 & WriteLockout::CYL2) << 1) | 1
    }

    /// Whether a write to `cylinder` of `unit` is forbidden.
    pub fn forbids(&self, unit: UnitNumber, cylinder: Cylinder) -> bool {
        self.is_on()
            && (u16::from(unit) <= self.protected_drive()
                || cylinder.value() <= self.protected_cylinder())
    }

    /// Apply a setting in the form `OFF` or `ON;<address>`.  Turning
    /// the lockout off keeps the address.
    pub fn apply(&mut self, setting: &str) -> Result<(), ConfigurationError> {
        let bad = || ConfigurationError::InvalidProtect(setting.to_string());
        let setting = setting.trim();
        if setting.eq_ignore_ascii_case("OFF") {
            self.0 &= !WriteLockout::ON;
            return Ok(());
        }
        let (switch, address) = setting.split_once(';').ok_or_else(bad)?;
        if !switch.eq_ignore_ascii_case("ON") {
            return Err(bad());
        }
        let address = parse_c_integer(address)
            .filter(|n| n & !u32::from(WriteLockout::IMPLEMENTED) == 0)
            .ok_or_else(bad)?;
        // The filter above guarantees the value fits.
        self.0 = WriteLockout::ON | address as u16;
        Ok(())
    }
}

/// Parse an unsigned integer with a C-style radix prefix: `0x` for
/// hexadecimal, a leading `0` for octal, otherwise decimal.
fn parse_c_integer(s: &str) -> Option<u32> {
    let (digits, radix) = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (hex, 16)
    } else if s.len() > 1 && s.starts_with('0') {
        (&s[1..], 8)
    } else {
        (s, 10)
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    u32::from_str_radix(digits, radix).ok()
}

impl FromStr for WriteLockout {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<WriteLockout, ConfigurationError> {
        let mut w = WriteLockout::OFF;
        w.apply(s)?;
        Ok(w)
    }
}

impl Display for WriteLockout {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PROTECT={} DRV={} CYL2={:o}",
            if self.is_on() { "ON" } else { "OFF" },
            self.protected_drive(),
            self.0 & WriteLockout::CYL2
        )
    }
}

impl Debug for WriteLockout {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "WriteLockout({:06o}: {})", self.0, self)
    }
}
