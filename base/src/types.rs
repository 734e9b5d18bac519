//! Addresses and unit numbers.
//!
//! The controller sits on an 18-bit UNIBUS.  Registers are 16 bits
//! wide; the two extra address bits needed by a DMA transfer are
//! carried in a separate "memory extension" field of the controller's
//! status register.  We keep the full 18-bit value in a [`BusAddress`]
//! so that the carry out of the low 16 bits is never lost.
use std::fmt::{self, Debug, Display, Formatter, Octal};

use serde::Serialize;

#[cfg(test)]
use test_strategy::Arbitrary;

use super::error::ConversionFailed;

/// A 16-bit machine word.
pub type Word = u16;

/// Number of bytes in a [`Word`].
pub const BYTES_PER_WORD: u32 = 2;

/// An 18-bit byte address on the system bus.
#[cfg_attr(test, derive(Arbitrary))]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct BusAddress(#[cfg_attr(test, strategy(0..=BusAddress::MAX.0))] u32);

impl BusAddress {
    pub const ZERO: BusAddress = BusAddress(0);
    pub const MAX: BusAddress = BusAddress(0o777_777);

    /// Number of address bits above the low 16.
    pub const EXTENSION_BITS: u32 = 2;

    /// Construct an address from a constant; an out-of-range value
    /// is a compile-time error.
    pub const fn new<const N: u32>() -> BusAddress {
        struct Helper<const M: u32>;
        impl<const M: u32> Helper<M> {
            const A: BusAddress = {
                if M > BusAddress::MAX.0 {
                    panic!("input value is out of range")
                } else {
                    BusAddress(M)
                }
            };
        }
        Helper::<N>::A
    }

    /// Join a 2-bit extension (address bits 16-17) and the low 16
    /// bits of an address.
    pub fn from_parts(extension: u8, low: Word) -> BusAddress {
        BusAddress(((u32::from(extension) & 0o3) << 16) | u32::from(low))
    }

    /// The low 16 bits of the address.
    pub fn low(&self) -> Word {
        (self.0 & 0o177_777) as Word
    }

    /// Address bits 16-17.
    pub fn extension(&self) -> u8 {
        ((self.0 >> 16) & 0o3) as u8
    }

    /// Advance the address by `words` 16-bit words, wrapping around
    /// the top of the 18-bit address space as the hardware does.
    pub fn wrapping_add_words(&self, words: u32) -> BusAddress {
        let delta = words.wrapping_mul(BYTES_PER_WORD);
        BusAddress(self.0.wrapping_add(delta) & BusAddress::MAX.0)
    }

    /// The (word) index corresponding to this byte address; the
    /// low-order (byte) bit is ignored.
    pub fn word_index(&self) -> usize {
        (self.0 >> 1) as usize
    }

    /// True when the address selects the high byte of a word.
    pub fn is_odd(&self) -> bool {
        self.0 & 1 != 0
    }
}

impl TryFrom<u32> for BusAddress {
    type Error = ConversionFailed;
    fn try_from(n: u32) -> Result<BusAddress, ConversionFailed> {
        if n > BusAddress::MAX.0 {
            Err(ConversionFailed::TooLarge)
        } else {
            Ok(BusAddress(n))
        }
    }
}

impl From<BusAddress> for u32 {
    fn from(a: BusAddress) -> u32 {
        a.0
    }
}

impl From<Word> for BusAddress {
    fn from(low: Word) -> BusAddress {
        BusAddress(u32::from(low))
    }
}

impl Display for BusAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        // Always display as octal.
        write!(f, "{:>06o}", self.0)
    }
}

impl Debug for BusAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{:>06o}", self.0)
    }
}

impl Octal for BusAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        Octal::fmt(&self.0, f)
    }
}

/// Identifies one of the (up to eight) drives attached to a
/// controller.  The value is the drive-select field of the
/// controller's status register, so it can never be out of range.
#[cfg_attr(test, derive(Arbitrary))]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct UnitNumber(#[cfg_attr(test, strategy(0..UnitNumber::COUNT as u8))] u8);

impl UnitNumber {
    /// Number of distinct unit numbers.
    pub const COUNT: usize = 8;

    pub const ZERO: UnitNumber = UnitNumber(0);

    pub const fn new<const N: u8>() -> UnitNumber {
        struct Helper<const M: u8>;
        impl<const M: u8> Helper<M> {
            const U: UnitNumber = {
                if M as usize >= UnitNumber::COUNT {
                    panic!("input value is out of range")
                } else {
                    UnitNumber(M)
                }
            };
        }
        Helper::<N>::U
    }

    /// Extract a unit number from the low three bits of `bits`.
    pub const fn from_low_bits(bits: u16) -> UnitNumber {
        UnitNumber((bits & 0o7) as u8)
    }

    /// The single-bit mask `1 << n` for this unit.
    pub const fn mask(&self) -> u16 {
        1 << self.0
    }

    /// All unit numbers in ascending order.
    pub fn all() -> impl Iterator<Item = UnitNumber> {
        (0..UnitNumber::COUNT as u8).map(UnitNumber)
    }
}

impl TryFrom<u8> for UnitNumber {
    type Error = ConversionFailed;
    fn try_from(n: u8) -> Result<UnitNumber, ConversionFailed> {
        if usize::from(n) < UnitNumber::COUNT {
            Ok(UnitNumber(n))
        } else {
            Err(ConversionFailed::TooLarge)
        }
    }
}

impl TryFrom<usize> for UnitNumber {
    type Error = ConversionFailed;
    fn try_from(n: usize) -> Result<UnitNumber, ConversionFailed> {
        u8::try_from(n)
            .map_err(|_| ConversionFailed::TooLarge)
            .and_then(|b: u8| UnitNumber::try_from(b))
    }
}

impl From<UnitNumber> for usize {
    fn from(u: UnitNumber) -> usize {
        usize::from(u.0)
    }
}

impl From<UnitNumber> for u16 {
    fn from(u: UnitNumber) -> u16 {
        u16::from(u.0)
    }
}

impl Display for UnitNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}", self.0)
    }
}

impl Debug for UnitNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "unit {}", self.0)
    }
}

#[test]
fn test_bus_address_parts() {
    let a = BusAddress::from_parts(0o3, 0o177_776);
    assert_eq!(u32::from(a), 0o777_776);
    assert_eq!(a.extension(), 3);
    assert_eq!(a.low(), 0o177_776);
}

#[test]
fn test_bus_address_range() {
    assert!(BusAddress::try_from(0o777_777_u32).is_ok());
    assert_eq!(
        BusAddress::try_from(0o1_000_000_u32),
        Err(ConversionFailed::TooLarge)
    );
}

#[test]
fn test_bus_address_carry_into_extension() {
    let a = BusAddress::from_parts(0, 0o177_776);
    let b = a.wrapping_add_words(1);
    assert_eq!(b.extension(), 1);
    assert_eq!(b.low(), 0);
}

#[test]
fn test_bus_address_wraps() {
    assert_eq!(BusAddress::MAX.wrapping_add_words(1), BusAddress::from(1_u16));
}

#[test]
fn test_unit_number_range() {
    assert!(UnitNumber::try_from(7_u8).is_ok());
    assert_eq!(UnitNumber::try_from(8_u8), Err(ConversionFailed::TooLarge));
    assert_eq!(UnitNumber::try_from(300_usize), Err(ConversionFailed::TooLarge));
    assert_eq!(UnitNumber::from_low_bits(0o15), UnitNumber::try_from(5_u8).unwrap());
    assert_eq!(UnitNumber::all().count(), UnitNumber::COUNT);
    assert_eq!(UnitNumber::try_from(3_u8).unwrap().mask(), 0o10);
}
