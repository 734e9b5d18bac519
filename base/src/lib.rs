//! The `base` crate defines the bus-level things which are useful
//! both to the disk controller emulation and to associated tools.
//! The idea is that if you want to write, say, a disk image
//! inspector, it would depend on the base crate but would not need to
//! depend on the controller emulation itself.

mod bytelane;
mod error;
mod types;

pub mod collections;
pub mod prelude;

pub use bytelane::*;
pub use error::ConversionFailed;
pub use types::*;

/// Build a [`BusAddress`](crate::prelude::BusAddress) from a literal,
/// checking the range at compile time.
#[macro_export]
macro_rules! bus_addr {
    ($n:expr) => {
        $crate::prelude::BusAddress::new::<{ $n }>()
    };
}

/// Build a [`UnitNumber`](crate::prelude::UnitNumber) from a literal,
/// checking the range at compile time.
#[macro_export]
macro_rules! unit {
    ($n:expr) => {
        $crate::prelude::UnitNumber::new::<{ $n }>()
    };
}

#[test]
fn test_bus_addr() {
    use prelude::BusAddress;
    let m: BusAddress = bus_addr!(0o776_710);
    let n: BusAddress = BusAddress::try_from(0o776_710_u32).expect("test data should be in range");
    assert_eq!(m, n);
}

#[test]
fn test_unit() {
    use prelude::UnitNumber;
    let u: UnitNumber = unit!(7);
    assert_eq!(usize::from(u), 7);
}
