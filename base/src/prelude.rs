//! The prelude exports the structs which are useful in representing
//! things to do with a UNIBUS-style system bus.  Providing this
//! prelude is the main purpose of the base crate.
pub use super::bytelane::{
    high_byte, join_bytes, low_byte, merge_byte, words_from_le_bytes, words_to_le_bytes, ByteLane,
};
pub use super::error::ConversionFailed;
pub use super::types::*;
pub use super::{bus_addr, unit};
