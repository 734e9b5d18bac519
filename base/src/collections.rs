//! Collection types which are not specific to any one device.
pub mod pq;
