//! Emulation of the RP11-C disk pack controller and its RP02/RP03
//! drives.
//!
//! The controller is a register-mapped UNIBUS device.  The host
//! simulation routes bus reads and writes to [`Controller::read`] and
//! [`Controller::write`]; when an operation needs simulated time to
//! pass, the controller asks the host's [`Scheduler`] to call
//! [`Controller::service`] back later.  Memory (for DMA), the
//! interrupt request line and the scheduler are all supplied by the
//! host through the [`Host`] bundle, so the controller holds no
//! global state.
//!
//! [`System`] bundles a controller with simple implementations of
//! all three host collaborators, which is convenient for tools and
//! tests.
#![crate_name = "rp11"]

mod context;
mod controller;
mod dispatch;
mod drive;
mod errors;
mod events;
mod host;
mod memory;
mod protect;
mod registers;
mod store;
mod system;
mod timing;
mod transfer;

#[cfg(test)]
mod tests;

pub use context::Context;
pub use controller::{Access, Controller, ControllerConfig, DEVICE_DESCRIPTION};
pub use drive::{
    Cylinder, DriveType, Geometry, Head, SECTORS_PER_TRACK, SURFACES_PER_CYLINDER,
    WORDS_PER_SECTOR,
};
pub use errors::{BackingStoreError, ConfigurationError, ErrorBits, UnmappedAddress};
pub use events::EventQueue;
pub use host::{CancelHandle, Host, HostMemory, InterruptLine, Scheduler};
pub use memory::CoreMemory;
pub use protect::WriteLockout;
pub use registers::{
    ControlStatus, DiskAddress, DriveStatus, Function, RegisterId, RegisterSnapshot,
};
pub use store::{BackingStore, Fault, FileStore, MemoryStore, Transfer, SECTOR_BYTES};
pub use system::{InterruptRequest, System};
pub use timing::{seek_delay, OperationKind, Tenths, ROTATIONAL_LATENCY};
