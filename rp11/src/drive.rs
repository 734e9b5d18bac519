//! Disk drives: geometry of the two drive types and the state of a
//! drive unit.
use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;

use conv::ValueFrom;
use serde::Serialize;

use super::errors::ConfigurationError;
use super::host::CancelHandle;
use super::registers::Function;
use super::store::BackingStore;
use super::timing::{Tenths, ROTATIONAL_LATENCY};

pub const WORDS_PER_SECTOR: usize = 256;
pub const SURFACES_PER_CYLINDER: u16 = 20;
pub const SECTORS_PER_TRACK: u16 = 10;
pub const SECTORS_PER_CYLINDER: u32 = SURFACES_PER_CYLINDER as u32 * SECTORS_PER_TRACK as u32;
/// The largest transfer the word count register can describe.
pub const MAX_TRANSFER_WORDS: usize = 65536;

/// Fixed parameters of a type of drive.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct Geometry {
    pub name: &'static str,
    pub cylinders: u16,
    /// Cylinders reserved for bad-block replacement.
    pub spare_cylinders: u16,
    pub seek_one_track: Tenths,
    pub seek_average: Tenths,
    pub seek_max: Tenths,
}

impl Geometry {
    /// Total number of sectors on a pack.
    pub fn blocks(&self) -> u32 {
        u32::from(self.cylinders) * SECTORS_PER_CYLINDER
    }

    pub fn usable_blocks(&self) -> u32 {
        u32::from(self.cylinders - self.spare_cylinders) * SECTORS_PER_CYLINDER
    }

    fn megabytes(blocks: u32) -> f64 {
        let sector_bytes = (WORDS_PER_SECTOR * 2) as u32;
        let bytes = f64::value_from(blocks.saturating_mul(sector_bytes)).unwrap_or(f64::MAX);
        bytes / 1.0e6
    }

    /// Capacity (including spare cylinders) in millions of bytes.
    pub fn nominal_megabytes(&self) -> f64 {
        Geometry::megabytes(self.blocks())
    }

    pub fn usable_megabytes(&self) -> f64 {
        Geometry::megabytes(self.usable_blocks())
    }

    /// Average access time: an average seek plus half a revolution.
    pub fn average_access(&self) -> Tenths {
        self.seek_average + ROTATIONAL_LATENCY
    }
}

const RP02: Geometry = Geometry {
    name: "RP02",
    cylinders: 203,
    spare_cylinders: 3,
    seek_one_track: 200,
    seek_average: 500,
    seek_max: 800,
};

const RP03: Geometry = Geometry {
    name: "RP03",
    cylinders: 406,
    spare_cylinders: 6,
    seek_one_track: 75,
    seek_average: 290,
    seek_max: 550,
};

#[cfg_attr(test, derive(test_strategy::Arbitrary))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum DriveType {
    Rp02,
    #[default]
    Rp03,
}

impl DriveType {
    pub const ALL: [DriveType; 2] = [DriveType::Rp02, DriveType::Rp03];

    pub fn geometry(&self) -> &'static Geometry {
        match self {
            DriveType::Rp02 => &RP02,
            DriveType::Rp03 => &RP03,
        }
    }

    /// The drive type whose pack holds exactly `blocks` sectors.
    pub fn from_blocks(blocks: u64) -> Option<DriveType> {
        DriveType::ALL
            .into_iter()
            .find(|t| u64::from(t.geometry().blocks()) == blocks)
    }
}

impl Display for DriveType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.geometry().name)
    }
}

impl FromStr for DriveType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<DriveType, ConfigurationError> {
        DriveType::ALL
            .into_iter()
            .find(|t| t.geometry().name.eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigurationError::UnknownDriveType(s.to_string()))
    }
}

/// A cylinder number which is known to exist on the drive it was
/// validated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Cylinder(u16);

impl Cylinder {
    pub const ZERO: Cylinder = Cylinder(0);

    pub fn validate(n: u16, drive_type: DriveType) -> Option<Cylinder> {
        (n < drive_type.geometry().cylinders).then_some(Cylinder(n))
    }

    pub fn last(drive_type: DriveType) -> Cylinder {
        Cylinder(drive_type.geometry().cylinders - 1)
    }

    pub fn value(&self) -> u16 {
        self.0
    }

    pub fn distance(&self, other: Cylinder) -> u16 {
        self.0.abs_diff(other.0)
    }
}

impl Display for Cylinder {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A head (track within a cylinder) which is known to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Head(u16);

impl Head {
    pub const ZERO: Head = Head(0);
    pub const LAST: Head = Head(SURFACES_PER_CYLINDER - 1);

    pub fn validate(n: u16) -> Option<Head> {
        (n < SURFACES_PER_CYLINDER).then_some(Head(n))
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

impl Display for Head {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The linear block number of a sector.
pub(crate) fn block_number(cylinder: Cylinder, head: Head, sector: u16) -> u32 {
    (u32::from(cylinder.0) * u32::from(SURFACES_PER_CYLINDER) + u32::from(head.0))
        * u32::from(SECTORS_PER_TRACK)
        + u32::from(sector)
}

/// The cylinder and head holding `block`.  A block number just past
/// the end of the pack maps onto the last track.
pub(crate) fn position_of_block(block: u32, drive_type: DriveType) -> (Cylinder, Head) {
    let track = block / u32::from(SECTORS_PER_TRACK);
    let cylinder = track / u32::from(SURFACES_PER_CYLINDER);
    match u16::try_from(cylinder)
        .ok()
        .and_then(|c| Cylinder::validate(c, drive_type))
    {
        Some(c) => (
            c,
            // Always in range after the remainder.
            Head((track % u32::from(SURFACES_PER_CYLINDER)) as u16),
        ),
        None => (Cylinder::last(drive_type), Head::LAST),
    }
}

/// One of the drives connected to the controller.
pub(crate) struct DriveUnit {
    pub(crate) drive_type: DriveType,
    /// When set, attaching an image whose size matches a drive type
    /// selects that type.
    pub(crate) autosize: bool,
    pub(crate) write_locked: bool,
    pub(crate) store: Option<Box<dyn BackingStore>>,
    pub(crate) cylinder: Cylinder,
    pub(crate) head: Head,
    /// The function most recently started on this drive.
    pub(crate) function: Option<Function>,
    pub(crate) seeking: bool,
    /// The completion callback we are waiting for, if any.
    pub(crate) pending: Option<CancelHandle>,
}

impl DriveUnit {
    pub(crate) fn new() -> DriveUnit {
        DriveUnit {
            drive_type: DriveType::default(),
            autosize: true,
            write_locked: false,
            store: None,
            cylinder: Cylinder::ZERO,
            head: Head::ZERO,
            function: None,
            seeking: false,
            pending: None,
        }
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.store.is_some()
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.seeking || self.pending.is_some()
    }

    /// Forget the position and any operation in progress.
    pub(crate) fn home(&mut self) {
        self.cylinder = Cylinder::ZERO;
        self.head = Head::ZERO;
        self.function = None;
        self.seeking = false;
    }
}

impl Debug for DriveUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriveUnit")
            .field("drive_type", &self.drive_type)
            .field("autosize", &self.autosize)
            .field("write_locked", &self.write_locked)
            .field("store", &self.store.as_ref().map(|s| s.name()))
            .field("cylinder", &self.cylinder)
            .field("head", &self.head)
            .field("function", &self.function)
            .field("seeking", &self.seeking)
            .field("pending", &self.pending)
            .finish()
    }
}

#[test]
fn test_geometry() {
    assert_eq!(DriveType::Rp02.geometry().blocks(), 40_600);
    assert_eq!(DriveType::Rp03.geometry().blocks(), 81_200);
    assert_eq!(DriveType::Rp03.geometry().usable_blocks(), 80_000);
    assert_eq!(DriveType::Rp02.geometry().average_access(), 625);
    let mb = DriveType::Rp02.geometry().nominal_megabytes();
    assert!((mb - 20.7872).abs() < 1e-6, "got {mb}");
}

#[test]
fn test_drive_type_from_str() {
    assert_eq!("rp02".parse::<DriveType>().ok(), Some(DriveType::Rp02));
    assert_eq!("RP03".parse::<DriveType>().ok(), Some(DriveType::Rp03));
    assert!("RP04".parse::<DriveType>().is_err());
}

#[test]
fn test_drive_type_from_blocks() {
    assert_eq!(DriveType::from_blocks(40_600), Some(DriveType::Rp02));
    assert_eq!(DriveType::from_blocks(81_200), Some(DriveType::Rp03));
    assert_eq!(DriveType::from_blocks(0), None);
}

#[test]
fn test_cylinder_validation() {
    assert!(Cylinder::validate(202, DriveType::Rp02).is_some());
    assert!(Cylinder::validate(203, DriveType::Rp02).is_none());
    assert!(Cylinder::validate(405, DriveType::Rp03).is_some());
    assert!(Head::validate(19).is_some());
    assert!(Head::validate(20).is_none());
}

#[test]
fn test_block_positions() {
    let c = Cylinder::validate(3, DriveType::Rp03).unwrap();
    let h = Head::validate(4).unwrap();
    let block = block_number(c, h, 5);
    assert_eq!(block, 3 * 200 + 4 * 10 + 5);
    assert_eq!(position_of_block(block, DriveType::Rp03), (c, h));
    // Running off the end of the pack leaves the heads on the last
    // track.
    assert_eq!(
        position_of_block(81_200, DriveType::Rp03),
        (Cylinder::last(DriveType::Rp03), Head::LAST)
    );
}
