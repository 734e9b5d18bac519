//! How long things take.
//!
//! Drive timings are quoted in tenths of a millisecond.  The delays we
//! hand to the scheduler are [`Duration`]s computed exactly from those
//! figures.
use core::time::Duration;

use super::drive::{Cylinder, DriveType, SECTORS_PER_TRACK};

/// A time interval in units of 0.1ms.
pub type Tenths = u32;

/// Half a revolution of the pack (the pack turns at 2400 RPM).
pub const ROTATIONAL_LATENCY: Tenths = 125;

/// What the drive has to do before the operation completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Return to cylinder 0.
    Home,
    /// Move the heads without transferring data.
    Seek,
    /// Move the heads and then transfer data; the transfer cannot
    /// begin until the right sector comes round.
    Transfer,
}

pub(crate) fn tenths_to_duration(t: Tenths) -> Duration {
    Duration::from_micros(u64::from(t) * 100)
}

/// The delay, in tenths of a millisecond, for an operation which
/// moves the heads across `distance` cylinders.
pub fn seek_tenths(kind: OperationKind, distance: u16, drive_type: DriveType) -> Tenths {
    let g = drive_type.geometry();
    let distance = u32::from(distance);
    let seek = if kind == OperationKind::Home {
        g.seek_average / 2
    } else if distance == 0 {
        g.seek_one_track / 2
    } else if distance <= 2 {
        distance * g.seek_one_track
    } else if distance <= (3 * u32::from(g.cylinders)) / 4 {
        g.seek_average
    } else {
        g.seek_max
    };
    match kind {
        OperationKind::Transfer => seek + ROTATIONAL_LATENCY,
        OperationKind::Home | OperationKind::Seek => seek,
    }
}

/// The delay for an operation which moves the heads across
/// `distance` cylinders.
pub fn seek_delay(kind: OperationKind, distance: u16, drive_type: DriveType) -> Duration {
    tenths_to_duration(seek_tenths(kind, distance, drive_type))
}

pub(crate) fn delay_between(
    kind: OperationKind,
    from: Cylinder,
    to: Cylinder,
    drive_type: DriveType,
) -> Duration {
    seek_delay(kind, from.distance(to), drive_type)
}

/// The sector passing under the heads at time `now`.  All drives
/// are assumed to turn in step, starting at sector 0 at time zero.
pub(crate) fn sector_under_heads(now: Duration) -> u16 {
    let revolution = tenths_to_duration(2 * ROTATIONAL_LATENCY).as_micros();
    let sector_time = revolution / u128::from(SECTORS_PER_TRACK);
    // The remainder is always less than SECTORS_PER_TRACK.
    ((now.as_micros() / sector_time) % u128::from(SECTORS_PER_TRACK)) as u16
}

#[test]
fn test_seek_tiers_rp03() {
    let t = |kind, d| seek_tenths(kind, d, DriveType::Rp03);
    assert_eq!(t(OperationKind::Seek, 0), 37);
    assert_eq!(t(OperationKind::Seek, 1), 75);
    assert_eq!(t(OperationKind::Seek, 2), 150);
    assert_eq!(t(OperationKind::Seek, 3), 290);
    assert_eq!(t(OperationKind::Seek, 304), 290);
    assert_eq!(t(OperationKind::Seek, 305), 550);
    assert_eq!(t(OperationKind::Home, 300), 145);
    assert_eq!(t(OperationKind::Transfer, 3), 290 + 125);
}

#[test]
fn test_seek_tiers_rp02() {
    let t = |kind, d| seek_tenths(kind, d, DriveType::Rp02);
    assert_eq!(t(OperationKind::Seek, 0), 100);
    assert_eq!(t(OperationKind::Seek, 2), 400);
    // 3 * 203 / 4 == 152
    assert_eq!(t(OperationKind::Seek, 152), 500);
    assert_eq!(t(OperationKind::Seek, 153), 800);
}

#[test]
fn test_delay_is_exact() {
    assert_eq!(
        seek_delay(OperationKind::Seek, 100, DriveType::Rp03),
        Duration::from_millis(29)
    );
    assert_eq!(
        seek_delay(OperationKind::Seek, 0, DriveType::Rp03),
        Duration::from_micros(3700)
    );
}

#[test]
fn test_sector_under_heads() {
    assert_eq!(sector_under_heads(Duration::ZERO), 0);
    assert_eq!(sector_under_heads(Duration::from_micros(2_499)), 0);
    assert_eq!(sector_under_heads(Duration::from_micros(2_500)), 1);
    assert_eq!(sector_under_heads(Duration::from_millis(24)), 9);
    assert_eq!(sector_under_heads(Duration::from_millis(25)), 0);
}

#[cfg(test)]
mod proptests {
    use super::*;
    use test_strategy::proptest;

    #[proptest]
    fn seek_delay_is_monotonic(drive_type: DriveType, #[strategy(0u16..405)] d: u16) {
        let here = seek_delay(OperationKind::Seek, d, drive_type);
        let further = seek_delay(OperationKind::Seek, d + 1, drive_type);
        assert!(here <= further, "{here:?} > {further:?} at distance {d}");
        assert!(seek_delay(OperationKind::Seek, 0, drive_type) < seek_delay(OperationKind::Seek, 1, drive_type));
    }

    #[proptest]
    fn home_ignores_distance(drive_type: DriveType, d: u16) {
        let g = drive_type.geometry();
        assert_eq!(
            seek_delay(OperationKind::Home, d, drive_type),
            tenths_to_duration(g.seek_average / 2)
        );
    }

    #[proptest]
    fn transfers_wait_for_rotation(drive_type: DriveType, d: u16) {
        assert_eq!(
            seek_delay(OperationKind::Transfer, d, drive_type),
            seek_delay(OperationKind::Seek, d, drive_type)
                + tenths_to_duration(ROTATIONAL_LATENCY)
        );
    }
}
