//! Scenario tests which drive the controller through its registers,
//! in the way a program running on the simulated machine would.
use core::time::Duration;

use base::prelude::*;
use test_strategy::proptest;

use crate::{
    seek_delay, Access, ControlStatus, ControllerConfig, DiskAddress, DriveStatus,
    DriveType, ErrorBits, Fault, Function, MemoryStore, OperationKind, RegisterId, System,
    UnmappedAddress, SECTOR_BYTES, WORDS_PER_SECTOR,
};

const MEMORY_WORDS: usize = 16 * 1024;

fn rp03_pack() -> MemoryStore {
    MemoryStore::new(DriveType::Rp03.geometry().blocks())
}

fn system_with(pack: MemoryStore) -> System {
    let mut sys = System::new(ControllerConfig::default(), MEMORY_WORDS);
    sys.attach(unit!(0), Box::new(pack))
        .expect("unit 0 should not already be attached");
    sys
}

/// The RPWC value which requests a transfer of `words` words.
fn word_count(words: usize) -> Word {
    ((0x1_0000 - words) & 0xFFFF) as Word
}

fn set_up_transfer(
    sys: &mut System,
    cylinder: u16,
    track: u16,
    sector: u16,
    words: usize,
    ba: Word,
) {
    sys.write_register(RegisterId::Rpca, cylinder);
    sys.write_register(
        RegisterId::Rpda,
        DiskAddress::from_parts(track, sector).bits(),
    );
    sys.write_register(RegisterId::Rpwc, word_count(words));
    sys.write_register(RegisterId::Rpba, ba);
}

fn go_with(sys: &mut System, function: Function, unit: UnitNumber, flags: u16) {
    sys.write_register(
        RegisterId::Rpcs,
        ControlStatus::command(function, unit) | flags,
    );
}

fn go(sys: &mut System, function: Function, unit: UnitNumber) {
    go_with(sys, function, unit, 0);
}

fn errors(sys: &mut System) -> ErrorBits {
    ErrorBits::from_bits(sys.read_register(RegisterId::Rper))
}

fn control_status(sys: &mut System) -> ControlStatus {
    ControlStatus::from_bits(sys.read_register(RegisterId::Rpcs))
}

fn is_done(sys: &mut System) -> bool {
    control_status(sys).has(ControlStatus::DONE)
}

fn pattern(words: usize, seed: Word) -> Vec<Word> {
    (0..words)
        .map(|i| seed.wrapping_add((i as Word).wrapping_mul(0o401)))
        .collect()
}

#[test]
fn test_boot_seek() {
    let mut sys = system_with(rp03_pack());
    sys.write_register(RegisterId::Rpca, 100);
    go(&mut sys, Function::Seek, unit!(0));

    assert!(!is_done(&mut sys), "DONE should stay clear during the seek");
    let ds = DriveStatus::from_bits(sys.read_register(RegisterId::Rpds));
    assert!(ds.has(DriveStatus::SEEKING));
    assert!(!ds.has(DriveStatus::READY));
    assert_eq!(sys.pending_events(), 1);
    let due = sys.next_event_due().expect("a seek should be scheduled");
    assert_eq!(due, seek_delay(OperationKind::Seek, 100, DriveType::Rp03));
    assert_eq!(due, Duration::from_millis(29));

    assert_eq!(sys.run_until_idle(), due);
    assert!(is_done(&mut sys));
    let ds = DriveStatus::from_bits(sys.read_register(RegisterId::Rpds));
    assert_eq!(ds.attention(), 1);
    for bit in [DriveStatus::READY, DriveStatus::ONLINE, DriveStatus::RP03] {
        assert!(ds.has(bit), "{ds} should include {bit:06o}");
    }
    assert!(!ds.has(DriveStatus::SEEKING));
    assert_eq!(sys.read_register(RegisterId::Suca), 100);
    assert_eq!(errors(&mut sys), ErrorBits::NONE);
}

#[test]
fn test_out_of_range_sector_completes_at_once() {
    let mut sys = system_with(rp03_pack());
    set_up_transfer(&mut sys, 0, 0, 10, 256, 0);
    go(&mut sys, Function::Read, unit!(0));

    assert!(is_done(&mut sys));
    assert_eq!(errors(&mut sys), ErrorBits::NON_EXISTENT_SECTOR);
    assert_eq!(sys.pending_events(), 0);
    assert_eq!(sys.read_register(RegisterId::Rpwc), word_count(256));
    let cs = control_status(&mut sys);
    assert!(cs.has(ControlStatus::ERR) && cs.has(ControlStatus::HARD_ERR));
}

#[test]
fn test_overrun() {
    let mut pack = rp03_pack();
    let end = pack.words().len();
    let data = pattern(2 * WORDS_PER_SECTOR, 0o1000);
    pack.words_mut()[end - data.len()..].copy_from_slice(&data);
    let mut sys = system_with(pack);

    // Two sectors remain after cylinder 405, head 19, sector 8, but
    // we ask for four.
    set_up_transfer(&mut sys, 405, 19, 8, 4 * WORDS_PER_SECTOR, 0);
    go(&mut sys, Function::Read, unit!(0));
    sys.run_until_idle();

    assert!(is_done(&mut sys));
    assert_eq!(errors(&mut sys), ErrorBits::PACK_OVERRUN);
    assert_eq!(
        sys.read_register(RegisterId::Rpwc),
        word_count(2 * WORDS_PER_SECTOR)
    );
    assert_eq!(sys.read_register(RegisterId::Rpba), 2 * 512);
    assert_eq!(sys.memory().slice(BusAddress::ZERO, data.len()), &data[..]);
    assert_eq!(sys.memory().get(bus_addr!(1024)), Some(0));
    // The heads are left on the last track.
    assert_eq!(sys.controller().cylinder(unit!(0)).value(), 405);
    assert_eq!(sys.controller().head(unit!(0)).value(), 19);
    let cs = control_status(&mut sys);
    assert!(cs.has(ControlStatus::ERR));
    assert!(!cs.has(ControlStatus::HARD_ERR), "overrun is a soft error");
}

#[test]
fn test_go_while_busy_is_a_programming_error() {
    for code in 1..8 {
        let function = Function::from_code(code);
        let mut sys = system_with(rp03_pack());
        set_up_transfer(&mut sys, 100, 0, 0, 256, 0o1000);
        go(&mut sys, Function::Seek, unit!(0));
        let before = sys.snapshot();

        go(&mut sys, function, unit!(0));
        assert!(
            errors(&mut sys).contains(ErrorBits::PROGRAMMING),
            "{function} while busy should set PGE"
        );
        assert_eq!(sys.pending_events(), 1);
        let after = sys.snapshot();
        assert_eq!(after.rpwc, before.rpwc);
        assert_eq!(after.rpba, before.rpba);

        sys.run_until_idle();
        assert_eq!(sys.controller().cylinder(unit!(0)).value(), 100);
        assert_eq!(sys.read_register(RegisterId::Rpwc), before.rpwc);
        assert!(errors(&mut sys).contains(ErrorBits::PROGRAMMING));
    }
}

#[test]
fn test_changing_drive_while_busy_is_a_programming_error() {
    let mut sys = system_with(rp03_pack());
    sys.write_register(RegisterId::Rpca, 50);
    go(&mut sys, Function::Seek, unit!(0));
    // Select drive 1 without GO.
    sys.write_register(RegisterId::Rpcs, 1 << 8);
    assert!(errors(&mut sys).contains(ErrorBits::PROGRAMMING));
}

#[test]
fn test_write_locked_drive_rejects_writes_at_once() {
    let mut sys = system_with(rp03_pack());
    sys.controller_mut()
        .set_write_locked(unit!(0), true)
        .expect("a memory pack can be locked");
    set_up_transfer(&mut sys, 10, 2, 3, 256, 0);
    go(&mut sys, Function::Write, unit!(0));

    assert!(is_done(&mut sys));
    assert_eq!(errors(&mut sys), ErrorBits::WRITE_PROTECT_VIOLATION);
    assert_eq!(sys.pending_events(), 0);
    let ds = DriveStatus::from_bits(sys.read_register(RegisterId::Rpds));
    assert!(ds.has(DriveStatus::WRITE_LOCKED));
}

#[test]
fn test_read_only_image_cannot_be_write_enabled() {
    let mut sys = system_with(rp03_pack().read_only());
    assert!(sys.controller().is_write_locked(unit!(0)));
    assert!(sys
        .controller_mut()
        .set_write_locked(unit!(0), false)
        .is_err());
}

#[test]
fn test_go_on_unattached_drive() {
    let mut sys = system_with(rp03_pack());
    set_up_transfer(&mut sys, 0, 0, 0, 256, 0);
    go(&mut sys, Function::Read, unit!(3));
    assert!(is_done(&mut sys));
    assert_eq!(errors(&mut sys), ErrorBits::PROGRAMMING);
    assert_eq!(sys.pending_events(), 0);
    let ds = DriveStatus::from_bits(sys.read_register(RegisterId::Rpds));
    assert!(!ds.has(DriveStatus::ONLINE));
}

#[proptest]
fn write_then_read_returns_the_same_data(
    #[strategy(0..406u16)] cylinder: u16,
    #[strategy(0..20u16)] head: u16,
    #[strategy(0..10u16)] sector: u16,
    #[strategy(1..=4096usize)] words: usize,
    seed: u16,
) {
    let geometry = DriveType::Rp03.geometry();
    let block = (u32::from(cylinder) * 20 + u32::from(head)) * 10 + u32::from(sector);
    let remaining = (geometry.blocks() - block) as usize * WORDS_PER_SECTOR;
    let words = words.min(remaining);
    let data = pattern(words, seed);
    let mut sys = system_with(rp03_pack());
    sys.memory_mut().load(BusAddress::ZERO, &data);

    set_up_transfer(&mut sys, cylinder, head, sector, words, 0);
    go(&mut sys, Function::Write, unit!(0));
    sys.run_until_idle();
    assert_eq!(errors(&mut sys), ErrorBits::NONE);

    // Read it back into a different part of memory.
    let elsewhere: Word = 0o40000;
    set_up_transfer(&mut sys, cylinder, head, sector, words, elsewhere);
    go(&mut sys, Function::Read, unit!(0));
    sys.run_until_idle();
    assert_eq!(errors(&mut sys), ErrorBits::NONE);
    assert_eq!(sys.read_register(RegisterId::Rpwc), 0);
    assert_eq!(
        sys.memory().slice(BusAddress::from(elsewhere), words),
        &data[..]
    );
}

#[proptest]
fn word_count_tracks_words_transferred(
    #[strategy(400..406u16)] cylinder: u16,
    #[strategy(0..20u16)] head: u16,
    #[strategy(1..=8192usize)] words: usize,
    read: bool,
) {
    // Small memory and a start near the end of the pack, so that
    // some transfers stop early.
    let mut sys = System::new(ControllerConfig::default(), 4096);
    sys.attach(unit!(0), Box::new(rp03_pack()))
        .expect("unit 0 should not already be attached");
    set_up_transfer(&mut sys, cylinder, head, 0, words, 0);
    let before = sys.read_register(RegisterId::Rpwc);
    go(
        &mut sys,
        if read { Function::Read } else { Function::Write },
        unit!(0),
    );
    sys.run_until_idle();

    let transferred = sys.read_register(RegisterId::Rpwc).wrapping_sub(before);
    let ba = sys.read_register(RegisterId::Rpba);
    assert_eq!(u32::from(ba), 2 * u32::from(transferred));
    assert!(usize::from(transferred) <= words);
    let e = errors(&mut sys);
    if usize::from(transferred) < words {
        assert!(
            e.intersects(ErrorBits::PACK_OVERRUN | ErrorBits::NON_EXISTENT_MEMORY),
            "short transfer without a reason: {e}"
        );
    } else {
        assert_eq!(e, ErrorBits::NONE);
    }
}

#[test]
fn test_odd_word_counts() {
    let mut pack = rp03_pack();
    pack.words_mut()[..WORDS_PER_SECTOR].fill(0o1234);
    let mut sys = system_with(pack);
    sys.memory_mut().set(bus_addr!(6), 0o777);

    set_up_transfer(&mut sys, 0, 0, 0, 3, 0);
    go(&mut sys, Function::Read, unit!(0));
    sys.run_until_idle();
    assert_eq!(errors(&mut sys), ErrorBits::NONE);
    assert_eq!(sys.read_register(RegisterId::Rpwc), 0);
    assert_eq!(sys.read_register(RegisterId::Rpba), 6);
    assert_eq!(sys.memory().slice(BusAddress::ZERO, 4), &[0o1234, 0o1234, 0o1234, 0o777]);

    // An odd-length write pads the sector with zeroes.
    sys.memory_mut().load(BusAddress::ZERO, &[1, 2, 3]);
    set_up_transfer(&mut sys, 0, 0, 0, 3, 0);
    go(&mut sys, Function::Write, unit!(0));
    sys.run_until_idle();
    assert_eq!(errors(&mut sys), ErrorBits::NONE);

    set_up_transfer(&mut sys, 0, 0, 0, WORDS_PER_SECTOR, 0o10000);
    go(&mut sys, Function::Read, unit!(0));
    sys.run_until_idle();
    let back = sys.memory().slice(bus_addr!(0o10000), WORDS_PER_SECTOR);
    assert_eq!(&back[..3], &[1, 2, 3]);
    assert!(back[3..].iter().all(|w| *w == 0));
}

#[test]
fn test_nxm_hides_disk_error_on_read() {
    let mut pack = rp03_pack();
    pack.inject_fault(1, Fault::IoError);
    let mut sys = System::new(ControllerConfig::default(), 100);
    sys.attach(unit!(0), Box::new(pack))
        .expect("unit 0 should not already be attached");

    set_up_transfer(&mut sys, 0, 0, 0, 512, 0);
    go(&mut sys, Function::Read, unit!(0));
    sys.run_until_idle();
    assert_eq!(errors(&mut sys), ErrorBits::NON_EXISTENT_MEMORY);
    assert_eq!(sys.read_register(RegisterId::Rpwc), word_count(412));
}

#[test]
fn test_transfer_starting_beyond_memory() {
    for function in [Function::Read, Function::Write, Function::WriteCheck] {
        let mut sys = System::new(ControllerConfig::default(), 100);
        sys.attach(unit!(0), Box::new(rp03_pack()))
            .expect("unit 0 should not already be attached");

        // Word 256 is well past the end of a 100-word memory.
        set_up_transfer(&mut sys, 0, 0, 0, 256, 0o1000);
        go(&mut sys, function, unit!(0));
        sys.run_until_idle();
        assert!(is_done(&mut sys), "{function} did not finish");
        assert_eq!(errors(&mut sys), ErrorBits::NON_EXISTENT_MEMORY, "{function}");
        assert_eq!(sys.read_register(RegisterId::Rpwc), word_count(256), "{function}");
        assert_eq!(sys.read_register(RegisterId::Rpba), 0o1000, "{function}");
    }
}

#[test]
fn test_disk_error_on_read_is_a_format_error() {
    let mut pack = rp03_pack();
    pack.inject_fault(1, Fault::IoError);
    let mut sys = system_with(pack);

    set_up_transfer(&mut sys, 0, 0, 0, 512, 0);
    go(&mut sys, Function::Read, unit!(0));
    sys.run_until_idle();
    assert_eq!(errors(&mut sys), ErrorBits::FORMAT);
    assert_eq!(sys.read_register(RegisterId::Rpwc), word_count(256));

    set_up_transfer(&mut sys, 0, 0, 0, 512, 0);
    go(&mut sys, Function::WriteCheck, unit!(0));
    sys.run_until_idle();
    assert_eq!(errors(&mut sys), ErrorBits::FORMAT | ErrorBits::WRITE_CHECK);
}

#[test]
fn test_short_write_is_a_format_error() {
    let mut pack = rp03_pack();
    pack.inject_fault(1, Fault::Short);
    let mut sys = system_with(pack);
    sys.memory_mut()
        .load(BusAddress::ZERO, &pattern(512, 0o17));

    set_up_transfer(&mut sys, 0, 0, 0, 512, 0);
    go(&mut sys, Function::Write, unit!(0));
    sys.run_until_idle();
    assert_eq!(errors(&mut sys), ErrorBits::FORMAT);
    assert_eq!(sys.read_register(RegisterId::Rpwc), word_count(256));
    let cs = control_status(&mut sys);
    assert!(!cs.has(ControlStatus::HARD_ERR));
}

#[test]
fn test_write_stores_what_memory_held_before_nxm() {
    let mut sys = System::new(ControllerConfig::default(), 300);
    sys.attach(unit!(0), Box::new(rp03_pack()))
        .expect("unit 0 should not already be attached");
    set_up_transfer(&mut sys, 0, 0, 0, 512, 0);
    go(&mut sys, Function::Write, unit!(0));
    sys.run_until_idle();
    assert_eq!(errors(&mut sys), ErrorBits::NON_EXISTENT_MEMORY);
    assert_eq!(sys.read_register(RegisterId::Rpwc), word_count(212));
}

#[test]
fn test_write_check() {
    let mut sys = system_with(rp03_pack());
    let data = pattern(WORDS_PER_SECTOR, 0o52525);
    sys.memory_mut().load(BusAddress::ZERO, &data);
    set_up_transfer(&mut sys, 7, 1, 2, WORDS_PER_SECTOR, 0);
    go(&mut sys, Function::Write, unit!(0));
    sys.run_until_idle();
    assert_eq!(errors(&mut sys), ErrorBits::NONE);

    set_up_transfer(&mut sys, 7, 1, 2, WORDS_PER_SECTOR, 0);
    go(&mut sys, Function::WriteCheck, unit!(0));
    sys.run_until_idle();
    assert_eq!(errors(&mut sys), ErrorBits::NONE);
    // A write check does not change memory.
    assert_eq!(sys.memory().slice(BusAddress::ZERO, data.len()), &data[..]);

    sys.memory_mut().set(bus_addr!(20), 0);
    set_up_transfer(&mut sys, 7, 1, 2, WORDS_PER_SECTOR, 0);
    go(&mut sys, Function::WriteCheck, unit!(0));
    sys.run_until_idle();
    assert_eq!(errors(&mut sys), ErrorBits::WRITE_CHECK);
}

#[test]
fn test_detach_during_seek() {
    let mut sys = system_with(rp03_pack());
    sys.write_register(RegisterId::Rpca, 200);
    go(&mut sys, Function::Seek, unit!(0));
    let store = sys.detach(unit!(0)).expect("unit 0 is attached");
    assert_eq!(store.name(), "memory");

    assert!(is_done(&mut sys));
    assert_eq!(errors(&mut sys), ErrorBits::NONE);
    assert_eq!(sys.pending_events(), 0);
    assert_eq!(sys.read_register(RegisterId::Suca), 0);
    let ds = DriveStatus::from_bits(sys.read_register(RegisterId::Rpds));
    assert_eq!(ds.attention(), 1);
    assert!(!ds.has(DriveStatus::ONLINE));
}

#[test]
fn test_detach_during_transfer() {
    let mut sys = system_with(rp03_pack());
    set_up_transfer(&mut sys, 3, 0, 0, 256, 0);
    go(&mut sys, Function::Read, unit!(0));
    sys.detach(unit!(0)).expect("unit 0 is attached");

    assert!(is_done(&mut sys));
    assert_eq!(errors(&mut sys), ErrorBits::TIMING);
    assert_eq!(sys.pending_events(), 0);
    assert_eq!(sys.read_register(RegisterId::Rpwc), word_count(256));
    assert!(sys.detach(unit!(0)).is_err());
}

#[test]
fn test_byte_writes() {
    let mut sys = system_with(rp03_pack());
    sys.write_register(RegisterId::Rpwc, 0xA72E);
    sys.write(bus_addr!(0o776_716), 0x1FF, Access::Byte)
        .expect("RPWC is mapped");
    assert_eq!(sys.read_register(RegisterId::Rpwc), 0xA7FF);
    sys.write(bus_addr!(0o776_717), 0x12, Access::Byte)
        .expect("RPWC is mapped");
    assert_eq!(sys.read_register(RegisterId::Rpwc), 0x12FF);

    // RPBA addresses words.
    sys.write(bus_addr!(0o776_720), 0o1001, Access::Word)
        .expect("RPBA is mapped");
    assert_eq!(sys.read(bus_addr!(0o776_720)), Ok(0o1000));

    // The high byte of RPDS is not writable.
    sys.write(bus_addr!(0o776_711), 0o377, Access::Byte)
        .expect("RPDS is mapped");
    assert_eq!(sys.read_register(RegisterId::Rper), 0);
}

#[test]
fn test_unmapped_addresses() {
    let mut sys = System::default();
    assert_eq!(
        sys.read(bus_addr!(0o776_740)),
        Err(UnmappedAddress(bus_addr!(0o776_740)))
    );
    assert_eq!(
        sys.write(bus_addr!(0o776_706), 0, Access::Word),
        Err(UnmappedAddress(bus_addr!(0o776_706)))
    );
    // The unimplemented registers read as zero.
    assert_eq!(sys.read(bus_addr!(0o776_736)), Ok(0));
}

#[test]
fn test_write_lockout() {
    let mut sys = system_with(rp03_pack());
    sys.attach(unit!(2), Box::new(rp03_pack()))
        .expect("unit 2 should not already be attached");
    sys.controller_mut()
        .set_protect("on;0407")
        .expect("valid protect setting");

    // Drives 0 and 1 are protected entirely.
    set_up_transfer(&mut sys, 300, 0, 0, 256, 0);
    go(&mut sys, Function::Write, unit!(0));
    assert_eq!(errors(&mut sys), ErrorBits::WRITE_PROTECT_VIOLATION);
    assert_eq!(sys.pending_events(), 0);

    // Other drives are protected up to cylinder 15.
    set_up_transfer(&mut sys, 15, 0, 0, 256, 0);
    go(&mut sys, Function::Write, unit!(2));
    assert_eq!(errors(&mut sys), ErrorBits::WRITE_PROTECT_VIOLATION);

    set_up_transfer(&mut sys, 16, 0, 0, 256, 0);
    go(&mut sys, Function::Write, unit!(2));
    sys.run_until_idle();
    assert_eq!(errors(&mut sys), ErrorBits::NONE);

    // Reads are never locked out.
    set_up_transfer(&mut sys, 0, 0, 0, 256, 0);
    go(&mut sys, Function::Read, unit!(0));
    sys.run_until_idle();
    assert_eq!(errors(&mut sys), ErrorBits::NONE);

    sys.controller_mut()
        .set_protect("OFF")
        .expect("valid protect setting");
    set_up_transfer(&mut sys, 0, 0, 0, 256, 0);
    go(&mut sys, Function::Write, unit!(0));
    sys.run_until_idle();
    assert_eq!(errors(&mut sys), ErrorBits::NONE);
}

#[test]
fn test_autosize() {
    let rp02_bytes = u64::from(DriveType::Rp02.geometry().blocks()) * SECTOR_BYTES as u64;
    let image = tempfile::NamedTempFile::new().expect("temporary file");
    image
        .as_file()
        .set_len(rp02_bytes)
        .expect("temporary file can be extended");
    let other = tempfile::NamedTempFile::new().expect("temporary file");
    other
        .as_file()
        .set_len(rp02_bytes)
        .expect("temporary file can be extended");
    let empty = tempfile::NamedTempFile::new().expect("temporary file");

    let mut sys = System::default();
    sys.attach_file(unit!(1), image.path(), false)
        .expect("image should attach");
    assert_eq!(sys.controller().drive_type(unit!(1)), DriveType::Rp02);

    sys.controller_mut().set_autosize(unit!(2), false);
    sys.attach_file(unit!(2), other.path(), false)
        .expect("image should attach");
    assert_eq!(sys.controller().drive_type(unit!(2)), DriveType::Rp03);

    sys.attach_file(unit!(3), empty.path(), true)
        .expect("image should attach");
    assert_eq!(sys.controller().drive_type(unit!(3)), DriveType::Rp03);
    assert!(sys.controller().is_write_locked(unit!(3)));

    assert!(sys
        .controller_mut()
        .set_drive_type(unit!(1), DriveType::Rp03)
        .is_err());
}

#[test]
fn test_header_read() {
    let mut sys = system_with(rp03_pack());
    set_up_transfer(&mut sys, 5, 3, 7, 3, 0);
    go_with(
        &mut sys,
        Function::Read,
        unit!(0),
        ControlStatus::HEADER | ControlStatus::MODE,
    );
    sys.run_until_idle();
    assert_eq!(errors(&mut sys), ErrorBits::NONE);
    assert_eq!(
        sys.memory().slice(BusAddress::ZERO, 3),
        &[0, (5 << 6) | (3 << 1), 7]
    );
}

#[test]
fn test_header_write_consumes_records() {
    let mut sys = system_with(rp03_pack());
    set_up_transfer(&mut sys, 5, 3, 0, 6, 0);
    go_with(
        &mut sys,
        Function::Write,
        unit!(0),
        ControlStatus::HEADER | ControlStatus::MODE,
    );
    sys.run_until_idle();
    assert_eq!(errors(&mut sys), ErrorBits::NONE);
    assert_eq!(sys.read_register(RegisterId::Rpwc), 0);
    assert_eq!(sys.read_register(RegisterId::Rpba), 12);

    // Header operations need 18-bit mode.
    set_up_transfer(&mut sys, 5, 3, 0, 3, 0);
    go_with(&mut sys, Function::Read, unit!(0), ControlStatus::HEADER);
    assert_eq!(errors(&mut sys), ErrorBits::MODE);
}

#[test]
fn test_done_interrupt() {
    let mut sys = system_with(rp03_pack());
    assert!(!sys.interrupt_pending());
    // Enabling interrupts while DONE is set interrupts at once.
    sys.write_register(RegisterId::Rpcs, ControlStatus::INTERRUPT_ENABLE);
    assert!(sys.interrupt_pending());
    assert_eq!(sys.acknowledge(), Some(0o254));
    assert!(!sys.interrupt_pending());
    assert_eq!(sys.acknowledge(), None);

    set_up_transfer(&mut sys, 1, 0, 0, 256, 0);
    go_with(
        &mut sys,
        Function::Read,
        unit!(0),
        ControlStatus::INTERRUPT_ENABLE,
    );
    assert!(!sys.interrupt_pending());
    sys.run_until_idle();
    assert!(sys.interrupt_pending());

    // Turning off both enables drops the request.
    sys.write_register(RegisterId::Rpcs, 0);
    assert!(!sys.interrupt_pending());
}

#[test]
fn test_attention_interrupt() {
    let mut sys = system_with(rp03_pack());
    sys.write_register(RegisterId::Rpca, 20);
    go_with(
        &mut sys,
        Function::Seek,
        unit!(0),
        ControlStatus::ATTENTION_INTERRUPT_ENABLE,
    );
    assert!(!sys.interrupt_pending());
    sys.run_until_idle();
    assert!(sys.interrupt_pending());
    assert_eq!(sys.acknowledge(), Some(0o254));
    // The attention interrupt enable is one-shot.
    assert!(!control_status(&mut sys).has(ControlStatus::ATTENTION_INTERRUPT_ENABLE));

    // Writing 1 to an attention bit clears it.
    sys.write_register(RegisterId::Rpds, 1);
    let ds = DriveStatus::from_bits(sys.read_register(RegisterId::Rpds));
    assert_eq!(ds.attention(), 0);
}

#[test]
fn test_reset_function() {
    let mut sys = system_with(rp03_pack());
    sys.write_register(RegisterId::Rpca, 300);
    go_with(
        &mut sys,
        Function::Seek,
        unit!(0),
        ControlStatus::INTERRUPT_ENABLE,
    );
    assert!(!is_done(&mut sys));

    go(&mut sys, Function::Reset, unit!(0));
    assert!(is_done(&mut sys));
    assert_eq!(sys.pending_events(), 0);
    assert_eq!(errors(&mut sys), ErrorBits::NONE);
    assert!(!sys.interrupt_pending());
    assert_eq!(sys.controller().cylinder(unit!(0)).value(), 0);
    assert_eq!(sys.read_register(RegisterId::Rpca), 0);
    assert!(!sys.controller().is_seeking(unit!(0)));
}

#[test]
fn test_reset_needs_go() {
    let mut sys = system_with(rp03_pack());
    sys.write_register(RegisterId::Rpwc, 1234);
    sys.write_register(RegisterId::Rpca, 55);
    // Function code 0 is RESET, but without GO nothing happens.
    sys.write_register(RegisterId::Rpcs, 0);
    assert_eq!(sys.read_register(RegisterId::Rpwc), 1234);
    sys.write_register(RegisterId::Rpcs, ControlStatus::INTERRUPT_ENABLE);
    assert_eq!(sys.read_register(RegisterId::Rpwc), 1234);
    assert_eq!(sys.read_register(RegisterId::Rpca), 55);
    assert!(control_status(&mut sys).has(ControlStatus::INTERRUPT_ENABLE));

    go(&mut sys, Function::Reset, unit!(0));
    assert_eq!(sys.read_register(RegisterId::Rpwc), 0);
    assert_eq!(sys.read_register(RegisterId::Rpca), 0);
}

#[test]
fn test_device_reset() {
    let mut sys = system_with(rp03_pack());
    set_up_transfer(&mut sys, 10, 0, 0, 256, 0);
    go(&mut sys, Function::Read, unit!(0));
    sys.reset();
    assert!(is_done(&mut sys));
    assert_eq!(sys.pending_events(), 0);
    assert_eq!(sys.read_register(RegisterId::Rpwc), 0);
    assert_eq!(sys.controller().cylinder(unit!(0)).value(), 0);
}

#[test]
fn test_no_seek_read_leaves_heads_alone() {
    let mut sys = system_with(rp03_pack());
    sys.write_register(RegisterId::Rpca, 40);
    sys.write_register(RegisterId::Rpda, DiskAddress::from_parts(6, 0).bits());
    go(&mut sys, Function::Seek, unit!(0));
    sys.run_until_idle();
    sys.write_register(RegisterId::Rpds, DriveStatus::ATTENTION);

    // Ask for the disk address of a different cylinder; a no-seek
    // read ignores it.
    set_up_transfer(&mut sys, 90, 1, 0, 256, 0);
    go(&mut sys, Function::ReadNoSeek, unit!(0));
    sys.run_until_idle();
    assert_eq!(errors(&mut sys), ErrorBits::NONE);
    assert_eq!(sys.controller().cylinder(unit!(0)).value(), 40);
    let ds = DriveStatus::from_bits(sys.read_register(RegisterId::Rpds));
    assert_eq!(ds.attention(), 0);
}

/// Put the heads of unit 0 over `cylinder` and `track`, and clear the
/// attention bit the seek leaves behind.
fn position_heads(sys: &mut System, cylinder: u16, track: u16) {
    sys.write_register(RegisterId::Rpca, cylinder);
    sys.write_register(RegisterId::Rpda, DiskAddress::from_parts(track, 0).bits());
    go(sys, Function::Seek, unit!(0));
    sys.run_until_idle();
    assert_eq!(errors(sys), ErrorBits::NONE);
    sys.write_register(RegisterId::Rpds, DriveStatus::ATTENTION);
}

fn attention(sys: &mut System) -> u8 {
    DriveStatus::from_bits(sys.read_register(RegisterId::Rpds)).attention()
}

#[test]
fn test_no_seek_read_crossing_a_cylinder_raises_attention() {
    let mut sys = system_with(rp03_pack());
    position_heads(&mut sys, 0, 19);

    // The last sector of cylinder 0 and the first of cylinder 1.
    set_up_transfer(&mut sys, 0, 0, 9, 512, 0);
    go(&mut sys, Function::ReadNoSeek, unit!(0));
    sys.run_until_idle();
    assert_eq!(errors(&mut sys), ErrorBits::NONE);
    assert_eq!(attention(&mut sys), 1);
    assert_eq!(sys.controller().cylinder(unit!(0)).value(), 1);
    assert_eq!(sys.read_register(RegisterId::Suca), 1);
    assert!(!sys.interrupt_pending());
}

#[test]
fn test_no_seek_write_crossing_a_cylinder_interrupts() {
    let mut sys = system_with(rp03_pack());
    position_heads(&mut sys, 0, 19);

    set_up_transfer(&mut sys, 0, 0, 9, 512, 0);
    go_with(
        &mut sys,
        Function::WriteNoSeek,
        unit!(0),
        ControlStatus::ATTENTION_INTERRUPT_ENABLE,
    );
    assert!(!sys.interrupt_pending());
    sys.run_until_idle();
    assert_eq!(errors(&mut sys), ErrorBits::NONE);
    assert_eq!(attention(&mut sys), 1);
    assert_eq!(sys.controller().cylinder(unit!(0)).value(), 1);
    assert!(sys.interrupt_pending());
}

#[test]
fn test_no_seek_overrun_raises_attention() {
    for flags in [0, ControlStatus::ATTENTION_INTERRUPT_ENABLE] {
        let mut sys = system_with(rp03_pack());
        position_heads(&mut sys, 405, 19);

        // Only two sectors remain on the pack.
        set_up_transfer(&mut sys, 0, 0, 8, 1024, 0);
        go_with(&mut sys, Function::ReadNoSeek, unit!(0), flags);
        sys.run_until_idle();
        assert_eq!(errors(&mut sys), ErrorBits::PACK_OVERRUN);
        assert_eq!(sys.read_register(RegisterId::Rpwc), word_count(512));
        assert_eq!(attention(&mut sys), 1);
        assert_eq!(sys.controller().cylinder(unit!(0)).value(), 405);
        assert_eq!(sys.interrupt_pending(), flags != 0);
    }
}

#[test]
fn test_sector_under_the_heads() {
    let mut sys = System::default();
    sys.advance_to(Duration::from_micros(2500));
    let da = DiskAddress::from_bits(sys.read_register(RegisterId::Rpda));
    assert_eq!(da.sector_on_track(), 1);
    // One revolution later it is back at sector 0.
    sys.advance_to(Duration::from_millis(25));
    let da = DiskAddress::from_bits(sys.read_register(RegisterId::Rpda));
    assert_eq!(da.sector_on_track(), 0);
}

#[test]
fn test_snapshot_display() {
    let mut sys = system_with(rp03_pack());
    let text = sys.snapshot().to_string();
    assert!(text.contains("RPCS"), "unexpected snapshot text: {text}");
}
