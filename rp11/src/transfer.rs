//! Completing an operation.
//!
//! This runs when the callback scheduled by `go` arrives.  A seek
//! just finishes; a transfer moves the data between the pack and
//! memory and then updates the registers to show how much was
//! actually moved.
//!
//! The real controller moves one word at a time, so it stops at the
//! first word which goes wrong.  We move whole sectors, so the order
//! in which errors are reported has to be worked out afterwards:
//!
//! - On a read, a memory (NXM) error wins over a disk I/O error,
//!   since the controller would have stopped at the bad address before
//!   the disk failed.  A disk error with no memory error is reported
//!   as a format error.
//! - On a write, the sectors we managed to fetch from memory are
//!   written even if memory ran out; a disk failure then counts as a
//!   format error and hides the memory error.
//! - Pack overrun means the transfer ran off the end of the pack with
//!   no other error.
use tracing::{event, span, Level};

use base::prelude::*;

use super::context::Context;
use super::controller::Controller;
use super::dispatch::header_errors;
use super::drive::{block_number, position_of_block, SECTORS_PER_TRACK, WORDS_PER_SECTOR};
use super::errors::{BackingStoreError, ErrorBits};
use super::host::{Host, HostMemory};
use super::registers::{ControlStatus, Function};
use super::store::BackingStore;

/// Number of words in a header record.
const HEADER_WORDS: usize = 3;

/// What happened while moving the data.
#[derive(Debug)]
struct Outcome {
    /// Words transferred.
    words: usize,
    /// Sectors (or, for header operations, header records) completed.
    sectors: usize,
    errors: ErrorBits,
    io_error: Option<BackingStoreError>,
}

fn octal_words(words: &[Word]) -> String {
    words
        .iter()
        .map(|w| format!("{w:06o}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Read `words` words starting at `block` into `buf` (the data
/// phase of READ, RDNOSEEK and WCHK).
fn read_pack(store: &mut dyn BackingStore, block: u32, buf: &mut [Word], words: usize) -> Outcome {
    let todo = words.div_ceil(WORDS_PER_SECTOR);
    let len = todo * WORDS_PER_SECTOR;
    let t = store.read_sectors(block, &mut buf[..len]);
    let got = t.sectors * WORDS_PER_SECTOR;
    match t.error {
        _ if t.sectors >= todo => Outcome {
            words,
            sectors: todo,
            errors: ErrorBits::NONE,
            io_error: None,
        },
        Some(e) => Outcome {
            words: got,
            sectors: t.sectors,
            errors: ErrorBits::NONE,
            io_error: Some(e),
        },
        None => {
            // The pack image is shorter than the drive; the rest
            // reads as zero.
            buf[got..len].fill(0);
            Outcome {
                words,
                sectors: t.sectors,
                errors: ErrorBits::NONE,
                io_error: None,
            }
        }
    }
}

/// Store (or, for WCHK, compare) the data which was read from the
/// pack.  Returns the number of words which reached memory and
/// whether memory ran out first.
fn deliver(
    memory: &mut dyn HostMemory,
    function: Function,
    start: BusAddress,
    data: &[Word],
    compare_data: bool,
) -> (usize, ErrorBits) {
    if function == Function::WriteCheck {
        let mut from_memory = vec![0; data.len()];
        let n = memory.read_words(start, &mut from_memory);
        let mut errors = ErrorBits::NONE;
        if n < data.len() {
            errors |= ErrorBits::NON_EXISTENT_MEMORY;
        }
        if compare_data && from_memory[..n] != data[..n] {
            errors |= ErrorBits::WRITE_CHECK;
        }
        (n, errors)
    } else {
        let n = memory.write_words(start, data);
        if n < data.len() {
            (n, ErrorBits::NON_EXISTENT_MEMORY)
        } else {
            (n, ErrorBits::NONE)
        }
    }
}

impl Controller {
    /// The callback requested by `go` has arrived for `unit`.
    pub fn service(&mut self, ctx: &Context, host: &mut Host, unit: UnitNumber) {
        let span = span!(Level::DEBUG, "service", unit = %unit);
        let _enter = span.enter();
        event!(Level::TRACE, "callback at {:?}", ctx.simulated_time);

        let drive = self.drive_mut(unit);
        drive.pending = None;
        if drive.seeking {
            self.seek_done(host, unit, false);
            self.set_done(host, ErrorBits::NONE);
            return;
        }
        let Some(function) = drive.function else {
            event!(Level::WARN, "no operation was in progress");
            return;
        };
        if !self.is_busy() {
            event!(Level::WARN, "{function} completed while the controller was idle");
            return;
        }
        let errors = self.transfer(host, unit, function);
        self.set_done(host, errors);
    }

    /// A seek has finished (or, if `cancelled`, been abandoned).
    pub(crate) fn seek_done(&mut self, host: &mut Host, unit: UnitNumber, cancelled: bool) {
        let cylinder = self.drive(unit).cylinder;
        if unit == self.regs.cs.unit() {
            self.regs.suca = if cancelled { 0 } else { cylinder.value() };
        }
        self.drive_mut(unit).seeking = false;
        event!(
            Level::DEBUG,
            "seek {} at cylinder {cylinder}",
            if cancelled { "cancelled" } else { "complete" }
        );
        self.raise_attention(host, unit);
    }

    /// Perform the data transfer for `function`, returning the errors
    /// to report.
    fn transfer(
        &mut self,
        host: &mut Host,
        unit: UnitNumber,
        function: Function,
    ) -> ErrorBits {
        // The registers may have changed since the operation started.
        let drive = self.drive(unit);
        if !drive.is_attached() {
            return ErrorBits::PROGRAMMING;
        }
        let sector = self.regs.da.sector();
        if sector >= SECTORS_PER_TRACK {
            return ErrorBits::NON_EXISTENT_SECTOR;
        }
        let (cylinder, head, drive_type) = (drive.cylinder, drive.head, drive.drive_type);
        let block = block_number(cylinder, head, sector);
        let cs = self.regs.cs;
        let requested = self.regs.words_remaining();
        let errors = header_errors(cs, function, requested);
        if !errors.is_empty() {
            return errors;
        }

        let header = cs.has(ControlStatus::HEADER);
        let available = (drive_type.geometry().blocks() - block) as usize;
        let limit = if !header {
            available * WORDS_PER_SECTOR
        } else if function.is_read() {
            HEADER_WORDS
        } else {
            available * HEADER_WORDS
        };
        let words = requested.min(limit);
        let start = self.regs.memory_address();

        let outcome = {
            let Controller { units, buffer, .. } = self;
            let Some(store) = units[usize::from(unit)].store.as_deref_mut() else {
                return ErrorBits::PROGRAMMING;
            };
            if function.is_read() {
                let pack = if header {
                    buffer[0] = 0;
                    buffer[1] = (cylinder.value() << 6) | (head.value() << 1);
                    buffer[2] = sector;
                    Outcome {
                        words,
                        sectors: 1,
                        errors: ErrorBits::NONE,
                        io_error: None,
                    }
                } else {
                    read_pack(store, block, buffer, words)
                };
                event!(
                    Level::TRACE,
                    "{function} block {block}: {}",
                    octal_words(&buffer[..pack.words.min(8)])
                );
                let (n, mut errors) = deliver(
                    &mut *host.memory,
                    function,
                    start,
                    &buffer[..pack.words],
                    pack.io_error.is_none(),
                );
                if !errors.contains(ErrorBits::NON_EXISTENT_MEMORY) && pack.io_error.is_some() {
                    errors |= ErrorBits::FORMAT;
                    if function == Function::WriteCheck {
                        errors |= ErrorBits::WRITE_CHECK;
                    }
                }
                Outcome {
                    words: n,
                    sectors: pack.sectors,
                    errors,
                    io_error: pack.io_error,
                }
            } else {
                let n = host.memory.read_words(start, &mut buffer[..words]);
                let nxm = n < words;
                if header || n == 0 {
                    // Formatting is not emulated, so header records
                    // are consumed but not stored.
                    Outcome {
                        words: n,
                        sectors: n / HEADER_WORDS,
                        errors: if nxm {
                            ErrorBits::NON_EXISTENT_MEMORY
                        } else {
                            ErrorBits::NONE
                        },
                        io_error: None,
                    }
                } else {
                    let padded = n.div_ceil(WORDS_PER_SECTOR) * WORDS_PER_SECTOR;
                    buffer[n..padded].fill(0);
                    event!(
                        Level::TRACE,
                        "{function} block {block}: {}",
                        octal_words(&buffer[..n.min(8)])
                    );
                    let todo = padded / WORDS_PER_SECTOR;
                    let t = store.write_sectors(block, &buffer[..padded]);
                    if t.sectors < todo {
                        Outcome {
                            words: t.sectors * WORDS_PER_SECTOR,
                            sectors: t.sectors,
                            errors: ErrorBits::FORMAT,
                            io_error: Some(t.error.unwrap_or(BackingStoreError::ShortWrite {
                                requested: todo,
                                completed: t.sectors,
                            })),
                        }
                    } else {
                        Outcome {
                            words: n,
                            sectors: todo,
                            errors: if nxm {
                                ErrorBits::NON_EXISTENT_MEMORY
                            } else {
                                ErrorBits::NONE
                            },
                            io_error: None,
                        }
                    }
                }
            }
        };

        let mut errors = outcome.errors;
        if outcome.words > 0 {
            self.account(host, unit, function, start, block, &outcome);
        }
        if self.regs.wc != 0 && errors.is_empty() && outcome.io_error.is_none() {
            errors |= ErrorBits::PACK_OVERRUN;
        }
        if let Some(e) = &outcome.io_error {
            event!(Level::ERROR, "{unit:?}: I/O error during {function}: {e}");
        }
        event!(
            Level::DEBUG,
            "{function}: {} of {requested} words transferred",
            outcome.words
        );
        errors
    }

    /// Update the word count, bus address and head position to show
    /// what the transfer actually did.
    fn account(
        &mut self,
        host: &mut Host,
        unit: UnitNumber,
        function: Function,
        start: BusAddress,
        block: u32,
        outcome: &Outcome,
    ) {
        // The word count register counts up towards zero.  A full
        // 65536-word transfer leaves it where it was.
        self.regs.wc = self.regs.wc.wrapping_add((outcome.words & 0xFFFF) as Word);
        self.regs
            .set_memory_address(start.wrapping_add_words(outcome.words as u32));

        // A no-seek transfer leaves the heads where they are unless
        // it crossed into the next sector.
        let no_seek = function.is_no_seek();
        let advance = if no_seek {
            outcome.sectors.saturating_sub(1)
        } else {
            outcome.sectors
        };
        if no_seek && advance == 0 {
            return;
        }
        let drive_type = self.drive(unit).drive_type;
        let (cylinder, head) = position_of_block(block + advance as u32, drive_type);
        let moved = self.drive(unit).cylinder != cylinder;
        if !no_seek {
            self.drive_mut(unit).head = head;
        } else if moved
            || (self.regs.wc != 0 && outcome.errors.is_empty() && outcome.io_error.is_none())
        {
            event!(Level::DEBUG, "{function} crossed to cylinder {cylinder}");
            self.raise_attention(host, unit);
        }
        self.drive_mut(unit).cylinder = cylinder;
        if unit == self.regs.cs.unit() {
            self.regs.suca = cylinder.value();
        }
    }
}
