//! Backing stores hold the contents of a disk pack.
//!
//! A store is a simple array of 512-byte sectors, addressed by block
//! number.  Each sector holds 256 words, stored little-endian, so
//! images are interchangeable with those used by other PDP-11
//! emulators.
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{event, Level};

use base::prelude::*;

use super::drive::WORDS_PER_SECTOR;
use super::errors::BackingStoreError;

/// Number of bytes in one sector of a backing store.
pub const SECTOR_BYTES: usize = WORDS_PER_SECTOR * 2;

/// The outcome of a multi-sector transfer.  Fewer sectors than were
/// asked for may have been transferred even without an error.
#[derive(Debug)]
pub struct Transfer {
    pub sectors: usize,
    pub error: Option<BackingStoreError>,
}

impl Transfer {
    pub fn complete(sectors: usize) -> Transfer {
        Transfer {
            sectors,
            error: None,
        }
    }

    pub fn failed(sectors: usize, error: BackingStoreError) -> Transfer {
        Transfer {
            sectors,
            error: Some(error),
        }
    }
}

/// A synchronous block device.
///
/// Buffers passed to [`BackingStore::read_sectors`] and
/// [`BackingStore::write_sectors`] are a whole number of sectors long;
/// the number of sectors to transfer is the buffer length divided by
/// [`WORDS_PER_SECTOR`].
pub trait BackingStore {
    /// A description of the store, for messages.
    fn name(&self) -> &str;

    /// The size of the store in sectors, if it is known.
    fn len_sectors(&self) -> Option<u64>;

    fn is_read_only(&self) -> bool;

    fn read_sectors(&mut self, start_block: u32, buf: &mut [Word]) -> Transfer;

    fn write_sectors(&mut self, start_block: u32, buf: &[Word]) -> Transfer;
}

/// A disk image in a file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    name: String,
    file: File,
    read_only: bool,
}

impl FileStore {
    /// Open an image file.  Unless `read_only` is set, the file is
    /// created if it does not exist.
    pub fn open(path: &Path, read_only: bool) -> Result<FileStore, io::Error> {
        let file = if read_only {
            File::open(path)?
        } else {
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)?
        };
        Ok(FileStore {
            path: path.to_path_buf(),
            name: path.display().to_string(),
            file,
            read_only,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn seek_to(&mut self, block: u32) -> Result<(), io::Error> {
        let offset = u64::from(block) * SECTOR_BYTES as u64;
        self.file.seek(SeekFrom::Start(offset)).map(|_| ())
    }

    /// Fill `bytes` from the file, stopping early at end-of-file.
    /// Returns the number of bytes read.
    fn read_available(&mut self, bytes: &mut [u8]) -> Result<usize, io::Error> {
        let mut got = 0;
        while got < bytes.len() {
            match self.file.read(&mut bytes[got..]) {
                Ok(0) => break,
                Ok(n) => got += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(got)
    }
}

impl BackingStore for FileStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn len_sectors(&self) -> Option<u64> {
        self.file
            .metadata()
            .ok()
            .map(|m| m.len() / SECTOR_BYTES as u64)
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn read_sectors(&mut self, start_block: u32, buf: &mut [Word]) -> Transfer {
        let count = buf.len() / WORDS_PER_SECTOR;
        if let Err(e) = self.seek_to(start_block) {
            return Transfer::failed(0, e.into());
        }
        let mut bytes = vec![0_u8; count * SECTOR_BYTES];
        match self.read_available(&mut bytes) {
            Ok(got) => {
                // Sectors beyond the end of the file have never been
                // written, so they read as zero.
                if got < bytes.len() {
                    event!(
                        Level::TRACE,
                        "{}: read of block {start_block} went {} bytes past end-of-file",
                        self.name,
                        bytes.len() - got
                    );
                }
                words_from_le_bytes(&bytes, buf);
                Transfer::complete(count)
            }
            Err(e) => Transfer::failed(0, e.into()),
        }
    }

    fn write_sectors(&mut self, start_block: u32, buf: &[Word]) -> Transfer {
        if self.read_only {
            return Transfer::failed(0, BackingStoreError::ReadOnly);
        }
        if let Err(e) = self.seek_to(start_block) {
            return Transfer::failed(0, e.into());
        }
        let mut bytes = [0_u8; SECTOR_BYTES];
        for (done, sector) in buf.chunks_exact(WORDS_PER_SECTOR).enumerate() {
            words_to_le_bytes(sector, &mut bytes);
            if let Err(e) = self.file.write_all(&bytes) {
                return Transfer::failed(done, e.into());
            }
        }
        match self.file.flush() {
            Ok(()) => Transfer::complete(buf.len() / WORDS_PER_SECTOR),
            Err(e) => Transfer::failed(0, e.into()),
        }
    }
}

/// A problem which a [`MemoryStore`] can be told to simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Transfers stop at the block with an I/O error.
    IoError,
    /// Transfers stop at the block without reporting any error.
    Short,
}

/// A pack held in memory.  Mostly useful for testing, hence the
/// ability to inject faults.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    words: Vec<Word>,
    read_only: bool,
    faults: BTreeMap<u32, Fault>,
}

impl MemoryStore {
    /// A zero-filled pack of `blocks` sectors.
    pub fn new(blocks: u32) -> MemoryStore {
        MemoryStore {
            words: vec![0; blocks as usize * WORDS_PER_SECTOR],
            read_only: false,
            faults: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn read_only(mut self) -> MemoryStore {
        self.read_only = true;
        self
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn words_mut(&mut self) -> &mut [Word] {
        &mut self.words
    }

    pub fn inject_fault(&mut self, block: u32, fault: Fault) {
        self.faults.insert(block, fault);
    }

    pub fn clear_faults(&mut self) {
        self.faults.clear();
    }

    fn blocks(&self) -> u32 {
        u32::try_from(self.words.len() / WORDS_PER_SECTOR).unwrap_or(u32::MAX)
    }

    /// How many of `count` sectors starting at `start` can be
    /// transferred, and the fault (if any) which stops the transfer.
    fn reach(&self, start: u32, count: usize) -> (usize, Option<Fault>) {
        let mut n = 0;
        for block in (start..).take(count) {
            if let Some(fault) = self.faults.get(&block) {
                return (n, Some(*fault));
            }
            if block >= self.blocks() {
                return (n, Some(Fault::Short));
            }
            n += 1;
        }
        (n, None)
    }

    fn outcome(n: usize, fault: Option<Fault>, start: u32) -> Transfer {
        match fault {
            Some(Fault::IoError) => Transfer::failed(
                n,
                BackingStoreError::Injected {
                    block: start + n as u32,
                },
            ),
            Some(Fault::Short) | None => Transfer::complete(n),
        }
    }
}

impl BackingStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn len_sectors(&self) -> Option<u64> {
        Some(u64::from(self.blocks()))
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn read_sectors(&mut self, start_block: u32, buf: &mut [Word]) -> Transfer {
        let (n, fault) = self.reach(start_block, buf.len() / WORDS_PER_SECTOR);
        if n > 0 {
            let begin = start_block as usize * WORDS_PER_SECTOR;
            let len = n * WORDS_PER_SECTOR;
            buf[..len].copy_from_slice(&self.words[begin..begin + len]);
        }
        MemoryStore::outcome(n, fault, start_block)
    }

    fn write_sectors(&mut self, start_block: u32, buf: &[Word]) -> Transfer {
        if self.read_only {
            return Transfer::failed(0, BackingStoreError::ReadOnly);
        }
        let (n, fault) = self.reach(start_block, buf.len() / WORDS_PER_SECTOR);
        if n > 0 {
            let begin = start_block as usize * WORDS_PER_SECTOR;
            let len = n * WORDS_PER_SECTOR;
            self.words[begin..begin + len].copy_from_slice(&buf[..len]);
        }
        MemoryStore::outcome(n, fault, start_block)
    }
}
