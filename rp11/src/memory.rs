//! Core memory attached to the bus.
//!
//! Memory starts at address zero and extends for some number of
//! words; anything above that is non-existent, and a DMA access to it
//! stops with NXM.
use std::fmt::{self, Debug, Formatter};

use tracing::{event, Level};

use base::prelude::*;

use super::host::HostMemory;

pub struct CoreMemory {
    words: Vec<Word>,
}

impl CoreMemory {
    /// The largest memory the 18-bit bus can address, less the I/O
    /// page at the top.
    pub const MAX_WORDS: usize = 124 * 1024;

    /// Memory of `size` words, all zero.  Sizes above
    /// [`CoreMemory::MAX_WORDS`] are reduced to that.
    pub fn new(size: usize) -> CoreMemory {
        CoreMemory {
            words: vec![0; size.min(CoreMemory::MAX_WORDS)],
        }
    }

    pub fn size_in_words(&self) -> usize {
        self.words.len()
    }

    pub fn get(&self, addr: BusAddress) -> Option<Word> {
        self.words.get(addr.word_index()).copied()
    }

    pub fn set(&mut self, addr: BusAddress, value: Word) -> bool {
        match self.words.get_mut(addr.word_index()) {
            Some(w) => {
                *w = value;
                true
            }
            None => false,
        }
    }

    /// The words starting at `addr`, up to `count` of them; fewer if
    /// memory ends first.
    pub fn slice(&self, addr: BusAddress, count: usize) -> &[Word] {
        let start = addr.word_index().min(self.words.len());
        let end = start.saturating_add(count).min(self.words.len());
        &self.words[start..end]
    }

    /// Copy `data` into memory at `addr`.  Returns the number of words
    /// stored.
    pub fn load(&mut self, addr: BusAddress, data: &[Word]) -> usize {
        self.write_words(addr, data)
    }

    /// Number of words which exist from `addr` onwards, when `want`
    /// are needed.  Transfers do not wrap around the top of the bus.
    fn available(&self, addr: BusAddress, want: usize) -> usize {
        self.words
            .len()
            .saturating_sub(addr.word_index())
            .min(want)
    }
}

impl HostMemory for CoreMemory {
    fn read_words(&mut self, addr: BusAddress, buf: &mut [Word]) -> usize {
        let n = self.available(addr, buf.len());
        let start = addr.word_index().min(self.words.len());
        buf[..n].copy_from_slice(&self.words[start..start + n]);
        if n < buf.len() {
            event!(
                Level::DEBUG,
                "NXM reading word {} of a {}-word transfer from {addr}",
                n,
                buf.len()
            );
        }
        n
    }

    fn write_words(&mut self, addr: BusAddress, buf: &[Word]) -> usize {
        let n = self.available(addr, buf.len());
        let start = addr.word_index().min(self.words.len());
        self.words[start..start + n].copy_from_slice(&buf[..n]);
        if n < buf.len() {
            event!(
                Level::DEBUG,
                "NXM writing word {} of a {}-word transfer to {addr}",
                n,
                buf.len()
            );
        }
        n
    }
}

impl Debug for CoreMemory {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreMemory")
            .field("size_in_words", &self.words.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write() {
        let mut mem = CoreMemory::new(16);
        assert_eq!(mem.write_words(bus_addr!(4), &[1, 2, 3]), 3);
        let mut buf = [0; 3];
        assert_eq!(mem.read_words(bus_addr!(4), &mut buf), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(mem.get(bus_addr!(6)), Some(2));
        assert_eq!(mem.slice(bus_addr!(4), 2), &[1, 2]);
    }

    #[test]
    fn test_nxm() {
        let mut mem = CoreMemory::new(8);
        // Words 6 and 7 exist, word 8 does not.
        assert_eq!(mem.write_words(bus_addr!(12), &[5, 6, 7, 8]), 2);
        assert_eq!(mem.get(bus_addr!(14)), Some(6));
        let mut buf = [0; 4];
        assert_eq!(mem.read_words(bus_addr!(12), &mut buf), 2);
        assert_eq!(mem.read_words(bus_addr!(0o200), &mut buf), 0);
        // Starting beyond the end transfers nothing.
        assert_eq!(mem.write_words(bus_addr!(0o200), &[1, 2]), 0);
        assert_eq!(mem.read_words(bus_addr!(16), &mut buf), 0);
        assert!(!mem.set(bus_addr!(16), 1));
        assert_eq!(mem.slice(bus_addr!(0o200), 4), &[] as &[Word]);
    }

    #[test]
    fn test_size_limit() {
        assert_eq!(CoreMemory::new(usize::MAX).size_in_words(), CoreMemory::MAX_WORDS);
    }
}
