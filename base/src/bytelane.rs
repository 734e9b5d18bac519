//! Convenience utilities for splitting 16-bit words into bytes,
//! joining them together, and merging a byte-wide bus write into an
//! existing register value.
//!
//! On the UNIBUS a byte write (DATOB) to an even address targets the
//! low byte of the word, and to an odd address the high byte.  The
//! other byte of the register is left alone.
use super::types::{BusAddress, Word};

/// Which half of a word a byte access refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteLane {
    Low,
    High,
}

impl ByteLane {
    /// The byte lane addressed by the low-order bit of `addr`.
    pub fn of(addr: BusAddress) -> ByteLane {
        if addr.is_odd() {
            ByteLane::High
        } else {
            ByteLane::Low
        }
    }
}

/// Extract the less significant byte of a word.
pub fn low_byte(w: Word) -> u8 {
    (w & 0o377) as u8
}

/// Extract the more significant byte of a word.
pub fn high_byte(w: Word) -> u8 {
    (w >> 8) as u8
}

/// Join two bytes into a word.
pub fn join_bytes(high: u8, low: u8) -> Word {
    (Word::from(high) << 8) | Word::from(low)
}

/// Replace one byte of `old` with `byte`, keeping the other.
pub fn merge_byte(old: Word, lane: ByteLane, byte: u8) -> Word {
    match lane {
        ByteLane::Low => join_bytes(high_byte(old), byte),
        ByteLane::High => join_bytes(byte, low_byte(old)),
    }
}

/// Decode little-endian byte pairs into words.  A trailing odd byte
/// is ignored.
pub fn words_from_le_bytes(bytes: &[u8], words: &mut [Word]) -> usize {
    let mut n = 0;
    for (w, pair) in words.iter_mut().zip(bytes.chunks_exact(2)) {
        *w = Word::from_le_bytes([pair[0], pair[1]]);
        n += 1;
    }
    n
}

/// Encode words as little-endian byte pairs.
pub fn words_to_le_bytes(words: &[Word], bytes: &mut [u8]) -> usize {
    let mut n = 0;
    for (w, pair) in words.iter().zip(bytes.chunks_exact_mut(2)) {
        pair.copy_from_slice(&w.to_le_bytes());
        n += 1;
    }
    n
}
