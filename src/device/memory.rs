//! Raw word storage for the whole LC-3 address space.
//!
//! `Memory` is deliberately dumb: `get`/`set` touch the backing array and
//! nothing else. Side effects (keyboard polling, interrupt dispatch) live
//! one layer up in [`Bus`](super::bus::Bus), so device models can mutate
//! memory from inside an interrupt without re-entering the dispatcher.
//!
//! # Usage
//!
//! ```
//! use lc3_vmm::device::Memory;
//!
//! let mut mem = Memory::new();
//! mem.set(0x3000, 0x1025);
//! assert_eq!(mem.get(0x3000), 0x1025);
//!
//! mem.write_slice(0x4000, &[1, 2, 3]);
//! assert_eq!(mem.read_slice(0x4000, 3), vec![1, 2, 3]);
//! ```

use std::fmt;
use std::io::{self, Write};

use byteorder::{BigEndian, WriteBytesExt};

use super::memory_map::MEMORY_MAX;

/// Flat array of 65536 16-bit words.
pub struct Memory {
    words: Box<[u16]>,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    /// Allocate a zeroed address space.
    pub fn new() -> Self {
        Self {
            words: vec![0u16; MEMORY_MAX].into_boxed_slice(),
        }
    }

    /// Read a word without side effects.
    #[inline]
    pub fn get(&self, addr: u16) -> u16 {
        self.words[addr as usize]
    }

    /// Store a word without side effects.
    #[inline]
    pub fn set(&mut self, addr: u16, value: u16) {
        self.words[addr as usize] = value;
    }

    /// Copy `len` words starting at `addr`. Addresses wrap at the ceiling.
    pub fn read_slice(&self, addr: u16, len: usize) -> Vec<u16> {
        (0..len)
            .map(|i| self.get(addr.wrapping_add(i as u16)))
            .collect()
    }

    /// Store `data` starting at `addr`. Addresses wrap at the ceiling.
    pub fn write_slice(&mut self, addr: u16, data: &[u16]) {
        for (i, &word) in data.iter().enumerate() {
            self.set(addr.wrapping_add(i as u16), word);
        }
    }

    /// Load `data` at `origin`, stopping at the memory ceiling.
    ///
    /// Returns the number of words actually stored.
    pub fn load_at(&mut self, origin: u16, data: &[u16]) -> usize {
        let room = MEMORY_MAX - origin as usize;
        let count = data.len().min(room);
        let start = origin as usize;
        self.words[start..start + count].copy_from_slice(&data[..count]);
        count
    }

    /// Borrow the whole address space.
    pub fn as_slice(&self) -> &[u16] {
        &self.words
    }

    /// Zero every word.
    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    /// Write the address space in program image format.
    ///
    /// The output is a big-endian origin word (0x0000) followed by every
    /// word in big-endian order, so it can be reloaded as an image.
    pub fn write_image<W: Write>(&self, mut out: W) -> io::Result<()> {
        out.write_u16::<BigEndian>(0x0000)?;
        for &word in self.words.iter() {
            out.write_u16::<BigEndian>(word)?;
        }
        out.flush()
    }

    /// Count of non-zero words (for diagnostics).
    pub fn used_words(&self) -> usize {
        self.words.iter().filter(|w| **w != 0).count()
    }
}

impl fmt::Debug for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memory")
            .field("words", &self.words.len())
            .field("used", &self.used_words())
            .finish()
    }
}
