//! Block request record stored in a descriptor buffer.
//!
//! ```text
//! +0  operation   (1 = READ, 2 = WRITE, 0 = consumed)
//! +1  position    (signed)
//! +2  length      (payload words)
//! +3  payload...
//! ```

use crate::device::memory::Memory;

use super::VRING_DESC_CAPACITY;

/// Operation code for a READ request.
pub const VIRTIO_BLK_R: u16 = 0x0001;

/// Operation code for a WRITE request.
pub const VIRTIO_BLK_W: u16 = 0x0002;

/// Header words ahead of the payload.
pub const BLK_HEADER_WORDS: u16 = 3;

/// Largest payload a single descriptor buffer can carry.
pub const BLK_MAX_PAYLOAD: usize = (VRING_DESC_CAPACITY - BLK_HEADER_WORDS) as usize;

/// Block operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOp {
    Read,
    Write,
    /// Any other code, including 0 (already consumed).
    Other(u16),
}

impl BlockOp {
    pub fn from_word(word: u16) -> Self {
        match word {
            VIRTIO_BLK_R => BlockOp::Read,
            VIRTIO_BLK_W => BlockOp::Write,
            other => BlockOp::Other(other),
        }
    }

    pub fn to_word(self) -> u16 {
        match self {
            BlockOp::Read => VIRTIO_BLK_R,
            BlockOp::Write => VIRTIO_BLK_W,
            BlockOp::Other(code) => code,
        }
    }
}

/// Decoded request header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRequest {
    pub op: BlockOp,
    pub position: i16,
    /// Payload length in words.
    pub length: u16,
}

impl BlockRequest {
    pub fn read(position: i16, length: u16) -> Self {
        Self { op: BlockOp::Read, position, length }
    }

    pub fn write(position: i16, length: u16) -> Self {
        Self { op: BlockOp::Write, position, length }
    }

    /// Decode the header stored at `addr`.
    pub fn load(mem: &Memory, addr: u16) -> Self {
        Self {
            op: BlockOp::from_word(mem.get(addr)),
            position: mem.get(addr.wrapping_add(1)) as i16,
            length: mem.get(addr.wrapping_add(2)),
        }
    }

    /// Encode the header at `addr`.
    pub fn store(&self, mem: &mut Memory, addr: u16) {
        mem.write_slice(addr, &self.header_words());
    }

    /// Header as it appears in memory.
    pub fn header_words(&self) -> [u16; BLK_HEADER_WORDS as usize] {
        [self.op.to_word(), self.position as u16, self.length]
    }

    /// Mark the request at `addr` consumed.
    pub fn clear_op(mem: &mut Memory, addr: u16) {
        mem.set(addr, 0);
    }

    /// First payload word of the request at `addr`.
    #[inline]
    pub fn payload_addr(addr: u16) -> u16 {
        addr.wrapping_add(BLK_HEADER_WORDS)
    }

    /// Payload length clamped to what the buffer can hold.
    pub fn payload_len(&self) -> usize {
        (self.length as usize).min(BLK_MAX_PAYLOAD)
    }
}
